//! Bitget spot REST client
//!
//! Every private call is signed with HMAC-SHA256 over
//! `timestamp + METHOD + path(+query) + body` and sent with the
//! `ACCESS-*` headers. Responses are unwrapped from the `{code, msg, data}`
//! envelope; any failure is reported as [`crate::Error`] carrying the
//! endpoint and, when known, the HTTP status.

mod client;
mod signature;
pub mod types;

pub use client::{ApiCredentials, BitgetClient};
pub use signature::sign_request;
