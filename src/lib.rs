#![deny(unreachable_pub)]
pub mod bitget;
pub mod config;
mod consts;
mod errors;
pub mod grid;
mod helpers;
pub mod runner;
pub mod server;
pub use consts::EPSILON;
pub use errors::{Error, Result};
pub use helpers::{format_decimal, round_float, tick_size, truncate_float};
