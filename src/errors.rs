use thiserror::Error;

/// Transport-level errors raised by the exchange client
///
/// Every variant carries the endpoint that failed so a log line is enough to
/// diagnose the call without replaying it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("HTTP error on {endpoint} (status {status:?}): {message}")]
    Http {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Exchange rejected {endpoint}: code={code}, msg={msg}")]
    Api {
        endpoint: String,
        code: String,
        msg: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Request signing failed: {0}")]
    Signature(String),
}

impl Error {
    /// Endpoint the failing call was addressed to, if known
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Error::Http { endpoint, .. }
            | Error::Api { endpoint, .. }
            | Error::Decode { endpoint, .. }
            | Error::InvalidResponse { endpoint, .. } => Some(endpoint),
            Error::Signature(_) => None,
        }
    }

    /// HTTP status of the failed call, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
