//! Error types for the routing fabric.

use thiserror::Error;

/// Result type alias for fabric operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the routing fabric.
#[derive(Error, Debug)]
pub enum Error {
    /// No hash function is registered under the requested name.
    /// Raised at startup; the service refuses to come up with a bad name.
    #[error("unknown hash function: {0}")]
    UnknownHashFunction(String),

    /// A role name that does not map to any known service type.
    /// Callers log and skip the offending role; the advertisement stays
    /// valid for its remaining roles.
    #[error("unknown service type: {0}")]
    UnknownServiceType(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The request/response template has no capacity for another request.
    #[error("request queue full: {pending} pending, max {max}")]
    QueueFull { pending: usize, max: usize },

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
