//! Error taxonomy for the relay

use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Relay errors
///
/// The retry queue and the watchers branch on [`Error::is_retryable`]:
/// transient chain conditions are retried, malformed input and
/// configuration problems are not.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient chain error (RPC timeout, rate limit, node unavailable)
    #[error("transient chain error: {0}")]
    Transient(String),

    /// Malformed event payload or action parameters
    #[error("validation error: {0}")]
    Validation(String),

    /// Destination chain rejected or reverted the action
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// Confirmation wait exceeded the chain's timeout
    #[error("execution timed out: {0}")]
    Timeout(String),

    /// Non-retryable execution error (malformed calldata, unsupported entrypoint)
    #[error("fatal execution error: {0}")]
    Fatal(String),

    /// Configuration error (missing contract address, invalid credentials)
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the retry queue should count this failure against
    /// `max_attempts` and try again, as opposed to parking the item
    /// immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_)
            | Error::Reverted(_)
            | Error::Timeout(_)
            | Error::Storage(_)
            | Error::Other(_) => true,
            Error::Validation(_)
            | Error::Fatal(_)
            | Error::Config(_)
            | Error::Serialization(_) => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
