//! Error handling for the HTTP transport.

use thiserror::Error;

/// Result type for stet-http operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the HTTP transport.
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be sent or the answer could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The bank did not answer in time.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl From<Error> for stet_pis::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Config(message) => stet_pis::Error::Configuration(message),
            other => stet_pis::Error::Transport(other.to_string()),
        }
    }
}
