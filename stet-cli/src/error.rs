//! Error handling for the CLI.

use thiserror::Error;

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The engine reported a transport or fatal error.
    #[error("Engine error: {0}")]
    Engine(#[from] stet_pis::Error),

    /// The HTTP transport could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] stet_http::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session file is missing or unusable.
    #[error("Session error: {0}")]
    Session(String),
}

impl Error {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Error::InvalidParameter(message.into())
    }
}
