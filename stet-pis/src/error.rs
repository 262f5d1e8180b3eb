//! Error types for the payment initiation engine.
//!
//! Only transport failures and fatal conditions travel as [`Error`]. PSU
//! interactions and permanent payment failures are ordinary values of
//! [`crate::outcome::Outcome`].

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The bank answered with a 5xx status.
    #[error("Bank unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The bank rejected the bearer token (401 or 403).
    #[error("Access denied by the bank (status {status}): {message}")]
    AccessDenied { status: u16, message: String },

    /// The resource does not exist on the bank side.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The bank no longer grants access to the payment.
    #[error("Access to the payment has expired: {0}")]
    AccessExpired(String),

    /// Any other 4xx answer, with the bank's error code when it sent one.
    #[error("Bank error (status {status}, code {code:?}): {message}")]
    Bank {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The transport could not complete the round trip.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The bank answered with a document the engine cannot use.
    #[error("Unexpected bank response: {0}")]
    Response(String),

    /// The engine is configured for a flow it does not handle.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The bank and the engine disagree about where the flow stands.
    #[error("Inconsistent payment state: {0}")]
    Inconsistent(String),

    /// Caller supplied invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true for answers that a freshly minted token may fix.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::AccessDenied { .. })
    }

    /// Returns true if the error is fatal, i.e. retrying the same call cannot
    /// succeed without a code or configuration change.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Inconsistent(_) | Error::InvalidInput(_)
        )
    }

    /// Returns the HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Unavailable { status, .. }
            | Error::AccessDenied { status, .. }
            | Error::Bank { status, .. } => Some(*status),
            Error::NotFound(_) | Error::AccessExpired(_) => Some(404),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Response(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_detection() {
        let err = Error::AccessDenied {
            status: 403,
            message: "token revoked".to_string(),
        };
        assert!(err.is_access_denied());
        assert!(!err.is_fatal());
        assert_eq!(err.status_code(), Some(403));

        let err = Error::Unavailable {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert!(!err.is_access_denied());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::Configuration("x".into()).is_fatal());
        assert!(Error::Inconsistent("x".into()).is_fatal());
        assert!(!Error::NotFound("x".into()).is_fatal());
        assert_eq!(Error::AccessExpired("gone".into()).status_code(), Some(404));
    }
}
