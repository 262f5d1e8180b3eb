//! Session state persisted by the caller between entry point calls.
//!
//! The engine may be stopped after any "redirect" signal and restarted in a
//! different process. Everything it needs to resume lives here, and the
//! document round-trips through a flat key/value map: unknown keys are
//! ignored and missing keys fall back to "no value".

use crate::error::Result;
use crate::outcome::FailureReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Current schema of the persisted document.
pub const SESSION_STATE_VERSION: u32 = 1;

/// Authentication approach applied by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationApproach {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "REDIRECT")]
    Redirect,
    #[serde(rename = "DECOUPLED")]
    Decoupled,
    #[serde(rename = "EMBEDDED-1-FACTOR")]
    Embedded,
}

impl ValidationApproach {
    /// Parses the wire name, `None` for values the engine does not know.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(ValidationApproach::None),
            "REDIRECT" => Some(ValidationApproach::Redirect),
            "DECOUPLED" => Some(ValidationApproach::Decoupled),
            "EMBEDDED-1-FACTOR" => Some(ValidationApproach::Embedded),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            ValidationApproach::None => "NONE",
            ValidationApproach::Redirect => "REDIRECT",
            ValidationApproach::Decoupled => "DECOUPLED",
            ValidationApproach::Embedded => "EMBEDDED-1-FACTOR",
        }
    }
}

impl fmt::Display for ValidationApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A failure held back while a callback may still bring better details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenFailure {
    pub reason: FailureReason,
    #[serde(default)]
    pub message: Option<String>,
}

/// Resumable state of one payment flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub version: u32,

    // OAuth token, shared by pre-step, validation and cancellation.
    pub oauth_token: Option<String>,
    pub oauth_token_type: Option<String>,
    pub oauth_token_expires_at: Option<DateTime<Utc>>,
    pub oauth_refresh_token: Option<String>,

    // Validation in progress.
    pub payment_nonce: Option<String>,
    pub validation_approach: ValidationApproach,
    pub pkce_verifier: Option<String>,
    pub oauth_authorisation_code: Option<String>,
    pub oauth_token_to_be_requested: bool,
    pub psu_auth_factor: Option<String>,
    pub validation_confirmation_required: bool,
    pub validation_confirmed: bool,

    // Creation parameters, replayed on cancellation.
    pub payment_creation_date: Option<DateTime<Utc>>,
    pub payment_information_id: Option<String>,
    pub payment_instruction_ids: Option<Vec<String>>,

    // Delayed failure reporting.
    pub first_failure_at: Option<DateTime<Utc>>,
    pub first_failure_validation: Option<FrozenFailure>,
    pub first_failure_cancellation: Option<FrozenFailure>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            version: SESSION_STATE_VERSION,
            oauth_token: None,
            oauth_token_type: None,
            oauth_token_expires_at: None,
            oauth_refresh_token: None,
            payment_nonce: None,
            validation_approach: ValidationApproach::None,
            pkce_verifier: None,
            oauth_authorisation_code: None,
            oauth_token_to_be_requested: false,
            psu_auth_factor: None,
            validation_confirmation_required: false,
            validation_confirmed: false,
            payment_creation_date: None,
            payment_information_id: None,
            payment_instruction_ids: None,
            first_failure_at: None,
            first_failure_validation: None,
            first_failure_cancellation: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a persisted document.
    pub fn from_document(document: Value) -> Result<Self> {
        Ok(serde_json::from_value(document)?)
    }

    /// Serializes to the flat document the caller persists.
    pub fn to_document(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(crate::error::Error::Serialization(format!(
                "session state serialized to {} instead of an object",
                other
            ))),
        }
    }

    /// Clears everything tied to the current validation or cancellation.
    pub fn reset_validation(&mut self) {
        self.payment_nonce = None;
        self.validation_approach = ValidationApproach::None;
        self.pkce_verifier = None;
        self.oauth_authorisation_code = None;
        self.oauth_token_to_be_requested = false;
        self.psu_auth_factor = None;
        self.validation_confirmation_required = false;
        self.validation_confirmed = false;
        self.first_failure_at = None;
        self.first_failure_validation = None;
        self.first_failure_cancellation = None;
    }

    pub fn reset_token(&mut self) {
        self.oauth_token = None;
        self.oauth_token_type = None;
        self.oauth_token_expires_at = None;
        self.oauth_refresh_token = None;
    }

    /// Returns true when the creation parameters needed for a cancellation
    /// are all known.
    pub fn has_creation_parameters(&self) -> bool {
        self.payment_creation_date.is_some()
            && self.payment_information_id.is_some()
            && self.payment_instruction_ids.is_some()
    }

    /// Value of the `Authorization` header for the current token.
    pub fn authorization(&self) -> Option<String> {
        self.oauth_token.as_ref().map(|token| {
            format!(
                "{} {}",
                self.oauth_token_type.as_deref().unwrap_or("Bearer"),
                token
            )
        })
    }
}
