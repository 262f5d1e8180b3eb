//! Results of an engine entry point.
//!
//! Every entry point returns an [`Outcome`] by value. The caller must handle
//! each variant; the compiler makes sure none is forgotten.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller has to do after an entry point returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation is over. For the `check_*` entry points this means the
    /// PSU interaction is over and the matching operation should be called
    /// again to conclude.
    Completed,

    /// The PSU must act before the operation can progress.
    InteractionRequired { interaction: Interaction },

    /// The operation failed permanently.
    Failed { failure: Failure },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        match self {
            Outcome::InteractionRequired { interaction } => Some(interaction),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

impl From<Interaction> for Outcome {
    fn from(interaction: Interaction) -> Self {
        Outcome::InteractionRequired { interaction }
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Outcome::Failed { failure }
    }
}

/// PSU interaction requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// Send the PSU to `url`. When `skippable` is set the caller may poll the
    /// status instead of waiting for the callback.
    Redirect { url: String, skippable: bool },

    /// Ask the PSU to confirm, then call again with a confirmation decision.
    ConfirmationRequired,

    /// Nothing new happened; call again later.
    SameInteraction,
}

/// Which operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Validation,
    Cancellation,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Validation => write!(f, "validation"),
            Operation::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// Typed reason of a permanent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InvalidPayer,
    InvalidBeneficiary,
    InvalidAmount,
    InvalidDate,
    Cancelled,
    RegulatoryReason,
    Expired,
    ConfirmationRefused,
    NotCancellable,
    AlreadyCancelled,
    Other,
    /// The bank rejected the payment without saying why.
    Unspecified,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::InvalidPayer => "INVALID_PAYER",
            FailureReason::InvalidBeneficiary => "INVALID_BENEFICIARY",
            FailureReason::InvalidAmount => "INVALID_AMOUNT",
            FailureReason::InvalidDate => "INVALID_DATE",
            FailureReason::Cancelled => "CANCELLED",
            FailureReason::RegulatoryReason => "REGULATORY_REASON",
            FailureReason::Expired => "EXPIRED",
            FailureReason::ConfirmationRefused => "CONFIRMATION_REFUSED",
            FailureReason::NotCancellable => "NOT_CANCELLABLE",
            FailureReason::AlreadyCancelled => "ALREADY_CANCELLED",
            FailureReason::Other => "OTHER",
            FailureReason::Unspecified => "UNSPECIFIED",
        };
        write!(f, "{}", name)
    }
}

/// A permanent failure of validation or cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub operation: Operation,
    pub reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Failure {
    pub fn validation(reason: FailureReason, message: Option<String>) -> Self {
        Self {
            operation: Operation::Validation,
            reason,
            message,
        }
    }

    pub fn cancellation(reason: FailureReason, message: Option<String>) -> Self {
        Self {
            operation: Operation::Cancellation,
            reason,
            message,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} failed ({}): {}", self.operation, self.reason, message),
            None => write!(f, "{} failed ({})", self.operation, self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let outcome = Outcome::from(Interaction::Redirect {
            url: "https://bank.example/consent".to_string(),
            skippable: true,
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "interaction_required");
        assert_eq!(json["interaction"]["kind"], "redirect");
        assert_eq!(json["interaction"]["skippable"], true);

        let outcome = Outcome::from(Failure::cancellation(FailureReason::NotCancellable, None));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["failure"]["reason"], "NOT_CANCELLABLE");
        assert_eq!(json["failure"]["operation"], "cancellation");
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::validation(
            FailureReason::InvalidPayer,
            Some("The provided payer account is closed.".to_string()),
        );
        assert_eq!(
            failure.to_string(),
            "validation failed (INVALID_PAYER): The provided payer account is closed."
        );
    }
}
