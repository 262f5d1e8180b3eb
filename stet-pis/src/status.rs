//! Decoding of bank status codes.
//!
//! STET banks report progress through ISO 20022 status codes whose meaning
//! shifts slightly between versions and banks. The functions here are pure:
//! they turn raw codes into a handful of outcomes the state machines act on.
//!
//! | raw status      | [`StatusOutcome`]                                   |
//! |-----------------|-----------------------------------------------------|
//! | `RJCT`, `CANC`  | `Rejected`                                          |
//! | `RCVD`, `ACTC`  | `AwaitingPsu`                                       |
//! | `ACCO`          | `ConfirmationRequired` (explicit)                   |
//! | `ACCP`, `ACSP`  | `ConfirmationRequired` (implicit), or `Done` when confirmed |
//! | `PDNG`          | `InProgress`                                        |
//! | anything else   | `Done`                                              |

use crate::config::RejectionEntry;
use crate::error::{Error, Result};
use crate::model::{InstructionStatus, InstructionStatusReason};
use crate::outcome::FailureReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, warn};

/// Raw status of a payment or instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusData {
    pub status: Option<String>,
    pub reason: Option<String>,
}

impl StatusData {
    pub fn new(status: &str, reason: Option<&str>) -> Self {
        Self {
            status: Some(status.to_string()),
            reason: reason.map(str::to_string),
        }
    }

    fn status_str(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }
}

/// What a payment status means for the validation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The payment is rejected for good.
    Rejected {
        reason: FailureReason,
        message: Option<String>,
    },
    /// The PSU has not finished authenticating.
    AwaitingPsu,
    /// The bank waits for a confirmation call. `explicit` is set when the bank
    /// said so with `ACCO`; otherwise the redirect flow decides.
    ConfirmationRequired { explicit: bool },
    /// Accepted, execution pending.
    InProgress,
    Done,
}

/// Session facts the decoder depends on.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// The bank confirms by itself once SCA is over.
    pub automatic_confirmation: bool,
    /// The engine already performed the confirmation call.
    pub confirmed: bool,
    pub rejection_codes: &'a BTreeMap<String, RejectionEntry>,
}

/// Maps a payment status to a [`StatusOutcome`].
pub fn decode_status(data: &StatusData, ctx: &DecodeContext<'_>) -> StatusOutcome {
    match data.status_str() {
        "RJCT" | "CANC" => {
            let (reason, message) = rejection_reason(data.reason.as_deref(), ctx.rejection_codes);
            StatusOutcome::Rejected { reason, message }
        }
        "RCVD" | "ACTC" => StatusOutcome::AwaitingPsu,
        "ACCO" => StatusOutcome::ConfirmationRequired { explicit: true },
        "ACCP" | "ACSP" => {
            if ctx.automatic_confirmation || ctx.confirmed {
                StatusOutcome::Done
            } else {
                StatusOutcome::ConfirmationRequired { explicit: false }
            }
        }
        "PDNG" => StatusOutcome::InProgress,
        _ => StatusOutcome::Done,
    }
}

fn rejection_reason(
    code: Option<&str>,
    table: &BTreeMap<String, RejectionEntry>,
) -> (FailureReason, Option<String>) {
    let Some(code) = code else {
        return (FailureReason::Unspecified, None);
    };

    match table.get(code) {
        Some(entry) => (entry.reason, Some(entry.message.clone())),
        None => {
            error!("Unknown rejection reason code {}", code);
            (FailureReason::Other, Some("Unknown error".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Where a payment stands with regard to cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationStatus {
    Cancelled,
    Cancellable,
    NotCancellable,
}

pub fn decode_cancellation_status(data: &StatusData) -> CancellationStatus {
    match data.status_str() {
        "RJCT" | "CANC" => CancellationStatus::Cancelled,
        "PDNG" | "ACSP" => CancellationStatus::Cancellable,
        _ => CancellationStatus::NotCancellable,
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Maps an instruction status to the instruction model.
///
/// An instruction still in `ACTC` takes the payment-wide status.
pub fn decode_instruction_status(
    payment: &StatusData,
    instruction: &StatusData,
    reasons: &BTreeMap<String, InstructionStatusReason>,
) -> Result<(InstructionStatus, InstructionStatusReason)> {
    let data = if instruction.status.is_none() || instruction.status_str() == "ACTC" {
        payment
    } else {
        instruction
    };

    match data.status_str() {
        "ACSC" => Ok((InstructionStatus::Done, InstructionStatusReason::None)),
        "CANC" => Ok((
            InstructionStatus::Rejected,
            InstructionStatusReason::CancelledByPsu,
        )),
        "RJCT" => {
            let reason = match data.reason.as_deref() {
                None => InstructionStatusReason::None,
                Some(code) => reasons.get(code).copied().unwrap_or_else(|| {
                    warn!("Unhandled instruction status reason {}", code);
                    InstructionStatusReason::Other
                }),
            };
            Ok((InstructionStatus::Rejected, reason))
        }
        "ACCP" | "ACSP" | "PDNG" => Ok((InstructionStatus::Pending, InstructionStatusReason::None)),
        other => Err(Error::Response(format!(
            "Unhandled instruction status {:?}",
            other
        ))),
    }
}
