//! Payment data owned by the caller and updated by the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keys written to [`Payment::extra`].
pub mod extra {
    pub const LAST_STATUS: &str = "last_status";
    pub const LAST_STATUS_REASON: &str = "last_status_reason";
    pub const LAST_REQUEST_ID: &str = "last_request_id";
    pub const LAST_REQUEST_METHOD: &str = "last_request_method";
    pub const LAST_REQUEST_URL: &str = "last_request_url";
    pub const LAST_REQUEST_TIME: &str = "last_request_time";
    pub const BANK_PAYMENT_ID: &str = "bank_payment_id";
    pub const INITIATION_TIME: &str = "initiation_time";
    pub const INITIATION_REQUEST_ID: &str = "initiation_request_id";
    pub const CANCELLATION_TIME: &str = "cancellation_time";
    pub const CANCELLATION_REQUEST_ID: &str = "cancellation_request_id";
    pub const ERROR_CODE: &str = "error_code";
    pub const ERROR_MESSAGE: &str = "error_message";
}

/// SEPA scheme used for the credit transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLevel {
    #[default]
    Sepa,
    SepaInstant,
}

/// An account on either side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentAccount {
    /// Account holder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// IBAN of the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,

    /// BIC of the account servicer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
}

impl PaymentAccount {
    pub fn new(name: &str, iban: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            iban: Some(iban.to_string()),
            bic: None,
        }
    }

    pub fn with_bic(mut self, bic: &str) -> Self {
        self.bic = Some(bic.to_string());
        self
    }
}

/// Execution status of a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionStatus {
    #[default]
    Pending,
    Done,
    Rejected,
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionStatus::Pending => write!(f, "pending"),
            InstructionStatus::Done => write!(f, "done"),
            InstructionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Why an instruction was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionStatusReason {
    #[default]
    None,
    CancelledByPsu,
    RegulatoryReason,
    Other,
}

/// One credit transfer inside a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Amount as a decimal string, e.g. `"10.00"`.
    pub amount: String,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Creditor of the transfer.
    pub beneficiary: PaymentAccount,

    /// Unstructured remittance information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// End-to-end reference carried through the SEPA chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    #[serde(default)]
    pub status: InstructionStatus,

    #[serde(default)]
    pub status_reason: InstructionStatusReason,
}

impl Instruction {
    pub fn new(amount: &str, currency: &str, beneficiary: PaymentAccount) -> Self {
        Self {
            amount: amount.to_string(),
            currency: currency.to_string(),
            beneficiary,
            label: None,
            reference_id: None,
            status: InstructionStatus::Pending,
            status_reason: InstructionStatusReason::None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_reference_id(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }
}

/// A one-time payment request.
///
/// `id` stays empty until the bank accepted the creation request, and never
/// changes afterwards. The instruction count and order are fixed from that
/// point on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payment {
    /// Identifier assigned by the bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub instructions: Vec<Instruction>,

    /// Debtor account. May be filled by the bank on refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<PaymentAccount>,

    #[serde(default)]
    pub service_level: ServiceLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_date: Option<NaiveDate>,

    /// Name of the initiating party shown to the PSU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiating_party: Option<String>,

    /// Free-form diagnostics written by the engine.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Payment {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Default::default()
        }
    }

    pub fn with_payer(mut self, payer: PaymentAccount) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_service_level(mut self, service_level: ServiceLevel) -> Self {
        self.service_level = service_level;
        self
    }

    /// Sets or removes an `extra` entry.
    pub fn set_extra(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.extra.insert(key.to_string(), value);
            }
            None => {
                self.extra.remove(key);
            }
        }
    }
}
