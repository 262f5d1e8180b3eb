//! Bank profile configuration.
//!
//! Banks differ in which STET version they implement and in a long list of
//! behavioural toggles. All of them live in one immutable [`EngineConfig`];
//! [`EngineConfig::preset`] gives the defaults for each STET version and the
//! `with_*` methods adjust a preset for a particular bank.

use crate::model::InstructionStatusReason;
use crate::outcome::FailureReason;
use crate::pkce::PkceMethod;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default delay, in seconds, before a failure detected while waiting for a
/// callback is reported.
pub const DEFAULT_FAILURE_CALLBACK_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// STET PSD2 API versions with a known preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StetVersion {
    #[serde(rename = "1.4.0")]
    V1_4_0,
    #[serde(rename = "1.4.1")]
    V1_4_1,
    #[serde(rename = "1.4.2")]
    V1_4_2,
    #[serde(rename = "1.5.0")]
    V1_5_0,
    #[serde(rename = "1.5.1")]
    V1_5_1,
    #[serde(rename = "1.6.2")]
    V1_6_2,
    #[serde(rename = "1.6.3")]
    V1_6_3,
}

impl StetVersion {
    pub const ALL: [StetVersion; 7] = [
        StetVersion::V1_4_0,
        StetVersion::V1_4_1,
        StetVersion::V1_4_2,
        StetVersion::V1_5_0,
        StetVersion::V1_5_1,
        StetVersion::V1_6_2,
        StetVersion::V1_6_3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StetVersion::V1_4_0 => "1.4.0",
            StetVersion::V1_4_1 => "1.4.1",
            StetVersion::V1_4_2 => "1.4.2",
            StetVersion::V1_5_0 => "1.5.0",
            StetVersion::V1_5_1 => "1.5.1",
            StetVersion::V1_6_2 => "1.6.2",
            StetVersion::V1_6_3 => "1.6.3",
        }
    }
}

impl fmt::Display for StetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StetVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Banks often advertise a build number, e.g. "1.4.2.17".
        let short = s.splitn(4, '.').take(3).collect::<Vec<_>>().join(".");
        StetVersion::ALL
            .iter()
            .find(|version| version.as_str() == short)
            .copied()
            .ok_or_else(|| format!("Unknown STET version: {}", s))
    }
}

/// Token obtained before any payment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreStepType {
    None,
    OAuthClient,
}

/// How client credentials reach the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// `Authorization: Basic` header.
    Basic,
    /// `client_id` and `client_secret` form fields.
    Post,
}

/// How the PSU goes through a redirect approach and whether an explicit
/// confirmation call follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedirectFlow {
    Simple,
    SimpleWithoutConfirmation,
    SimpleWithAuthFactor,
    #[serde(rename = "OAUTH_AUTHORISATION_CODE")]
    OAuthAuthorisationCode,
    #[serde(rename = "OAUTH_AUTHORISATION_CODE_WITHOUT_CONFIRMATION")]
    OAuthAuthorisationCodeWithoutConfirmation,
}

impl RedirectFlow {
    pub fn is_oauth(&self) -> bool {
        matches!(
            self,
            RedirectFlow::OAuthAuthorisationCode
                | RedirectFlow::OAuthAuthorisationCodeWithoutConfirmation
        )
    }
}

impl fmt::Display for RedirectFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RedirectFlow::Simple => "SIMPLE",
            RedirectFlow::SimpleWithoutConfirmation => "SIMPLE_WITHOUT_CONFIRMATION",
            RedirectFlow::SimpleWithAuthFactor => "SIMPLE_WITH_AUTH_FACTOR",
            RedirectFlow::OAuthAuthorisationCode => "OAUTH_AUTHORISATION_CODE",
            RedirectFlow::OAuthAuthorisationCodeWithoutConfirmation => {
                "OAUTH_AUTHORISATION_CODE_WITHOUT_CONFIRMATION"
            }
        };
        write!(f, "{}", name)
    }
}

/// What is sent as `psuAuthenticationFactor` on an OAuth confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationFactor {
    None,
    /// The authorization code returned on the callback.
    Code,
    /// The access token obtained with that code.
    Token,
}

/// Abstract cancellation reason chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    OrderedByPsu,
    Duplicate,
    Fraudulent,
    Technical,
}

impl FromStr for CancellationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ordered_by_psu" => Ok(CancellationReason::OrderedByPsu),
            "duplicate" => Ok(CancellationReason::Duplicate),
            "fraudulent" => Ok(CancellationReason::Fraudulent),
            "technical" => Ok(CancellationReason::Technical),
            _ => Err(format!("Unknown cancellation reason: {}", s)),
        }
    }
}

/// Failure reason and human readable message for a bank reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionEntry {
    pub reason: FailureReason,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Per-operation settings
// ---------------------------------------------------------------------------

/// Settings shared by the validation and cancellation flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Redirect flow used when the bank applies the REDIRECT approach.
    pub redirect_flow: RedirectFlow,

    /// Factor sent with an OAuth confirmation.
    pub oauth_confirmation_factor: ConfirmationFactor,

    /// Whether a PKCE challenge accompanies the redirect.
    pub pkce: bool,

    pub pkce_method: PkceMethod,

    /// Whether report URLs are sent even for OAuth flows.
    pub redirect_urls_required: bool,

    /// Whether OAuth confirmations use the common `confirmation` endpoint
    /// instead of `o-confirmation`.
    pub common_oauth_confirmation: bool,

    /// Delay before reporting a failure detected while a callback may still
    /// arrive. `None` reports immediately.
    pub failure_callback_timeout_secs: Option<u64>,
}

impl InteractionConfig {
    fn new(redirect_flow: RedirectFlow) -> Self {
        Self {
            redirect_flow,
            oauth_confirmation_factor: ConfirmationFactor::None,
            pkce: false,
            pkce_method: PkceMethod::S256,
            redirect_urls_required: true,
            common_oauth_confirmation: false,
            failure_callback_timeout_secs: Some(DEFAULT_FAILURE_CALLBACK_TIMEOUT_SECS),
        }
    }

    /// Returns the failure callback timeout as a Duration.
    pub fn failure_callback_timeout(&self) -> Option<Duration> {
        self.failure_callback_timeout_secs
            .map(|secs| Duration::seconds(secs as i64))
    }

    /// Returns the confirmation endpoint used by OAuth flows.
    pub fn oauth_confirmation_path(&self) -> &'static str {
        if self.common_oauth_confirmation {
            "confirmation"
        } else {
            "o-confirmation"
        }
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Immutable description of how a bank implements the STET API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub version: StetVersion,

    pub pre_step: PreStepType,

    /// Scope requested with the pre-step client credentials grant.
    pub pre_step_scope: String,

    pub client_auth_method: ClientAuthMethod,

    /// Lower-cased token types returned by banks mapped to the value sent in
    /// `Authorization`.
    pub token_type_aliases: BTreeMap<String, String>,

    /// Ask for `application/hal+json` instead of `application/json`.
    pub accept_hal_json: bool,

    /// Forward the PSU context as `PSU-*` headers.
    pub include_psu_headers: bool,

    /// Stash callback data and ask the caller for a confirmation decision
    /// before confirming with the bank.
    pub unsafe_confirmations: bool,

    /// Look for error parameters on callback URLs and delay failures until
    /// one arrives.
    pub unsafe_url_error_detection: bool,

    pub validation: InteractionConfig,

    pub cancellation: InteractionConfig,

    /// The bank confirms on its own once the PSU passed SCA.
    pub may_have_automatic_confirmation: bool,

    /// A SIMPLE flow waits for the bank to ask for confirmation.
    pub confirmation_status_required: bool,

    /// `paymentInformationStatus` sent to cancel a payment.
    pub cancellation_status: String,

    /// Also set the cancellation status on every instruction.
    pub cancellation_on_instructions: bool,

    /// Echo the applied authentication approach in the cancellation request.
    pub cancellation_include_applied_approach: bool,

    pub charge_bearer: String,

    pub end_to_end_identifiers_supported: bool,

    /// Report a 404 on the payment as expired access.
    pub access_expired_on_404: bool,

    /// Bank reason codes of a rejected payment.
    pub rejection_codes: BTreeMap<String, RejectionEntry>,

    /// Bank reason code sent for each supported cancellation reason.
    pub cancellation_reasons: BTreeMap<CancellationReason, String>,

    /// Bank reason codes of a rejected instruction.
    pub instruction_reasons: BTreeMap<String, InstructionStatusReason>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::preset(StetVersion::V1_4_0)
    }
}

impl EngineConfig {
    /// Returns the defaults for a STET version.
    pub fn preset(version: StetVersion) -> Self {
        let mut config = Self {
            version,
            pre_step: PreStepType::OAuthClient,
            pre_step_scope: "pisp".to_string(),
            client_auth_method: ClientAuthMethod::Post,
            token_type_aliases: BTreeMap::from([("bearer".to_string(), "Bearer".to_string())]),
            accept_hal_json: true,
            include_psu_headers: true,
            unsafe_confirmations: false,
            unsafe_url_error_detection: false,
            validation: InteractionConfig::new(RedirectFlow::Simple),
            cancellation: InteractionConfig::new(RedirectFlow::SimpleWithoutConfirmation),
            may_have_automatic_confirmation: false,
            confirmation_status_required: true,
            cancellation_status: "RJCT".to_string(),
            cancellation_on_instructions: false,
            cancellation_include_applied_approach: false,
            charge_bearer: "SLEV".to_string(),
            end_to_end_identifiers_supported: true,
            access_expired_on_404: false,
            rejection_codes: default_rejection_codes(),
            cancellation_reasons: BTreeMap::from([(
                CancellationReason::OrderedByPsu,
                "DS02".to_string(),
            )]),
            instruction_reasons: BTreeMap::from([
                ("DS02".to_string(), InstructionStatusReason::CancelledByPsu),
                ("FRAD".to_string(), InstructionStatusReason::RegulatoryReason),
                ("RR04".to_string(), InstructionStatusReason::RegulatoryReason),
            ]),
        };

        if version >= StetVersion::V1_4_2 {
            config.cancellation_status = "CANC".to_string();
            config.cancellation_reasons.extend([
                (CancellationReason::Duplicate, "DUPL".to_string()),
                (CancellationReason::Fraudulent, "FRAD".to_string()),
                (CancellationReason::Technical, "TECH".to_string()),
            ]);
        }

        if version >= StetVersion::V1_5_0 {
            config.validation.redirect_flow = RedirectFlow::OAuthAuthorisationCode;
            config.validation.common_oauth_confirmation = true;
            config.cancellation.common_oauth_confirmation = true;
        }

        config
    }

    pub fn with_pre_step(mut self, pre_step: PreStepType) -> Self {
        self.pre_step = pre_step;
        self
    }

    pub fn with_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.client_auth_method = method;
        self
    }

    pub fn with_validation_flow(mut self, flow: RedirectFlow) -> Self {
        self.validation.redirect_flow = flow;
        self
    }

    pub fn with_cancellation_flow(mut self, flow: RedirectFlow) -> Self {
        self.cancellation.redirect_flow = flow;
        self
    }

    pub fn with_unsafe_confirmations(mut self, enabled: bool) -> Self {
        self.unsafe_confirmations = enabled;
        self
    }

    pub fn with_unsafe_url_error_detection(mut self, enabled: bool) -> Self {
        self.unsafe_url_error_detection = enabled;
        self
    }

    pub fn with_automatic_confirmation(mut self, enabled: bool) -> Self {
        self.may_have_automatic_confirmation = enabled;
        self
    }

    pub fn with_confirmation_status_required(mut self, required: bool) -> Self {
        self.confirmation_status_required = required;
        self
    }

    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.validation.pkce = enabled;
        self.cancellation.pkce = enabled;
        self
    }

    pub fn with_failure_callback_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.validation.failure_callback_timeout_secs = timeout_secs;
        self.cancellation.failure_callback_timeout_secs = timeout_secs;
        self
    }

    pub fn with_psu_headers(mut self, enabled: bool) -> Self {
        self.include_psu_headers = enabled;
        self
    }

    pub fn with_access_expired_on_404(mut self, enabled: bool) -> Self {
        self.access_expired_on_404 = enabled;
        self
    }

    /// Returns the `Authorization` scheme for a token type sent by the bank.
    pub fn normalize_token_type(&self, token_type: &str) -> String {
        self.token_type_aliases
            .get(&token_type.to_lowercase())
            .cloned()
            .unwrap_or_else(|| token_type.to_string())
    }

    /// Returns the `Accept` header value for API calls.
    pub fn accept_header(&self) -> &'static str {
        if self.accept_hal_json {
            "application/hal+json"
        } else {
            "application/json"
        }
    }
}

fn default_rejection_codes() -> BTreeMap<String, RejectionEntry> {
    let entries = [
        (
            "AC01",
            FailureReason::InvalidPayer,
            "The provided payer account is either invalid or does not exist.",
        ),
        (
            "AC04",
            FailureReason::InvalidPayer,
            "The provided payer account is closed.",
        ),
        (
            "AC06",
            FailureReason::InvalidPayer,
            "The provided payer account is blocked.",
        ),
        (
            "AG01",
            FailureReason::InvalidPayer,
            "The payment is forbidden on this type of account.",
        ),
        (
            "AM18",
            FailureReason::Other,
            "The number of instructions exceeds the bank acceptance limit.",
        ),
        (
            "CH03",
            FailureReason::InvalidDate,
            "The requested execution date is too far in the future.",
        ),
        (
            "CUST",
            FailureReason::Cancelled,
            "The payer has cancelled the payment.",
        ),
        (
            "DS02",
            FailureReason::Cancelled,
            "The payer has cancelled the payment.",
        ),
        (
            "FF01",
            FailureReason::Other,
            "The communication with the bank failed unexpectedly.",
        ),
        (
            "FRAD",
            FailureReason::RegulatoryReason,
            "The payment was rejected for being detected as fraudulent.",
        ),
        (
            "MS03",
            FailureReason::Unspecified,
            "The payment was denied by the bank.",
        ),
        (
            "NOAS",
            FailureReason::Expired,
            "The payer has neither accepted nor rejected the payment request.",
        ),
        (
            "RR01",
            FailureReason::InvalidPayer,
            "The payer could not identify themselves.",
        ),
        (
            "RR03",
            FailureReason::InvalidBeneficiary,
            "Missing information about the beneficiary name and/or address.",
        ),
        (
            "RR04",
            FailureReason::RegulatoryReason,
            "The payment has been rejected for a regulatory reason.",
        ),
    ];

    entries
        .into_iter()
        .map(|(code, reason, message)| {
            (
                code.to_string(),
                RejectionEntry {
                    reason,
                    message: message.to_string(),
                },
            )
        })
        .collect()
}
