//! Payment creation and validation state machine.
//!
//! A payment goes through creation, Strong Customer Authentication on the
//! bank's pages and, depending on the redirect flow, an explicit
//! confirmation call. The PSU leaves the application in the middle, so each
//! arrow below may be separated by a process restart; every decision is
//! taken from the session state and the bank status alone.
//!
//! # States
//!
//! ```text
//!   ┌───────────┐  create   ┌───────────┐  redirect  ┌──────────────┐
//!   │ NoPayment │──────────▶│  Created  │───────────▶│ AwaitingSCA  │
//!   └───────────┘           └───────────┘            └──────┬───────┘
//!                                                           │ callback / status
//!                                   ┌───────────────────────┼─────────────────────┐
//!                                   │                       │                     │
//!                             needs confirm            no confirm            rejected
//!                                   ▼                       │                     ▼
//!                        ┌──────────────────────┐           │          ┌─────────────────┐
//!                        │ ConfirmationPending  │           │          │ FailureDetected │
//!                        └──────────┬───────────┘           │          └─────────────────┘
//!                          confirm=true                     │
//!                                   ▼                       ▼
//!                             ┌───────────┐           ┌──────────┐
//!                             │ Confirmed │──────────▶│ Finished │
//!                             └───────────┘           └──────────┘
//! ```
//!
//! # Redirect flows
//!
//! - `SIMPLE`: the PSU authenticates, then the engine calls `confirmation`
//!   once the bank or the caller asks for it.
//! - `SIMPLE_WITHOUT_CONFIRMATION`: authentication alone validates the payment.
//! - `SIMPLE_WITH_AUTH_FACTOR`: the callback carries a
//!   `psuAuthenticationFactor` that is sent with the confirmation.
//! - `OAUTH_AUTHORISATION_CODE`: the callback carries an authorization code,
//!   exchanged for a PSU token used to confirm.
//! - `OAUTH_AUTHORISATION_CODE_WITHOUT_CONFIRMATION`: the code exchange alone
//!   validates the payment.

use crate::config::{ConfirmationFactor, InteractionConfig, RedirectFlow};
use crate::dialect::CreationParameters;
use crate::error::{Error, Result};
use crate::flow::{Flow, Halt, Replay, Step};
use crate::ids::{end_to_end_identifier, random_identifier};
use crate::model::extra;
use crate::outcome::{Failure, FailureReason, Interaction, Operation};
use crate::pkce::PkceData;
use crate::response::{payment_id_from_location, validation_data, ValidationData};
use crate::settings::{url_with_params, Callback, Confirmation};
use crate::state::ValidationApproach;
use crate::status::{decode_status, DecodeContext, StatusOutcome};
use crate::token::Grant;
use crate::transport::{Endpoint, Method, Request};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Where the validation stands according to the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValidationProgress {
    /// The PSU has not finished on the bank's pages.
    Pending,
    /// A confirmation call is expected.
    ConfirmationRequired,
    /// Nothing more is expected from the PSU.
    Finished,
}

impl<'a> Flow<'a> {
    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    pub(crate) async fn create_and_validate(&mut self) -> Step<()> {
        self.check_pre_step().await?;

        if self.payment.id.is_none() {
            self.create_payment().await?;
        } else {
            self.with_token_retry(Replay::ResumeValidation).await?;
        }

        match self.validation_progress().await? {
            ValidationProgress::ConfirmationRequired => Err(Error::Inconsistent(
                "confirmation is still required after having been done already".to_string(),
            )
            .into()),
            ValidationProgress::Pending => Err(Error::Inconsistent(
                "validation has ended, but the payment is not in a post-validation status"
                    .to_string(),
            )
            .into()),
            ValidationProgress::Finished => {
                info!("Validation of payment {:?} is over", self.payment.id);
                self.state.reset_validation();
                Ok(())
            }
        }
    }

    pub(crate) async fn check_during_creation(&mut self) -> Step<()> {
        if self.payment.id.is_none() {
            return Err(Interaction::SameInteraction.into());
        }
        if self.state.first_failure_at.is_some() {
            return self.resume_held_failure(Operation::Validation);
        }
        self.check_pre_step().await?;
        self.with_token_retry(Replay::CheckCreation).await
    }

    pub(crate) async fn check_creation_status(&mut self) -> Step<()> {
        match self.validation_progress().await? {
            ValidationProgress::ConfirmationRequired => {
                let skippable = matches!(
                    self.config.validation.redirect_flow,
                    RedirectFlow::Simple | RedirectFlow::SimpleWithoutConfirmation
                );
                if skippable && !self.state.validation_confirmation_required {
                    // The confirmation request is surfaced by create_and_validate.
                    Ok(())
                } else {
                    Err(Interaction::ConfirmationRequired.into())
                }
            }
            ValidationProgress::Pending => Err(Interaction::SameInteraction.into()),
            ValidationProgress::Finished => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub(crate) async fn validation_progress(&mut self) -> Step<ValidationProgress> {
        let config = self.config;
        let data = self.payment_status_data().await?;
        let ctx = DecodeContext {
            automatic_confirmation: config.may_have_automatic_confirmation,
            confirmed: self.state.validation_confirmed,
            rejection_codes: &config.rejection_codes,
        };

        let progress = match decode_status(&data, &ctx) {
            StatusOutcome::Rejected { reason, message } => {
                info!("Payment rejected with status {:?}", data);
                return Err(Failure::validation(reason, message).into());
            }
            StatusOutcome::AwaitingPsu => ValidationProgress::Pending,
            StatusOutcome::ConfirmationRequired { explicit: true } => {
                ValidationProgress::ConfirmationRequired
            }
            StatusOutcome::ConfirmationRequired { explicit: false } => {
                if self.state.validation_approach != ValidationApproach::Redirect {
                    ValidationProgress::Pending
                } else {
                    match config.validation.redirect_flow {
                        RedirectFlow::Simple => ValidationProgress::ConfirmationRequired,
                        RedirectFlow::SimpleWithoutConfirmation => ValidationProgress::Finished,
                        _ => ValidationProgress::Pending,
                    }
                }
            }
            StatusOutcome::InProgress | StatusOutcome::Done => ValidationProgress::Finished,
        };

        debug!("Payment status {:?} means {:?}", data.status, progress);
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    pub(crate) fn new_pkce(&mut self, interaction: &InteractionConfig) -> Option<PkceData> {
        if !interaction.pkce {
            return None;
        }
        let pkce = PkceData::generate(interaction.pkce_method);
        self.state.pkce_verifier = Some(pkce.verifier.clone());
        Some(pkce)
    }

    fn report_url(&self, base: &str, pkce: Option<&PkceData>) -> Result<String> {
        let method = pkce.map(|pkce| pkce.method.to_string());
        url_with_params(
            base,
            &[
                ("state", self.settings.redirect_state.as_deref()),
                ("code_challenge", pkce.map(|pkce| pkce.challenge.as_str())),
                ("code_challenge_method", method.as_deref()),
            ],
        )
    }

    pub(crate) fn supplementary_data(
        &self,
        interaction: &InteractionConfig,
        pkce: Option<&PkceData>,
    ) -> Result<Value> {
        let mut data = json!({ "acceptedAuthenticationApproach": ["REDIRECT"] });
        if interaction.redirect_urls_required || !interaction.redirect_flow.is_oauth() {
            data["successfulReportUrl"] = json!(self.report_url(&self.settings.redirect_uri, pkce)?);
            data["unsuccessfulReportUrl"] = json!(self.report_url(self.settings.error_uri(), pkce)?);
        }
        Ok(data)
    }

    /// URL the PSU is sent to for the given redirect flow.
    pub(crate) fn consent_url(
        &self,
        data: &ValidationData,
        flow: RedirectFlow,
        pkce: Option<&PkceData>,
    ) -> Result<String> {
        let link = data.link("consentApproval")?;
        if !flow.is_oauth() {
            return Ok(link.to_string());
        }

        let method = pkce.map(|pkce| pkce.method.to_string());
        url_with_params(
            link,
            &[
                ("state", self.settings.redirect_state.as_deref()),
                ("client_id", Some(self.settings.client_id.as_str())),
                ("redirect_uri", Some(self.settings.redirect_uri.as_str())),
                ("code_challenge", pkce.map(|pkce| pkce.challenge.as_str())),
                ("code_challenge_method", method.as_deref()),
            ],
        )
    }

    async fn create_payment(&mut self) -> Step<()> {
        let config = self.config;

        if config.end_to_end_identifiers_supported {
            for instruction in self
                .payment
                .instructions
                .iter_mut()
                .filter(|instruction| instruction.reference_id.is_none())
            {
                instruction.reference_id = Some(end_to_end_identifier());
            }
        }

        let params = CreationParameters {
            creation_date: self.now(),
            payment_information_id: random_identifier(),
            instruction_ids: self
                .payment
                .instructions
                .iter()
                .map(|_| random_identifier())
                .collect(),
        };
        self.state.payment_creation_date = Some(params.creation_date);
        self.state.payment_information_id = Some(params.payment_information_id.clone());
        self.state.payment_instruction_ids = Some(params.instruction_ids.clone());

        let pkce = self.new_pkce(&config.validation);
        let mut payload = self.dialect.build_payload(self.payment, &params)?;
        payload["supplementaryData"] = self.supplementary_data(&config.validation, pkce.as_ref())?;

        info!(
            "Creating payment {} with {} instruction(s)",
            params.payment_information_id,
            params.instruction_ids.len()
        );
        let request = Request::new(Method::Post, Endpoint::PaymentRequests).with_json(payload);
        let response = self.send(request).await?;

        let location = response.header("location").ok_or_else(|| {
            Error::Response("payment creation answer without Location header".to_string())
        })?;
        let id = payment_id_from_location(location)?;
        info!("Payment created with id {}", id);

        let now = self.now();
        self.payment.id = Some(id.clone());
        self.payment.set_extra(extra::BANK_PAYMENT_ID, Some(id));
        self.payment
            .set_extra(extra::INITIATION_TIME, Some(now.to_rfc3339()));
        self.payment
            .set_extra(extra::INITIATION_REQUEST_ID, response.request_id.clone());

        let data = validation_data(&response)?;
        self.initialize_validation(data, pkce)
    }

    fn initialize_validation(&mut self, data: ValidationData, pkce: Option<PkceData>) -> Step<()> {
        self.state.payment_nonce = data.nonce.clone();
        self.state.validation_approach = data.approach;

        if data.approach != ValidationApproach::Redirect {
            return Err(Error::Configuration(format!(
                "unhandled validation approach {}",
                data.approach
            ))
            .into());
        }

        let flow = self.config.validation.redirect_flow;
        let url = self.consent_url(&data, flow, pkce.as_ref())?;
        let skippable = matches!(
            flow,
            RedirectFlow::Simple | RedirectFlow::SimpleWithoutConfirmation
        );
        info!("Redirecting the PSU for validation ({})", flow);
        Err(Interaction::Redirect { url, skippable }.into())
    }

    // -----------------------------------------------------------------------
    // Resumption
    // -----------------------------------------------------------------------

    pub(crate) async fn resume_validation(&mut self) -> Step<()> {
        if self.state.first_failure_at.is_some() {
            return self.resume_held_failure(Operation::Validation);
        }

        let confirmation_required = match self.validation_progress().await {
            Ok(ValidationProgress::ConfirmationRequired) => true,
            Ok(ValidationProgress::Pending) => false,
            Ok(ValidationProgress::Finished) => return Ok(()),
            Err(Halt::Failure(failure)) => return self.hold_failure(failure),
            Err(other) => return Err(other),
        };

        if self.state.validation_approach != ValidationApproach::Redirect {
            return Err(Error::Configuration(format!(
                "unhandled validation approach {}",
                self.state.validation_approach
            ))
            .into());
        }
        self.resume_validation_redirect(confirmation_required).await
    }

    async fn resume_validation_redirect(&mut self, confirmation_required: bool) -> Step<()> {
        let config = self.config;
        let flow = config.validation.redirect_flow;

        match self.settings.confirm {
            Some(Confirmation::Refused) => {
                info!("The PSU refused to confirm the payment");
                return Err(Failure::validation(
                    FailureReason::ConfirmationRefused,
                    Some("The payer refused to confirm the payment.".to_string()),
                )
                .into());
            }
            Some(Confirmation::Accepted) => {
                if flow.is_oauth() {
                    self.exchange_pending_code().await?;
                    if flow == RedirectFlow::OAuthAuthorisationCode {
                        self.confirm_oauth(Operation::Validation).await?;
                    }
                    self.reset_token();
                } else {
                    let factor = self.state.psu_auth_factor.clone();
                    self.confirm(Operation::Validation, "confirmation", factor)
                        .await?;
                }
                self.state.validation_confirmed = true;
                return Ok(());
            }
            None => {}
        }

        if self.state.validation_confirmation_required {
            debug!("Still waiting for the PSU to confirm");
            return Err(Interaction::SameInteraction.into());
        }
        let Some(callback) = self.callback() else {
            return Err(Interaction::SameInteraction.into());
        };

        match flow {
            RedirectFlow::OAuthAuthorisationCode
            | RedirectFlow::OAuthAuthorisationCodeWithoutConfirmation => {
                let code = self.callback_value(callback, flow, "code")?;
                self.state.oauth_authorisation_code = Some(code.clone());

                if flow == RedirectFlow::OAuthAuthorisationCodeWithoutConfirmation
                    && config.unsafe_confirmations
                {
                    self.state.oauth_token_to_be_requested = true;
                    return self.require_confirmation();
                }

                self.acquire_token(Grant::AuthorizationCode { code }).await?;
                if flow == RedirectFlow::OAuthAuthorisationCode {
                    return self.require_confirmation();
                }
                self.reset_token();
            }
            RedirectFlow::SimpleWithAuthFactor => {
                let factor = self.callback_value(callback, flow, "psuAuthenticationFactor")?;
                if config.unsafe_confirmations {
                    self.state.psu_auth_factor = Some(factor);
                    return self.require_confirmation();
                }
                self.confirm(Operation::Validation, "confirmation", Some(factor))
                    .await?;
            }
            RedirectFlow::Simple => {
                if confirmation_required {
                    self.state.psu_auth_factor = None;
                    return self.require_confirmation();
                }
                if config.confirmation_status_required || *callback == Callback::Skipped {
                    return Err(Interaction::SameInteraction.into());
                }
                if config.unsafe_confirmations {
                    self.state.psu_auth_factor = None;
                    return self.require_confirmation();
                }
                self.confirm(Operation::Validation, "confirmation", None)
                    .await?;
            }
            RedirectFlow::SimpleWithoutConfirmation => {
                return Err(Interaction::SameInteraction.into());
            }
        }

        self.state.validation_confirmed = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers shared with cancellation
    // -----------------------------------------------------------------------

    /// Reads a required callback parameter, or waits for a better callback.
    pub(crate) fn callback_value(
        &self,
        callback: &Callback,
        flow: RedirectFlow,
        name: &str,
    ) -> Step<String> {
        if *callback == Callback::Skipped {
            warn!("The redirect was skipped, but the {} flow needs the callback", flow);
            return Err(Interaction::SameInteraction.into());
        }
        callback.param(name).ok_or_else(|| {
            debug!("No {} on the callback yet", name);
            Interaction::SameInteraction.into()
        })
    }

    pub(crate) fn require_confirmation(&mut self) -> Step<()> {
        self.state.validation_confirmation_required = true;
        Err(Interaction::ConfirmationRequired.into())
    }

    /// Exchanges an authorization code stashed while waiting for confirmation.
    pub(crate) async fn exchange_pending_code(&mut self) -> Result<()> {
        if !self.state.oauth_token_to_be_requested {
            return Ok(());
        }
        if let Some(code) = self.state.oauth_authorisation_code.clone() {
            self.state.oauth_token_to_be_requested = false;
            self.acquire_token(Grant::AuthorizationCode { code }).await?;
        }
        Ok(())
    }

    /// Sends the confirmation call of a validation or cancellation.
    pub(crate) async fn confirm(
        &mut self,
        operation: Operation,
        path: &'static str,
        factor: Option<String>,
    ) -> Result<()> {
        let id = self.payment_id()?;
        let mut payload = Map::new();
        if let Some(nonce) = &self.state.payment_nonce {
            payload.insert("nonce".to_string(), json!(nonce));
        }
        if let Some(factor) = factor {
            payload.insert("psuAuthenticationFactor".to_string(), json!(factor));
        }

        info!("Confirming the {} of payment {}", operation, id);
        let request = Request::new(Method::Post, Endpoint::Confirmation { id, path })
            .with_json(Value::Object(payload));
        self.send(request).await?;
        Ok(())
    }

    pub(crate) async fn confirm_oauth(&mut self, operation: Operation) -> Result<()> {
        let config = self.config;
        let interaction = match operation {
            Operation::Validation => &config.validation,
            Operation::Cancellation => &config.cancellation,
        };
        let factor = match interaction.oauth_confirmation_factor {
            ConfirmationFactor::None => None,
            ConfirmationFactor::Code => self.state.oauth_authorisation_code.clone(),
            ConfirmationFactor::Token => self.state.oauth_token.clone(),
        };
        self.confirm(operation, interaction.oauth_confirmation_path(), factor)
            .await
    }
}
