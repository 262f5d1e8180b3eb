//! Payment cancellation state machine.
//!
//! Cancelling replays the payment-request document built at creation with a
//! cancellation status on top, then goes through the same redirect and
//! confirmation steps as validation. The bank status is the only proof of
//! success: the flow ends once the payment reads as cancelled.

use crate::config::{CancellationReason, RedirectFlow};
use crate::dialect::CreationParameters;
use crate::error::Error;
use crate::flow::{Flow, Halt, Replay, Step};
use crate::model::extra;
use crate::outcome::{Failure, FailureReason, Interaction, Operation};
use crate::pkce::PkceData;
use crate::response::{applied_approach, validation_data, ValidationData};
use crate::settings::Confirmation;
use crate::state::ValidationApproach;
use crate::status::{decode_cancellation_status, CancellationStatus};
use crate::token::Grant;
use crate::transport::{Endpoint, Method, Request};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Where the cancellation stands according to the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancellationProgress {
    Pending,
    Cancelled,
}

impl<'a> Flow<'a> {
    pub(crate) async fn cancel(&mut self, reason: CancellationReason) -> Step<()> {
        let config = self.config;
        let Some(status_reason) = config.cancellation_reasons.get(&reason) else {
            return Err(Failure::cancellation(
                FailureReason::Other,
                Some("Unsupported cancellation reason.".to_string()),
            )
            .into());
        };

        if self.payment.id.is_none() || !self.state.has_creation_parameters() {
            return Err(Failure::cancellation(
                FailureReason::NotCancellable,
                Some("Unable to cancel the payment due to internal changes.".to_string()),
            )
            .into());
        }

        self.reset_token();
        self.check_pre_step().await?;

        match self.run_cancellation(status_reason).await {
            Ok(()) => {
                info!("Payment {:?} is cancelled", self.payment.id);
                self.state.reset_validation();
                Ok(())
            }
            Err(Halt::Interaction(interaction)) => Err(Halt::Interaction(interaction)),
            Err(other) => {
                self.state.reset_validation();
                Err(other)
            }
        }
    }

    async fn run_cancellation(&mut self, status_reason: &str) -> Step<()> {
        if self.state.validation_approach == ValidationApproach::None {
            self.create_cancellation(status_reason).await?;
        } else {
            self.resume_cancellation().await?;
        }

        match self.cancellation_progress().await? {
            CancellationProgress::Cancelled => Ok(()),
            CancellationProgress::Pending => Err(Error::Inconsistent(
                "cancellation has ended, but the payment is not cancelled".to_string(),
            )
            .into()),
        }
    }

    pub(crate) async fn check_during_cancellation(&mut self) -> Step<()> {
        if self.state.first_failure_at.is_some() {
            return self.resume_held_failure(Operation::Cancellation);
        }
        self.check_pre_step().await?;
        self.with_token_retry(Replay::CheckCancellation).await
    }

    pub(crate) async fn check_cancellation_status(&mut self) -> Step<()> {
        match self.cancellation_progress().await? {
            CancellationProgress::Cancelled => Ok(()),
            CancellationProgress::Pending => Err(Interaction::SameInteraction.into()),
        }
    }

    async fn cancellation_progress(&mut self) -> Step<CancellationProgress> {
        let data = self.payment_status_data().await?;
        match decode_cancellation_status(&data) {
            CancellationStatus::Cancelled => Ok(CancellationProgress::Cancelled),
            CancellationStatus::Cancellable => Ok(CancellationProgress::Pending),
            CancellationStatus::NotCancellable => Err(Failure::cancellation(
                FailureReason::NotCancellable,
                Some(format!(
                    "The payment cannot be cancelled in status {}.",
                    data.status.as_deref().unwrap_or("unknown")
                )),
            )
            .into()),
        }
    }

    async fn create_cancellation(&mut self, status_reason: &str) -> Step<()> {
        let config = self.config;

        if self.cancellation_progress().await? == CancellationProgress::Cancelled {
            return Err(Failure::cancellation(
                FailureReason::AlreadyCancelled,
                Some("The payment has already been cancelled.".to_string()),
            )
            .into());
        }

        let params = match (
            self.state.payment_creation_date,
            self.state.payment_information_id.clone(),
            self.state.payment_instruction_ids.clone(),
        ) {
            (Some(creation_date), Some(payment_information_id), Some(instruction_ids)) => {
                CreationParameters {
                    creation_date,
                    payment_information_id,
                    instruction_ids,
                }
            }
            _ => {
                return Err(Error::Inconsistent(
                    "creation parameters disappeared from the session".to_string(),
                )
                .into())
            }
        };

        let pkce = self.new_pkce(&config.cancellation);
        let mut payload = self.dialect.build_payload(self.payment, &params)?;

        if config.cancellation_on_instructions {
            if let Some(Value::Array(transactions)) = payload.get_mut("creditTransferTransaction") {
                for transaction in transactions {
                    transaction["transactionStatus"] = json!(config.cancellation_status);
                    transaction["statusReasonInformation"] = json!(status_reason);
                }
            }
        }
        payload["paymentInformationStatus"] = json!(config.cancellation_status);
        payload["statusReasonInformation"] = json!(status_reason);

        let mut supplementary = self.supplementary_data(&config.cancellation, pkce.as_ref())?;
        if config.cancellation_include_applied_approach {
            let document = self.payment_document().await?;
            if let Some(approach) = applied_approach(&document) {
                supplementary["appliedAuthenticationApproach"] = json!(approach);
            }
        }
        payload["supplementaryData"] = supplementary;

        let id = self.payment_id()?;
        info!("Requesting the cancellation of payment {} ({})", id, status_reason);
        let request =
            Request::new(Method::Put, Endpoint::PaymentRequest { id }).with_json(payload);
        let response = self.send(request).await?;

        let now = self.now();
        self.payment
            .set_extra(extra::CANCELLATION_TIME, Some(now.to_rfc3339()));
        self.payment
            .set_extra(extra::CANCELLATION_REQUEST_ID, response.request_id.clone());

        let data = validation_data(&response)?;
        self.initialize_cancellation(data, pkce).await
    }

    async fn initialize_cancellation(
        &mut self,
        data: ValidationData,
        pkce: Option<PkceData>,
    ) -> Step<()> {
        self.state.payment_nonce = data.nonce.clone();
        self.state.validation_approach = data.approach;

        match data.approach {
            ValidationApproach::None => match self.cancellation_progress().await? {
                CancellationProgress::Cancelled => Ok(()),
                CancellationProgress::Pending => Err(Error::Inconsistent(
                    "the bank accepted the cancellation without approach but ignored it"
                        .to_string(),
                )
                .into()),
            },
            ValidationApproach::Redirect => {
                let flow = self.config.cancellation.redirect_flow;
                let url = self.consent_url(&data, flow, pkce.as_ref())?;
                info!("Redirecting the PSU for cancellation ({})", flow);
                Err(Interaction::Redirect {
                    url,
                    skippable: flow == RedirectFlow::SimpleWithoutConfirmation,
                }
                .into())
            }
            other => Err(Error::Configuration(format!(
                "unhandled cancellation approach {}",
                other
            ))
            .into()),
        }
    }

    async fn resume_cancellation(&mut self) -> Step<()> {
        if self.state.first_failure_at.is_some() {
            return self.resume_held_failure(Operation::Cancellation);
        }

        match self.cancellation_progress().await {
            Ok(CancellationProgress::Cancelled) => return Ok(()),
            Ok(CancellationProgress::Pending) => {}
            Err(Halt::Failure(failure)) => return self.hold_failure(failure),
            Err(other) => return Err(other),
        }

        if self.state.validation_approach != ValidationApproach::Redirect {
            return Err(Error::Configuration(format!(
                "unhandled cancellation approach {}",
                self.state.validation_approach
            ))
            .into());
        }
        self.resume_cancellation_redirect().await
    }

    async fn resume_cancellation_redirect(&mut self) -> Step<()> {
        let config = self.config;
        let flow = config.cancellation.redirect_flow;

        match self.settings.confirm {
            Some(Confirmation::Refused) => {
                info!("The PSU refused to confirm the cancellation");
                return Err(Failure::cancellation(
                    FailureReason::ConfirmationRefused,
                    Some("The payer refused to confirm the cancellation.".to_string()),
                )
                .into());
            }
            Some(Confirmation::Accepted) => {
                if flow.is_oauth() {
                    self.exchange_pending_code().await?;
                    if flow == RedirectFlow::OAuthAuthorisationCode {
                        self.confirm_oauth(Operation::Cancellation).await?;
                    }
                    self.reset_token();
                } else {
                    let factor = self.state.psu_auth_factor.clone();
                    self.confirm(Operation::Cancellation, "confirmation", factor)
                        .await?;
                }
                return Ok(());
            }
            None => {}
        }

        if self.state.validation_confirmation_required {
            debug!("Still waiting for the PSU to confirm the cancellation");
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
                self.confirm(Operation::Cancellation, "confirmation", Some(factor))
                    .await?;
            }
            RedirectFlow::Simple | RedirectFlow::SimpleWithoutConfirmation => {
                return Err(Interaction::SameInteraction.into());
            }
        }

        Ok(())
    }
}
