//! Per-call execution context shared by the validation and cancellation
//! state machines.
//!
//! A [`Flow`] lives for exactly one entry point call. It borrows the caller's
//! payment and session state, performs bank calls through the transport and
//! carries the few facts that must not outlive the call, such as whether a
//! token was minted during it.

use crate::clock::Clock;
use crate::config::{EngineConfig, PreStepType};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::model::{extra, Payment};
use crate::outcome::{Failure, Interaction};
use crate::psu::psu_headers;
use crate::response::{error_details, payment_status};
use crate::settings::{Callback, Settings};
use crate::state::SessionState;
use crate::status::StatusData;
use crate::transport::{Endpoint, Request, Response, Transport};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

const ACCEPT_LANGUAGE: &str = "fr,fr-FR;q=0.3";

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

/// Why a step stopped before completing.
#[derive(Debug)]
pub(crate) enum Halt {
    Interaction(Interaction),
    Failure(Failure),
    Error(Error),
}

pub(crate) type Step<T> = std::result::Result<T, Halt>;

impl From<Error> for Halt {
    fn from(err: Error) -> Self {
        Halt::Error(err)
    }
}

impl From<Failure> for Halt {
    fn from(failure: Failure) -> Self {
        Halt::Failure(failure)
    }
}

impl From<Interaction> for Halt {
    fn from(interaction: Interaction) -> Self {
        Halt::Interaction(interaction)
    }
}

/// Operations replayed after a stale token was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    ResumeValidation,
    CheckCreation,
    CheckCancellation,
    Refresh,
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

pub(crate) struct Flow<'a> {
    pub(crate) config: &'a EngineConfig,
    pub(crate) settings: &'a Settings,
    pub(crate) dialect: &'a dyn Dialect,
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    pub(crate) payment: &'a mut Payment,
    pub(crate) state: &'a mut SessionState,
    /// A token was minted during this call.
    pub(crate) new_token: bool,
    /// Last payment-request document received, while still current.
    current_payment: Option<Value>,
}

impl<'a> Flow<'a> {
    pub(crate) fn new(
        config: &'a EngineConfig,
        settings: &'a Settings,
        dialect: &'a dyn Dialect,
        transport: &'a dyn Transport,
        clock: &'a dyn Clock,
        payment: &'a mut Payment,
        state: &'a mut SessionState,
    ) -> Self {
        Self {
            config,
            settings,
            dialect,
            transport,
            clock,
            payment,
            state,
            new_token: false,
            current_payment: None,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn callback(&self) -> Option<&'a Callback> {
        self.settings.auth_uri.as_ref()
    }

    pub(crate) fn payment_id(&self) -> Result<String> {
        self.payment
            .id
            .clone()
            .ok_or_else(|| Error::Inconsistent("the payment has no bank identifier".to_string()))
    }

    /// Sends a request to the bank and turns error statuses into errors.
    pub(crate) async fn send(&mut self, mut request: Request) -> Result<Response> {
        if request.header("Accept").is_none() {
            request
                .headers
                .push(("Accept".to_string(), self.config.accept_header().to_string()));
        }
        if request.endpoint != Endpoint::Token {
            request
                .headers
                .push(("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()));
            if request.header("Authorization").is_none() {
                if let Some(authorization) = self.state.authorization() {
                    request
                        .headers
                        .push(("Authorization".to_string(), authorization));
                }
            }
            if self.config.include_psu_headers {
                if let Some(information) = &self.settings.request_information {
                    request.headers.extend(psu_headers(information)?);
                }
            }
        }

        let method = request.method;
        let endpoint = request.endpoint.clone();
        debug!("{} {:?}", method, endpoint);

        self.current_payment = None;
        let response = self.transport.submit(request).await?;

        let now = self.now();
        self.payment
            .set_extra(extra::LAST_REQUEST_TIME, Some(now.to_rfc3339()));
        self.payment
            .set_extra(extra::LAST_REQUEST_METHOD, Some(method.to_string()));
        self.payment
            .set_extra(extra::LAST_REQUEST_URL, Some(response.url.clone()));
        self.payment
            .set_extra(extra::LAST_REQUEST_ID, response.request_id.clone());

        if response.is_error() {
            let (code, message) = error_details(&response.body);
            self.payment.set_extra(extra::ERROR_CODE, code.clone());
            self.payment.set_extra(extra::ERROR_MESSAGE, message.clone());
            return Err(self.status_error(&response, &endpoint, code, message));
        }

        if endpoint.returns_payment() && payment_status(&response.body).is_some() {
            self.current_payment = Some(response.body.clone());
        }

        Ok(response)
    }

    fn status_error(
        &self,
        response: &Response,
        endpoint: &Endpoint,
        code: Option<String>,
        message: Option<String>,
    ) -> Error {
        let status = response.status;
        let detail = message
            .clone()
            .or_else(|| code.clone())
            .unwrap_or_else(|| format!("HTTP {}", status));

        match status {
            500..=599 => Error::Unavailable {
                status,
                message: detail,
            },
            401 | 403 => Error::AccessDenied {
                status,
                message: detail,
            },
            404 => match endpoint {
                Endpoint::PaymentRequest { id } if self.config.access_expired_on_404 => {
                    Error::AccessExpired(format!("payment {} is no longer reachable", id))
                }
                _ => Error::NotFound(detail),
            },
            _ => Error::Bank {
                status,
                code,
                message: detail,
            },
        }
    }

    /// Returns the current payment-request document, querying the bank only
    /// when the last answer did not already carry it.
    pub(crate) async fn payment_document(&mut self) -> Result<Value> {
        if let Some(document) = &self.current_payment {
            return Ok(document.clone());
        }

        self.check_pre_step().await?;
        let id = self.payment_id()?;
        let response = self.send(Request::get(Endpoint::PaymentRequest { id })).await?;
        Ok(response.body)
    }

    /// Returns the payment-wide status and records it in the payment extras.
    pub(crate) async fn payment_status_data(&mut self) -> Result<StatusData> {
        let document = self.payment_document().await?;
        let data = payment_status(&document)
            .ok_or_else(|| Error::Response("payment document without status".to_string()))?;

        self.payment
            .set_extra(extra::LAST_STATUS, data.status.clone());
        self.payment
            .set_extra(extra::LAST_STATUS_REASON, data.reason.clone());
        Ok(data)
    }

    // -----------------------------------------------------------------------
    // Retry on stale token
    // -----------------------------------------------------------------------

    fn should_retry_with_new_token(&self, err: &Error) -> bool {
        err.is_access_denied() && !self.new_token && self.config.pre_step != PreStepType::None
    }

    /// Runs `replay`, and runs it again once with a fresh pre-step token if
    /// the bank rejected the current one.
    pub(crate) async fn with_token_retry(&mut self, replay: Replay) -> Step<()> {
        loop {
            let result = match replay {
                Replay::ResumeValidation => self.resume_validation().await,
                Replay::CheckCreation => self.check_creation_status().await,
                Replay::CheckCancellation => self.check_cancellation_status().await,
                Replay::Refresh => self.refresh_payment().await,
            };

            match result {
                Err(Halt::Error(err)) if self.should_retry_with_new_token(&err) => {
                    warn!("{}; retrying {:?} with a new token", err, replay);
                    self.request_pre_step_token().await?;
                }
                other => return other,
            }
        }
    }
}
