//! Delayed reporting of failures detected while waiting for a callback.
//!
//! When the bank rejects a payment while the PSU is still on its pages, the
//! status reason is often vague, while the callback URL the PSU is about to
//! hit may carry a precise error. The first failure is therefore frozen in
//! the session state and reported only once the callback arrived or the
//! configured timeout elapsed.
//!
//! ```text
//!   status says rejected ──▶ freeze (reason, message), first_failure_at = now
//!                                   │
//!           ┌───────────────────────┼────────────────────────┐
//!   callback with error      now < first + timeout      now ≥ first + timeout
//!           │                       │                        │
//!           ▼                       ▼                        ▼
//!   failure from callback     same interaction         frozen failure
//! ```

use crate::config::InteractionConfig;
use crate::flow::{Flow, Halt, Step};
use crate::outcome::{Failure, FailureReason, Interaction, Operation};
use crate::settings::Callback;
use crate::state::{FrozenFailure, ValidationApproach};
use tracing::{info, warn};

impl<'a> Flow<'a> {
    fn interaction_config(&self, operation: Operation) -> &'a InteractionConfig {
        match operation {
            Operation::Validation => &self.config.validation,
            Operation::Cancellation => &self.config.cancellation,
        }
    }

    /// Failure carried by the callback URL, if the bank put one there.
    fn callback_failure(&self, callback: &Callback, operation: Operation) -> Option<Failure> {
        let (code, description) = callback.error()?;
        let (reason, message) = match self.config.rejection_codes.get(&code) {
            Some(entry) => (entry.reason, description.or_else(|| Some(entry.message.clone()))),
            None => (FailureReason::Other, description.or_else(|| Some(code.clone()))),
        };
        info!("The callback reports error {}", code);
        Some(Failure {
            operation,
            reason,
            message,
        })
    }

    /// Decides what to do with a failure read from the bank status.
    pub(crate) fn hold_failure(&mut self, failure: Failure) -> Step<()> {
        if self.state.validation_approach != ValidationApproach::Redirect
            || !self.config.unsafe_url_error_detection
        {
            return Err(failure.into());
        }

        if let Some(callback @ Callback::Url(_)) = self.callback() {
            return Err(self
                .callback_failure(callback, failure.operation)
                .unwrap_or(failure)
                .into());
        }

        let Some(timeout) = self.interaction_config(failure.operation).failure_callback_timeout()
        else {
            return Err(failure.into());
        };

        let now = self.now();
        warn!(
            "Holding back {} until {} while waiting for the callback",
            failure,
            now + timeout
        );
        self.state.first_failure_at = Some(now);
        let frozen = Some(FrozenFailure {
            reason: failure.reason,
            message: failure.message,
        });
        match failure.operation {
            Operation::Validation => self.state.first_failure_validation = frozen,
            Operation::Cancellation => self.state.first_failure_cancellation = frozen,
        }
        Err(Interaction::SameInteraction.into())
    }

    /// Handles a call made while a failure is being held back.
    pub(crate) fn resume_held_failure(&mut self, operation: Operation) -> Step<()> {
        if self.config.unsafe_url_error_detection {
            if let Some(callback @ Callback::Url(_)) = self.callback() {
                if let Some(failure) = self.callback_failure(callback, operation) {
                    return Err(failure.into());
                }
            }

            let timeout = self.interaction_config(operation).failure_callback_timeout();
            if let (Some(first_failure_at), Some(timeout)) = (self.state.first_failure_at, timeout)
            {
                if first_failure_at + timeout > self.now() {
                    return Err(Interaction::SameInteraction.into());
                }
            }
        }

        let frozen = match operation {
            Operation::Validation => self.state.first_failure_validation.clone(),
            Operation::Cancellation => self.state.first_failure_cancellation.clone(),
        };
        let failure = match frozen {
            Some(frozen) => Failure {
                operation,
                reason: frozen.reason,
                message: frozen.message,
            },
            None => Failure {
                operation,
                reason: FailureReason::Unspecified,
                message: None,
            },
        };
        info!("Reporting the held back failure: {}", failure);
        Err(Halt::Failure(failure))
    }
}
