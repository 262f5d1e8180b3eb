//! Public entry points of the payment initiation engine.

use crate::clock::{Clock, SystemClock};
use crate::config::{CancellationReason, EngineConfig};
use crate::dialect::{Dialect, StetDialect};
use crate::error::{Error, Result};
use crate::flow::{Flow, Halt, Step};
use crate::model::Payment;
use crate::outcome::Outcome;
use crate::settings::Settings;
use crate::state::SessionState;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives payments against one bank.
///
/// The engine holds no per-payment state: each call borrows the caller's
/// [`Payment`] and [`SessionState`], and the caller persists both between
/// calls. A call returning [`Outcome::InteractionRequired`] may be followed,
/// possibly from another process, by the same call with refreshed
/// [`Settings`] (callback URL, confirmation decision).
#[derive(Debug, Clone)]
pub struct PaymentEngine {
    config: EngineConfig,
    settings: Settings,
    transport: Arc<dyn Transport>,
    dialect: Arc<dyn Dialect>,
    clock: Arc<dyn Clock>,
}

impl PaymentEngine {
    /// Creates an engine using the STET payload layout and the wall clock.
    pub fn new(config: EngineConfig, settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let dialect = Arc::new(StetDialect::new(&config));
        Self {
            config,
            settings,
            transport,
            dialect,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the payment-request document layout.
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Replaces the clock used for token expiry and failure delays.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the per-caller settings, such as the callback URL.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the caller settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn flow<'a>(&'a self, payment: &'a mut Payment, state: &'a mut SessionState) -> Flow<'a> {
        Flow::new(
            &self.config,
            &self.settings,
            self.dialect.as_ref(),
            self.transport.as_ref(),
            self.clock.as_ref(),
            payment,
            state,
        )
    }

    /// Creates the payment, or resumes its validation when it already has a
    /// bank identifier.
    pub async fn create_and_validate(
        &self,
        payment: &mut Payment,
        state: &mut SessionState,
    ) -> Result<Outcome> {
        let step = self.flow(payment, state).create_and_validate().await;
        into_outcome("create_and_validate", step)
    }

    /// Polls the bank while the PSU is authenticating.
    ///
    /// [`Outcome::Completed`] means the PSU interaction is over and
    /// [`PaymentEngine::create_and_validate`] should be called to conclude.
    pub async fn check_during_creation(
        &self,
        payment: &mut Payment,
        state: &mut SessionState,
    ) -> Result<Outcome> {
        let step = self.flow(payment, state).check_during_creation().await;
        into_outcome("check_during_creation", step)
    }

    /// Cancels the payment, or resumes a cancellation in progress.
    pub async fn cancel(
        &self,
        payment: &mut Payment,
        state: &mut SessionState,
        reason: CancellationReason,
    ) -> Result<Outcome> {
        let step = self.flow(payment, state).cancel(reason).await;
        into_outcome("cancel", step)
    }

    /// Polls the bank while the PSU is authenticating a cancellation.
    ///
    /// [`Outcome::Completed`] means the payment reads as cancelled and
    /// [`PaymentEngine::cancel`] should be called to conclude.
    pub async fn check_during_cancellation(
        &self,
        payment: &mut Payment,
        state: &mut SessionState,
    ) -> Result<Outcome> {
        let step = self.flow(payment, state).check_during_cancellation().await;
        into_outcome("check_during_cancellation", step)
    }

    /// Updates the payer, the status extras and the instruction statuses
    /// from the bank.
    pub async fn refresh(&self, payment: &mut Payment, state: &mut SessionState) -> Result<()> {
        let step = self.flow(payment, state).refresh().await;
        match into_outcome("refresh", step)? {
            Outcome::Completed => Ok(()),
            other => Err(Error::Inconsistent(format!(
                "refresh ended with {:?}",
                other
            ))),
        }
    }
}

fn into_outcome(operation: &str, step: Step<()>) -> Result<Outcome> {
    match step {
        Ok(()) => {
            info!("{} completed", operation);
            Ok(Outcome::Completed)
        }
        Err(Halt::Interaction(interaction)) => {
            info!("{} needs a PSU interaction: {:?}", operation, interaction);
            Ok(interaction.into())
        }
        Err(Halt::Failure(failure)) => {
            warn!("{}: {}", operation, failure);
            Ok(failure.into())
        }
        Err(Halt::Error(err)) => Err(err),
    }
}
