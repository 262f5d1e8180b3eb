//! # STET Payment Initiation Engine
//!
//! This crate drives one-time SEPA and SEPA-Instant payments through banks
//! implementing the STET PSD2 payment initiation API, from version 1.4.0 to
//! 1.6.3.
//!
//! ## Overview
//!
//! A payment initiation spans several HTTP round trips and a detour of the
//! PSU through the bank's authentication pages. The engine:
//!
//! - Manages the OAuth2 tokens shared by the pre-step, validation and cancellation
//! - Creates payment requests and sends the PSU to the bank for SCA
//! - Resumes from the callback URL or from polling, possibly in another process
//! - Interprets version dependent status codes and decides when to confirm
//! - Retries once with a fresh token when the bank rejects a stale one
//! - Optionally holds back failures until a more precise callback arrives
//!
//! ## Architecture
//!
//! - **Status decoder** ([`status`]): pure mapping of bank codes to outcomes
//! - **Token manager**: acquisition, refresh and reset of OAuth2 tokens
//! - **Validation and cancellation state machines**: driven from [`PaymentEngine`]
//! - **Transport** ([`transport`]): the seam to the HTTP layer
//! - **Dialect** ([`dialect`]): payment-request document layout
//! - **Session state** ([`state`]): everything needed to resume, serializable
//!
//! Entry points return an [`Outcome`]: the operation completed, the PSU must
//! act, or the payment failed for good. Transport and configuration problems
//! are reported as [`Error`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stet_pis::{
//!     EngineConfig, Instruction, Interaction, Outcome, Payment, PaymentAccount,
//!     PaymentEngine, SessionState, Settings, StetVersion, Transport,
//! };
//!
//! async fn pay(transport: Arc<dyn Transport>) -> stet_pis::Result<()> {
//!     let config = EngineConfig::preset(StetVersion::V1_4_2);
//!     let settings = Settings::new("client-id", "https://app.example/callback");
//!     let engine = PaymentEngine::new(config, settings, transport);
//!
//!     let mut payment = Payment::new(vec![Instruction::new(
//!         "10.00",
//!         "EUR",
//!         PaymentAccount::new("ACME", "FR7612345987650123456789014"),
//!     )]);
//!     let mut state = SessionState::new();
//!
//!     match engine.create_and_validate(&mut payment, &mut state).await? {
//!         Outcome::InteractionRequired {
//!             interaction: Interaction::Redirect { url, .. },
//!         } => println!("send the PSU to {}", url),
//!         other => println!("{:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod ids;
pub mod model;
pub mod outcome;
pub mod pkce;
pub mod psu;
pub mod response;
pub mod settings;
pub mod state;
pub mod status;
pub mod transport;

mod cancellation;
mod delay;
mod flow;
mod refresh;
mod token;
mod validation;

pub use clock::{Clock, SystemClock};
pub use config::{
    CancellationReason, ClientAuthMethod, ConfirmationFactor, EngineConfig, InteractionConfig,
    PreStepType, RedirectFlow, StetVersion,
};
pub use dialect::{CreationParameters, Dialect, StetDialect};
pub use engine::PaymentEngine;
pub use error::{Error, Result};
pub use model::{
    Instruction, InstructionStatus, InstructionStatusReason, Payment, PaymentAccount, ServiceLevel,
};
pub use outcome::{Failure, FailureReason, Interaction, Operation, Outcome};
pub use pkce::PkceMethod;
pub use settings::{Callback, Confirmation, Settings, SKIPPED_CALLBACK};
pub use state::{SessionState, ValidationApproach};
pub use transport::{Body, Endpoint, Method, Request, Response, Transport};
