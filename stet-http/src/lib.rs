//! HTTP transport for the STET payment initiation engine.
//!
//! [`HttpTransport`] implements [`stet_pis::Transport`] with reqwest. It
//! resolves logical endpoints against the configured base and token URLs,
//! attaches a fresh `X-Request-ID` and a `Date` header to every call, and
//! returns error statuses as ordinary responses so that the engine can
//! interpret them.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stet_http::{HttpTransport, HttpTransportConfig};
//! use stet_pis::{EngineConfig, PaymentEngine, Settings, StetVersion};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig::new(
//!     "https://api.bank.example/stet/psd2/v1.4.2/",
//!     "https://auth.bank.example/oauth/token",
//! ))?;
//! let engine = PaymentEngine::new(
//!     EngineConfig::preset(StetVersion::V1_4_2),
//!     Settings::new("client-id", "https://app.example/callback"),
//!     Arc::new(transport),
//! );
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::HttpTransport;
pub use config::HttpTransportConfig;
pub use error::{Error, Result};
