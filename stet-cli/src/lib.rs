//! Command-line driver for the STET payment initiation engine.
//!
//! Each invocation loads the session file, runs one engine entry point and
//! writes the session back, so a payment can be driven across many
//! invocations while the PSU goes back and forth to the bank.

pub mod commands;
pub mod error;
pub mod output;
pub mod profile;
pub mod session;
