//! Session file: the payment and its resumable state, persisted between
//! invocations.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use stet_pis::{Payment, SessionState};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    payment: Payment,
    #[serde(default)]
    state: Map<String, Value>,
}

/// A payment together with the engine state needed to resume it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub payment: Payment,
    pub state: SessionState,
}

impl Session {
    pub fn new(payment: Payment) -> Self {
        Self {
            payment,
            state: SessionState::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Session(format!("cannot read session file {}: {}", path.display(), e))
        })?;
        let document: SessionDocument = serde_json::from_str(&text)?;
        debug!("Loaded session from {}", path.display());
        Ok(Self {
            payment: document.payment,
            state: SessionState::from_document(Value::Object(document.state))?,
        })
    }

    /// Writes the session next to its final location, then renames it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let document = SessionDocument {
            payment: self.payment.clone(),
            state: self.state.to_document()?,
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&document)?)?;
        fs::rename(&tmp, path)?;
        debug!("Saved session to {}", path.display());
        Ok(())
    }
}
