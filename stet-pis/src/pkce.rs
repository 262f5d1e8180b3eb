//! Proof Key for Code Exchange (RFC 7636).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const VERIFIER_LENGTH: usize = 64;

/// Challenge transformation announced in `code_challenge_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "plain")]
    Plain,
    #[default]
    S256,
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkceMethod::Plain => write!(f, "plain"),
            PkceMethod::S256 => write!(f, "S256"),
        }
    }
}

/// Verifier kept in session state and challenge sent to the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceData {
    pub verifier: String,
    pub challenge: String,
    pub method: PkceMethod,
}

impl PkceData {
    /// Generates a fresh verifier and derives its challenge.
    pub fn generate(method: PkceMethod) -> Self {
        let verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFIER_LENGTH)
            .map(char::from)
            .collect();
        Self::from_verifier(verifier, method)
    }

    pub fn from_verifier(verifier: String, method: PkceMethod) -> Self {
        let challenge = match method {
            PkceMethod::Plain => verifier.clone(),
            PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
        };
        Self {
            verifier,
            challenge,
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s256_challenge() {
        // Appendix B of RFC 7636.
        let pkce = PkceData::from_verifier(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
            PkceMethod::S256,
        );
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_plain_challenge_and_generation() {
        let pkce = PkceData::generate(PkceMethod::Plain);
        assert_eq!(pkce.verifier.len(), VERIFIER_LENGTH);
        assert_eq!(pkce.challenge, pkce.verifier);

        let other = PkceData::generate(PkceMethod::S256);
        assert_ne!(other.verifier, pkce.verifier);
        assert_eq!(other.method.to_string(), "S256");
    }
}
