//! Configuration for the HTTP transport.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stet_pis::Endpoint;
use url::Url;

/// Where the bank API lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Base URL of the STET API, e.g. `https://api.bank.example/stet/psd2/v1.4.2/`.
    pub base_url: String,

    /// OAuth2 token endpoint.
    pub token_url: String,

    /// Timeout for one bank call in seconds.
    pub request_timeout_secs: u64,

    /// Optional `User-Agent` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_string(),
            token_url: "http://127.0.0.1:8000/token".to_string(),
            request_timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl HttpTransportConfig {
    pub fn new(base_url: &str, token_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token_url: token_url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = timeout_secs;
        self
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves a logical endpoint to an absolute URL.
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url> {
        match endpoint.path() {
            None => Url::parse(&self.token_url)
                .map_err(|e| Error::Config(format!("invalid token URL {}: {}", self.token_url, e))),
            Some(path) => {
                // Url::join drops the last segment of a base without trailing slash.
                let base = if self.base_url.ends_with('/') {
                    self.base_url.clone()
                } else {
                    format!("{}/", self.base_url)
                };
                Url::parse(&base)
                    .and_then(|base| base.join(&path))
                    .map_err(|e| Error::Config(format!("invalid base URL {}: {}", self.base_url, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let config = HttpTransportConfig::new(
            "https://api.bank.example/stet/psd2/v1.4.2",
            "https://auth.bank.example/oauth/token",
        );

        assert_eq!(
            config
                .endpoint_url(&Endpoint::PaymentRequest {
                    id: "abc123".to_string()
                })
                .unwrap()
                .as_str(),
            "https://api.bank.example/stet/psd2/v1.4.2/payment-requests/abc123"
        );
        assert_eq!(
            config
                .endpoint_url(&Endpoint::Confirmation {
                    id: "abc123".to_string(),
                    path: "o-confirmation"
                })
                .unwrap()
                .as_str(),
            "https://api.bank.example/stet/psd2/v1.4.2/payment-requests/abc123/o-confirmation"
        );
        assert_eq!(
            config.endpoint_url(&Endpoint::Token).unwrap().as_str(),
            "https://auth.bank.example/oauth/token"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = HttpTransportConfig::new("not a url", "https://auth.bank.example/token");
        assert!(matches!(
            config.endpoint_url(&Endpoint::PaymentRequests),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_timeout() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.with_timeout(5).request_timeout(),
            Duration::from_secs(5)
        );
    }
}
