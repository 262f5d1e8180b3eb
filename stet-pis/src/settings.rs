//! Caller-provided values read by the engine on each call.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use url::Url;

/// Marker passed instead of a callback URL when the caller chose not to wait
/// for the PSU to come back.
pub const SKIPPED_CALLBACK: &str = "skipped";

/// The PSU's answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Accepted,
    Refused,
}

impl FromStr for Confirmation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Confirmation::Accepted),
            "false" | "no" | "0" => Ok(Confirmation::Refused),
            _ => Err(format!("Invalid confirmation: {}", s)),
        }
    }
}

/// How the PSU came back from the bank's authentication page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
    /// The full callback URL, query string included.
    Url(String),
    /// The caller skipped the redirect.
    Skipped,
}

impl Callback {
    /// Reads a raw configuration value. Empty means no callback yet.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            SKIPPED_CALLBACK => Some(Callback::Skipped),
            url => Some(Callback::Url(url.to_string())),
        }
    }

    /// Value of a query parameter of the callback URL.
    pub fn param(&self, name: &str) -> Option<String> {
        match self {
            Callback::Url(url) => query_param(url, name),
            Callback::Skipped => None,
        }
    }

    /// Error reported by the bank on the callback, with its description.
    pub fn error(&self) -> Option<(String, Option<String>)> {
        let code = self.param("error").or_else(|| self.param("error_code"))?;
        Some((code, self.param("error_description")))
    }
}

/// Read-only values the engine looks up while running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the bank sends the PSU after a successful authentication.
    pub redirect_uri: String,

    /// Where the bank sends the PSU after a failure. Defaults to `redirect_uri`.
    pub error_uri: Option<String>,

    pub client_id: String,

    pub client_secret: Option<String>,

    /// Opaque `state` value echoed back on callbacks.
    pub redirect_state: Option<String>,

    /// The PSU's answer to the last confirmation request, if any.
    pub confirm: Option<Confirmation>,

    /// How the PSU came back, if they did.
    pub auth_uri: Option<Callback>,

    /// PSU context forwarded as `PSU-*` headers.
    pub request_information: Option<BTreeMap<String, String>>,
}

impl Settings {
    pub fn new(client_id: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            ..Default::default()
        }
    }

    pub fn with_client_secret(mut self, secret: &str) -> Self {
        self.client_secret = Some(secret.to_string());
        self
    }

    pub fn with_error_uri(mut self, error_uri: &str) -> Self {
        self.error_uri = Some(error_uri.to_string());
        self
    }

    pub fn with_redirect_state(mut self, state: &str) -> Self {
        self.redirect_state = Some(state.to_string());
        self
    }

    pub fn with_confirmation(mut self, confirm: Option<Confirmation>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_callback(mut self, callback: Option<Callback>) -> Self {
        self.auth_uri = callback;
        self
    }

    pub fn with_request_information(mut self, information: BTreeMap<String, String>) -> Self {
        self.request_information = Some(information);
        self
    }

    pub fn error_uri(&self) -> &str {
        self.error_uri.as_deref().unwrap_or(&self.redirect_uri)
    }
}

/// Appends query parameters to `base`, skipping absent values.
pub fn url_with_params(base: &str, params: &[(&str, Option<&str>)]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::InvalidInput(format!("invalid URL {:?}: {}", base, e)))?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }
    // An empty `?` is left behind when nothing was appended to a bare URL.
    let url = url.to_string();
    Ok(url.strip_suffix('?').map(str::to_string).unwrap_or(url))
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_parsing() {
        assert_eq!(Callback::parse(""), None);
        assert_eq!(Callback::parse("skipped"), Some(Callback::Skipped));

        let callback = Callback::parse("https://app.example/cb?state=s1&code=xyz").unwrap();
        assert_eq!(callback.param("code").as_deref(), Some("xyz"));
        assert_eq!(callback.param("psuAuthenticationFactor"), None);
        assert_eq!(callback.error(), None);
        assert_eq!(Callback::Skipped.param("code"), None);
    }

    #[test]
    fn test_callback_error() {
        let callback = Callback::parse(
            "https://app.example/err?error=access_denied&error_description=PSU%20refused",
        )
        .unwrap();
        assert_eq!(
            callback.error(),
            Some(("access_denied".to_string(), Some("PSU refused".to_string())))
        );

        let callback = Callback::parse("https://app.example/err?error_code=AC06").unwrap();
        assert_eq!(callback.error(), Some(("AC06".to_string(), None)));
    }

    #[test]
    fn test_url_with_params() {
        let url = url_with_params(
            "https://bank.example/authorize?ui=web",
            &[
                ("state", Some("s1")),
                ("client_id", Some("client")),
                ("code_challenge", None),
            ],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://bank.example/authorize?ui=web&state=s1&client_id=client"
        );

        let url = url_with_params("https://app.example/cb", &[("state", None)]).unwrap();
        assert_eq!(url, "https://app.example/cb");
    }

    #[test]
    fn test_confirmation_parsing() {
        assert_eq!("true".parse::<Confirmation>(), Ok(Confirmation::Accepted));
        assert_eq!("False".parse::<Confirmation>(), Ok(Confirmation::Refused));
        assert!("maybe".parse::<Confirmation>().is_err());
    }
}
