//! Transport abstraction between the engine and the bank API.
//!
//! The engine builds [`Request`]s against logical [`Endpoint`]s and
//! interprets status codes itself. Implementations only move bytes: they
//! resolve the endpoint against the bank's base URL, attach a unique
//! `X-Request-ID` and a `Date` header, and hand back whatever the bank
//! answered, including error statuses.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

/// HTTP method of a bank call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

/// Logical bank endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// OAuth2 token endpoint. Its URL is transport configuration.
    Token,
    /// `payment-requests`
    PaymentRequests,
    /// `payment-requests/{id}`
    PaymentRequest { id: String },
    /// `payment-requests/{id}/confirmation` or `payment-requests/{id}/o-confirmation`
    Confirmation { id: String, path: &'static str },
}

impl Endpoint {
    /// Path relative to the API base URL. `None` for the token endpoint.
    pub fn path(&self) -> Option<String> {
        match self {
            Endpoint::Token => None,
            Endpoint::PaymentRequests => Some("payment-requests".to_string()),
            Endpoint::PaymentRequest { id } => Some(format!("payment-requests/{}", id)),
            Endpoint::Confirmation { id, path } => {
                Some(format!("payment-requests/{}/{}", id, path))
            }
        }
    }

    /// Whether the answer is a payment-request document carrying its status.
    pub fn returns_payment(&self) -> bool {
        matches!(
            self,
            Endpoint::PaymentRequest { .. } | Endpoint::Confirmation { .. }
        )
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Sent compact, as `application/json`.
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// One bank call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub endpoint: Endpoint,
    pub body: Body,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            method,
            endpoint,
            body: Body::Empty,
            headers: Vec::new(),
        }
    }

    pub fn get(endpoint: Endpoint) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.body = Body::Form(form);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The bank's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: BTreeMap<String, String>,
    /// JSON body, `Value::Null` when empty or not JSON.
    pub body: Value,
    /// Final URL of the call, used to resolve relative links.
    pub url: String,
    /// `X-Request-ID` sent with the call.
    pub request_id: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
            url: String::new(),
            request_id: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Sends requests to the bank.
///
/// Returns `Err` only when no answer was obtained; HTTP error statuses come
/// back as a normal [`Response`].
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn submit(&self, request: Request) -> Result<Response>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Token.path(), None);
        assert_eq!(
            Endpoint::PaymentRequest {
                id: "abc123".to_string()
            }
            .path()
            .as_deref(),
            Some("payment-requests/abc123")
        );
        assert_eq!(
            Endpoint::Confirmation {
                id: "abc123".to_string(),
                path: "o-confirmation"
            }
            .path()
            .as_deref(),
            Some("payment-requests/abc123/o-confirmation")
        );
        assert!(!Endpoint::PaymentRequests.returns_payment());
    }

    #[test]
    fn test_header_lookup() {
        let request = Request::get(Endpoint::PaymentRequests).with_header("Accept", "application/json");
        assert_eq!(request.header("accept"), Some("application/json"));

        let response = Response::new(201, Value::Null).with_header("Location", "/payment-requests/x");
        assert_eq!(response.header("location"), Some("/payment-requests/x"));
        assert!(!response.is_error());
    }
}
