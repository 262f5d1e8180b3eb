//! Shared helpers for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use stet_pis::{
    Body, Clock, EngineConfig, Error, Instruction, Method, Payment, PaymentAccount, PaymentEngine,
    Request, Response, Result, SessionState, Settings, Transport, ValidationApproach,
};

pub const PAYMENT_ID: &str = "abc123";
pub const CONSENT_URL: &str = "https://bank.example/sca?paymentRequestResourceId=abc123";
pub const REDIRECT_URI: &str = "https://app.example/callback";
pub const BASE_URL: &str = "https://api.bank.example/v1/";

/// Route key used to script and count requests, e.g. `GET payment-requests/abc123`.
pub fn route(method: Method, request_path: &str) -> String {
    format!("{} {}", method, request_path)
}

fn request_route(request: &Request) -> String {
    route(
        request.method,
        &request.endpoint.path().unwrap_or_else(|| "token".to_string()),
    )
}

/// Transport answering from per-route queues. The last answer of a queue is
/// repeated once the others are consumed.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, request_path: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .entry(route(method, request_path))
            .or_default()
            .push_back(response);
    }

    /// Drops the scripted answers of a route.
    pub fn clear(&self, method: Method, request_path: &str) {
        self.routes
            .lock()
            .unwrap()
            .remove(&route(method, request_path));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, request_path: &str) -> usize {
        let key = route(method, request_path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request_route(request) == key)
            .count()
    }

    pub fn last(&self, method: Method, request_path: &str) -> Option<Request> {
        let key = route(method, request_path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|request| request_route(request) == key)
            .cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(&self, request: Request) -> Result<Response> {
        let key = request_route(&request);
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&key)
            .ok_or_else(|| Error::Transport(format!("no scripted answer for {}", key)))?;
        let mut response = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| Error::Transport(format!("no scripted answer for {}", key)))?
        };

        response.url = format!(
            "{}{}",
            BASE_URL,
            request.endpoint.path().unwrap_or_else(|| "token".to_string())
        );
        response.request_id = Some(format!("req-{}", index));
        Ok(response)
    }
}

/// Clock moved by hand.
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + delta;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn settings() -> Settings {
    Settings::new("client-42", REDIRECT_URI)
        .with_client_secret("s3cret")
        .with_error_uri("https://app.example/error")
        .with_redirect_state("st-1")
}

pub fn engine(
    config: EngineConfig,
    settings: Settings,
    transport: &Arc<MockTransport>,
    clock: &Arc<TestClock>,
) -> PaymentEngine {
    PaymentEngine::new(config, settings, transport.clone()).with_clock(clock.clone())
}

pub fn payment() -> Payment {
    Payment::new(vec![
        Instruction::new(
            "10.00",
            "EUR",
            PaymentAccount::new("ACME", "FR7612345987650123456789014"),
        )
        .with_label("Invoice 42"),
    ])
}

/// Payment created at the bank, waiting for the PSU.
pub fn created_payment() -> Payment {
    let mut payment = payment();
    payment.id = Some(PAYMENT_ID.to_string());
    payment.instructions[0].reference_id = Some("E2E0000000000000000000000000001".to_string());
    payment
}

/// Session state right after creation, with a valid pre-step token.
pub fn created_state(clock: &TestClock) -> SessionState {
    let mut state = SessionState::new();
    state.oauth_token = Some("token-valid".to_string());
    state.oauth_token_type = Some("Bearer".to_string());
    state.oauth_token_expires_at = Some(clock.now() + Duration::hours(1));
    state.payment_nonce = Some("n0nce".to_string());
    state.validation_approach = ValidationApproach::Redirect;
    state.payment_creation_date = Some(clock.now() - Duration::minutes(1));
    state.payment_information_id = Some("pi-0001".to_string());
    state.payment_instruction_ids = Some(vec!["instr-0001".to_string()]);
    state
}

pub fn payment_path() -> String {
    format!("payment-requests/{}", PAYMENT_ID)
}

pub fn token_response(token: &str) -> Response {
    Response::new(
        200,
        json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3600
        }),
    )
}

pub fn status_response(status: &str, reason: Option<&str>) -> Response {
    let mut request = json!({ "paymentInformationStatus": status });
    if let Some(reason) = reason {
        request["statusReasonInformation"] = json!(reason);
    }
    Response::new(200, json!({ "paymentRequest": request }))
}

pub fn redirect_response(status: u16) -> Response {
    Response::new(
        status,
        json!({
            "appliedAuthenticationApproach": "REDIRECT",
            "nonce": "n0nce",
            "_links": { "consentApproval": { "href": CONSENT_URL } }
        }),
    )
}

pub fn created_response() -> Response {
    redirect_response(201).with_header(
        "Location",
        &format!("{}payment-requests/{}", BASE_URL, PAYMENT_ID),
    )
}

pub fn error_response(status: u16) -> Response {
    Response::new(
        status,
        json!({ "error": "invalid_token", "message": "The access token is not valid" }),
    )
}

/// Value of a form field or JSON member of a recorded request.
pub fn body_value(request: &Request, key: &str) -> Option<String> {
    match &request.body {
        Body::Form(form) => form
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone()),
        Body::Json(Value::Object(map)) => map.get(key).and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }),
        _ => None,
    }
}

pub fn json_body(request: &Request) -> Value {
    match &request.body {
        Body::Json(value) => value.clone(),
        _ => Value::Null,
    }
}
