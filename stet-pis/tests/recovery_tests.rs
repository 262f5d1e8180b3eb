mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::*;
use serde_json::json;
use stet_pis::{
    Callback, CancellationReason, Clock, EngineConfig, Error, FailureReason, Interaction, Method,
    Operation, Outcome, PreStepType, Response, StetVersion,
};

// ---------------------------------------------------------------------------
// Stale tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_retry_happens_once() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(Method::Get, &payment_path(), error_response(403));
    transport.on(Method::Post, "token", token_response("token-2"));

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let err = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap_err();

    assert_matches!(err, Error::AccessDenied { status: 403, .. });
    assert_eq!(transport.count(Method::Post, "token"), 1);
    assert_eq!(transport.count(Method::Get, &payment_path()), 2);
}

#[tokio::test]
async fn test_retry_with_new_token_succeeds() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(Method::Get, &payment_path(), error_response(401));
    transport.on(Method::Get, &payment_path(), status_response("ACTC", None));
    transport.on(Method::Post, "token", token_response("token-2"));

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let outcome = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap();

    assert_eq!(outcome, Interaction::SameInteraction.into());
    let retried = transport.last(Method::Get, &payment_path()).unwrap();
    assert_eq!(retried.header("Authorization"), Some("Bearer token-2"));
    assert_eq!(state.oauth_token.as_deref(), Some("token-2"));
}

#[tokio::test]
async fn test_no_retry_without_pre_step() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let config = EngineConfig::default().with_pre_step(PreStepType::None);
    let engine = engine(config, settings(), &transport, &clock);
    transport.on(Method::Get, &payment_path(), error_response(403));

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let result = engine.check_during_creation(&mut payment, &mut state).await;

    assert_matches!(result, Err(Error::AccessDenied { .. }));
    assert_eq!(transport.count(Method::Post, "token"), 0);
    assert_eq!(transport.count(Method::Get, &payment_path()), 1);
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(Method::Post, "token", token_response("token-3"));
    transport.on(Method::Get, &payment_path(), status_response("ACTC", None));

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    state.oauth_refresh_token = Some("refresh-1".to_string());
    clock.advance(Duration::hours(2));

    let outcome = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());

    let refresh = transport.last(Method::Post, "token").unwrap();
    assert_eq!(
        body_value(&refresh, "grant_type").as_deref(),
        Some("refresh_token")
    );
    assert_eq!(
        body_value(&refresh, "refresh_token").as_deref(),
        Some("refresh-1")
    );
    assert_eq!(state.oauth_token.as_deref(), Some("token-3"));
    // The bank did not rotate it.
    assert_eq!(state.oauth_refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_unavailable_bank() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        Response::new(503, json!({ "message": "Maintenance" })),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let err = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap_err();
    assert_matches!(err, Error::Unavailable { status: 503, ref message } if message == "Maintenance");
}

// ---------------------------------------------------------------------------
// Failures held back until the callback
// ---------------------------------------------------------------------------

fn delayed_config() -> EngineConfig {
    EngineConfig::preset(StetVersion::V1_4_0).with_unsafe_url_error_detection(true)
}

#[tokio::test]
async fn test_failure_held_until_timeout() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(delayed_config(), settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        status_response("RJCT", Some("AC01")),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);

    let outcome = engine
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());
    assert_eq!(state.first_failure_at, Some(clock.now()));
    assert_eq!(
        state.first_failure_validation.as_ref().map(|f| f.reason),
        Some(FailureReason::InvalidPayer)
    );

    clock.advance(Duration::minutes(5) - Duration::seconds(1));
    let outcome = engine
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());
    assert_eq!(transport.count(Method::Get, &payment_path()), 1);

    clock.advance(Duration::seconds(2));
    let outcome = engine
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_matches!(
        outcome,
        Outcome::Failed { failure } if failure.reason == FailureReason::InvalidPayer
            && failure.message.as_deref()
                == Some("The provided payer account is either invalid or does not exist.")
    );
}

#[tokio::test]
async fn test_status_check_keeps_held_failure() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(delayed_config(), settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        status_response("RJCT", Some("AC01")),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let outcome = engine
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());
    assert_eq!(transport.count(Method::Get, &payment_path()), 1);

    clock.advance(Duration::minutes(1));
    let outcome = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());

    clock.advance(Duration::minutes(4) + Duration::seconds(1));
    let outcome = engine
        .check_during_creation(&mut payment, &mut state)
        .await
        .unwrap();
    assert_matches!(
        outcome,
        Outcome::Failed { failure } if failure.reason == FailureReason::InvalidPayer
            && failure.operation == Operation::Validation
    );

    // The frozen failure is reported without asking the bank again.
    assert_eq!(transport.count(Method::Get, &payment_path()), 1);
}

#[tokio::test]
async fn test_cancellation_check_keeps_held_failure() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(delayed_config(), settings(), &transport, &clock);
    transport.on(Method::Post, "token", token_response("cancel-token"));
    transport.on(Method::Get, &payment_path(), status_response("ACSC", None));

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let outcome = engine
        .cancel(&mut payment, &mut state, CancellationReason::OrderedByPsu)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());
    assert_eq!(
        state.first_failure_cancellation.as_ref().map(|f| f.reason),
        Some(FailureReason::NotCancellable)
    );
    let gets = transport.count(Method::Get, &payment_path());

    clock.advance(Duration::minutes(1));
    let outcome = engine
        .check_during_cancellation(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());

    clock.advance(Duration::minutes(5));
    let outcome = engine
        .check_during_cancellation(&mut payment, &mut state)
        .await
        .unwrap();
    assert_matches!(
        outcome,
        Outcome::Failed { failure } if failure.reason == FailureReason::NotCancellable
            && failure.operation == Operation::Cancellation
    );
    assert_eq!(transport.count(Method::Get, &payment_path()), gets);
}

#[tokio::test]
async fn test_callback_error_replaces_held_failure() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    transport.on(
        Method::Get,
        &payment_path(),
        status_response("RJCT", Some("AC01")),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);

    let outcome = engine(delayed_config(), settings(), &transport, &clock)
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome, Interaction::SameInteraction.into());

    clock.advance(Duration::minutes(1));
    let with_error = settings()
        .with_callback(Callback::parse("https://app.example/error?error=AC06&state=st-1"));
    let outcome = engine(delayed_config(), with_error, &transport, &clock)
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.reason, FailureReason::InvalidPayer);
    assert_eq!(
        failure.message.as_deref(),
        Some("The provided payer account is blocked.")
    );
}

#[tokio::test]
async fn test_unknown_callback_error_keeps_description() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    transport.on(
        Method::Get,
        &payment_path(),
        status_response("RJCT", Some("AC01")),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let with_error = settings().with_callback(Callback::parse(
        "https://app.example/error?error=access_denied&error_description=User%20cancelled",
    ));

    let outcome = engine(delayed_config(), with_error, &transport, &clock)
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.reason, FailureReason::Other);
    assert_eq!(failure.message.as_deref(), Some("User cancelled"));
    assert_eq!(state.first_failure_at, None);
}

#[tokio::test]
async fn test_failure_reported_immediately_without_timeout() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let config = delayed_config().with_failure_callback_timeout(None);
    let engine = engine(config, settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        status_response("RJCT", Some("NOAS")),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    let outcome = engine
        .create_and_validate(&mut payment, &mut state)
        .await
        .unwrap();
    assert_eq!(outcome.failure().map(|f| f.reason), Some(FailureReason::Expired));
    assert_eq!(state.first_failure_at, None);
}
