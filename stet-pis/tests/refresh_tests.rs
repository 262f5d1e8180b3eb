mod common;

use assert_matches::assert_matches;
use common::*;
use serde_json::json;
use stet_pis::model::extra;
use stet_pis::{
    EngineConfig, Error, Instruction, InstructionStatus, InstructionStatusReason, Method,
    PaymentAccount, Response,
};

#[tokio::test]
async fn test_refresh_updates_payer_and_instructions() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        Response::new(
            200,
            json!({
                "paymentRequest": {
                    "paymentInformationStatus": "ACSC",
                    "debtor": { "name": "Jane Doe" },
                    "debtorAccount": { "iban": "FR7630006000011234567890189" },
                    "creditTransferTransaction": [
                        { "transactionStatus": "ACSC" },
                        { "transactionStatus": "RJCT", "statusReasonInformation": "DS02" }
                    ]
                }
            }),
        ),
    );

    let mut payment = created_payment();
    payment.instructions.push(Instruction::new(
        "5.00",
        "EUR",
        PaymentAccount::new("Globex", "DE89370400440532013000"),
    ));
    let mut state = created_state(&clock);
    state.reset_validation();

    engine.refresh(&mut payment, &mut state).await.unwrap();

    let payer = payment.payer.as_ref().unwrap();
    assert_eq!(payer.name.as_deref(), Some("Jane Doe"));
    assert_eq!(payer.iban.as_deref(), Some("FR7630006000011234567890189"));
    assert_eq!(payment.instructions[0].status, InstructionStatus::Done);
    assert_eq!(payment.instructions[1].status, InstructionStatus::Rejected);
    assert_eq!(
        payment.instructions[1].status_reason,
        InstructionStatusReason::CancelledByPsu
    );
    assert_eq!(
        payment.extra.get(extra::LAST_STATUS).map(String::as_str),
        Some("ACSC")
    );
    assert_eq!(
        payment.extra.get(extra::LAST_REQUEST_METHOD).map(String::as_str),
        Some("GET")
    );
}

#[tokio::test]
async fn test_refresh_uses_payment_status_for_accepted_instructions() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);
    transport.on(
        Method::Get,
        &payment_path(),
        Response::new(
            200,
            json!({
                "paymentRequest": {
                    "paymentInformationStatus": "PDNG",
                    "creditTransferTransaction": [{ "transactionStatus": "ACTC" }]
                }
            }),
        ),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);
    engine.refresh(&mut payment, &mut state).await.unwrap();

    assert_eq!(payment.instructions[0].status, InstructionStatus::Pending);
    assert_eq!(payment.payer, None);
}

#[tokio::test]
async fn test_refresh_on_gone_payment() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    transport.on(
        Method::Get,
        &payment_path(),
        Response::new(404, json!({ "message": "Unknown payment request" })),
    );

    let mut payment = created_payment();
    let mut state = created_state(&clock);

    let err = engine(EngineConfig::default(), settings(), &transport, &clock)
        .refresh(&mut payment, &mut state)
        .await
        .unwrap_err();
    assert_matches!(err, Error::NotFound(_));

    let config = EngineConfig::default().with_access_expired_on_404(true);
    let err = engine(config, settings(), &transport, &clock)
        .refresh(&mut payment, &mut state)
        .await
        .unwrap_err();
    assert_matches!(err, Error::AccessExpired(_));
}

#[tokio::test]
async fn test_refresh_needs_a_payment_id() {
    let transport = MockTransport::new();
    let clock = TestClock::new();
    let engine = engine(EngineConfig::default(), settings(), &transport, &clock);

    let mut payment = payment();
    let mut state = created_state(&clock);
    let err = engine.refresh(&mut payment, &mut state).await.unwrap_err();
    assert_matches!(err, Error::Inconsistent(_));
    assert!(transport.requests().is_empty());
}
