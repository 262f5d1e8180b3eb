//! Extraction of the fields the engine needs from bank answers.

use crate::error::{Error, Result};
use crate::model::PaymentAccount;
use crate::state::ValidationApproach;
use crate::status::StatusData;
use crate::transport::Response;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

static PAYMENT_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"payment-requests/([^/?#]+)/?$").expect("Failed to compile PAYMENT_ID_REGEX")
});

/// Approach, nonce and links returned when a payment or a cancellation is
/// submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationData {
    pub approach: ValidationApproach,
    pub nonce: Option<String>,
    /// Absolute link URLs by relation name.
    pub links: BTreeMap<String, String>,
}

impl ValidationData {
    pub fn link(&self, name: &str) -> Result<&str> {
        self.links
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Response(format!("missing `{}` link", name)))
    }
}

/// Reads the validation data of a creation or cancellation answer.
pub fn validation_data(response: &Response) -> Result<ValidationData> {
    let body = &response.body;

    let approach = match body.get("appliedAuthenticationApproach").and_then(Value::as_str) {
        None => ValidationApproach::None,
        Some(name) => ValidationApproach::from_wire(name).ok_or_else(|| {
            Error::Response(format!("unknown authentication approach {}", name))
        })?,
    };

    let mut links = BTreeMap::new();
    if let Some(Value::Object(map)) = body.get("_links") {
        for (name, value) in map {
            let href = match value {
                Value::String(href) => href.as_str(),
                Value::Object(link) => match link.get("href").and_then(Value::as_str) {
                    Some(href) => href,
                    None => continue,
                },
                _ => continue,
            };
            links.insert(name.clone(), resolve_link(&response.url, href)?);
        }
    }

    Ok(ValidationData {
        approach,
        nonce: string_at(body, &["nonce"]),
        links,
    })
}

fn resolve_link(base: &str, href: &str) -> Result<String> {
    if base.is_empty() {
        return Ok(href.to_string());
    }
    Ok(Url::parse(base)?.join(href)?.to_string())
}

/// Extracts the bank payment identifier from a `Location` header.
pub fn payment_id_from_location(location: &str) -> Result<String> {
    PAYMENT_ID_REGEX
        .captures(location)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| Error::Response(format!("no payment id in location {:?}", location)))
}

/// Payment-wide status of a payment-request document.
pub fn payment_status(body: &Value) -> Option<StatusData> {
    let status = string_at(body, &["paymentRequest", "paymentInformationStatus"])?;
    Some(StatusData {
        status: Some(status),
        reason: string_at(body, &["paymentRequest", "statusReasonInformation"]),
    })
}

/// Per-instruction statuses of a payment-request document, in order.
pub fn instruction_statuses(body: &Value) -> Vec<StatusData> {
    body.pointer("/paymentRequest/creditTransferTransaction")
        .and_then(Value::as_array)
        .map(|transactions| {
            transactions
                .iter()
                .map(|transaction| StatusData {
                    status: string_at(transaction, &["transactionStatus"]),
                    reason: string_at(transaction, &["statusReasonInformation"]),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Authentication approach the bank applied to a payment request.
pub fn applied_approach(body: &Value) -> Option<String> {
    string_at(
        body,
        &["paymentRequest", "supplementaryData", "appliedAuthenticationApproach"],
    )
}

/// Debtor of a payment-request document, when the bank filled it.
pub fn payer(body: &Value) -> Option<PaymentAccount> {
    let name = string_at(body, &["paymentRequest", "debtor", "name"]);
    let iban = string_at(body, &["paymentRequest", "debtorAccount", "iban"]);
    if name.is_none() && iban.is_none() {
        return None;
    }
    Some(PaymentAccount {
        name,
        iban,
        bic: None,
    })
}

/// Fields of an OAuth2 token answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

pub fn token_data(body: &Value) -> Result<TokenData> {
    let access_token = string_at(body, &["access_token"])
        .ok_or_else(|| Error::Response("token answer without access_token".to_string()))?;

    // Some banks send expires_in as a string.
    let expires_in = match body.get("expires_in") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };

    Ok(TokenData {
        access_token,
        token_type: string_at(body, &["token_type"]),
        expires_in,
        refresh_token: string_at(body, &["refresh_token"]),
    })
}

/// Error code and message of a STET or OAuth2 error document.
pub fn error_details(body: &Value) -> (Option<String>, Option<String>) {
    let code = string_at(body, &["error"]).or_else(|| string_at(body, &["errorCode"]));
    let message = string_at(body, &["message"])
        .or_else(|| string_at(body, &["errorDescription"]))
        .or_else(|| string_at(body, &["error_description"]));
    (code, message)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
