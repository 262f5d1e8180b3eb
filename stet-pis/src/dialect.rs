//! Payment-request document builders.

use crate::config::{EngineConfig, StetVersion};
use crate::error::{Error, Result};
use crate::model::{Payment, PaymentAccount, ServiceLevel};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fmt::Debug;

/// Parameters fixed at creation and replayed on cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationParameters {
    pub creation_date: DateTime<Utc>,
    pub payment_information_id: String,
    pub instruction_ids: Vec<String>,
}

/// Builds the payment-request document for one bank dialect.
///
/// The engine adds `supplementaryData` and, for cancellations, the status
/// fields on top of the returned document.
pub trait Dialect: Send + Sync + Debug {
    fn build_payload(&self, payment: &Payment, params: &CreationParameters) -> Result<Value>;
}

/// Payload layout of the STET PSD2 specification.
#[derive(Debug, Clone)]
pub struct StetDialect {
    version: StetVersion,
    charge_bearer: String,
}

impl StetDialect {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            version: config.version,
            charge_bearer: config.charge_bearer.clone(),
        }
    }

    fn remittance(&self, label: &str) -> Value {
        if self.version >= StetVersion::V1_6_2 {
            json!({ "unstructured": [label] })
        } else {
            json!([label])
        }
    }
}

fn party(account: &PaymentAccount) -> Map<String, Value> {
    let mut party = Map::new();
    if let Some(name) = &account.name {
        party.insert("creditor".to_string(), json!({ "name": name }));
    }
    if let Some(iban) = &account.iban {
        party.insert("creditorAccount".to_string(), json!({ "iban": iban }));
    }
    if let Some(bic) = &account.bic {
        party.insert("creditorAgent".to_string(), json!({ "bicFi": bic }));
    }
    party
}

fn timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, false)
}

impl Dialect for StetDialect {
    fn build_payload(&self, payment: &Payment, params: &CreationParameters) -> Result<Value> {
        if payment.instructions.is_empty() {
            return Err(Error::InvalidInput(
                "a payment needs at least one instruction".to_string(),
            ));
        }
        if payment.instructions.len() != params.instruction_ids.len() {
            return Err(Error::InvalidInput(format!(
                "{} instructions but {} instruction ids",
                payment.instructions.len(),
                params.instruction_ids.len()
            )));
        }

        let mut type_information = json!({ "serviceLevel": "SEPA" });
        if payment.service_level == ServiceLevel::SepaInstant {
            type_information["localInstrument"] = json!("INST");
        }

        let transactions: Vec<Value> = payment
            .instructions
            .iter()
            .zip(&params.instruction_ids)
            .map(|(instruction, instruction_id)| {
                let mut transaction = json!({
                    "paymentId": {
                        "instructionId": instruction_id,
                        "endToEndId": instruction.reference_id.as_deref().unwrap_or(instruction_id),
                    },
                    "instructedAmount": {
                        "currency": instruction.currency,
                        "amount": instruction.amount,
                    },
                    "beneficiary": party(&instruction.beneficiary),
                });
                if let Some(label) = &instruction.label {
                    transaction["remittanceInformation"] = self.remittance(label);
                }
                transaction
            })
            .collect();

        let execution_date = match payment.execution_date {
            Some(date) => format!("{}T00:00:00.000+00:00", date.format("%Y-%m-%d")),
            None => timestamp(&params.creation_date),
        };

        let mut payload = json!({
            "paymentInformationId": params.payment_information_id,
            "creationDateTime": timestamp(&params.creation_date),
            "numberOfTransactions": transactions.len(),
            "paymentTypeInformation": type_information,
            "chargeBearer": self.charge_bearer,
            "requestedExecutionDate": execution_date,
            "creditTransferTransaction": transactions,
        });

        if let Some(initiator) = &payment.initiating_party {
            payload["initiator"] = json!({ "name": initiator });
        }
        if let Some(payer) = &payment.payer {
            if let Some(name) = &payer.name {
                payload["debtor"] = json!({ "name": name });
            }
            if let Some(iban) = &payer.iban {
                payload["debtorAccount"] = json!({ "iban": iban });
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Instruction;
    use chrono::TimeZone;

    fn params(ids: &[&str]) -> CreationParameters {
        CreationParameters {
            creation_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            payment_information_id: "pi-1".to_string(),
            instruction_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn payment() -> Payment {
        Payment::new(vec![Instruction::new(
            "10.00",
            "EUR",
            PaymentAccount::new("ACME", "FR7612345987650123456789014"),
        )
        .with_label("Invoice 42")
        .with_reference_id("E2E-1")])
        .with_service_level(ServiceLevel::SepaInstant)
    }

    #[test]
    fn test_stet_payload() {
        let dialect = StetDialect::new(&EngineConfig::preset(StetVersion::V1_4_2));
        let payload = dialect.build_payload(&payment(), &params(&["i-1"])).unwrap();

        assert_eq!(payload["paymentInformationId"], "pi-1");
        assert_eq!(payload["creationDateTime"], "2024-03-01T09:30:00.000+00:00");
        assert_eq!(payload["numberOfTransactions"], 1);
        assert_eq!(payload["chargeBearer"], "SLEV");
        assert_eq!(payload["paymentTypeInformation"]["localInstrument"], "INST");

        let transaction = &payload["creditTransferTransaction"][0];
        assert_eq!(transaction["paymentId"]["instructionId"], "i-1");
        assert_eq!(transaction["paymentId"]["endToEndId"], "E2E-1");
        assert_eq!(transaction["instructedAmount"]["amount"], "10.00");
        assert_eq!(transaction["beneficiary"]["creditor"]["name"], "ACME");
        assert_eq!(transaction["remittanceInformation"][0], "Invoice 42");
    }

    #[test]
    fn test_structured_remittance_on_recent_versions() {
        let dialect = StetDialect::new(&EngineConfig::preset(StetVersion::V1_6_3));
        let payload = dialect.build_payload(&payment(), &params(&["i-1"])).unwrap();
        assert_eq!(
            payload["creditTransferTransaction"][0]["remittanceInformation"]["unstructured"][0],
            "Invoice 42"
        );
    }

    #[test]
    fn test_instruction_id_mismatch() {
        let dialect = StetDialect::new(&EngineConfig::default());
        assert!(dialect.build_payload(&payment(), &params(&[])).is_err());
        assert!(dialect
            .build_payload(&Payment::default(), &params(&[]))
            .is_err());
    }
}
