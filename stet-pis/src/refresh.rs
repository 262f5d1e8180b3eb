//! Refresh of a payment from the bank after validation.

use crate::error::Error;
use crate::flow::{Flow, Replay, Step};
use crate::model::extra;
use crate::response::{instruction_statuses, payer, payment_status};
use crate::status::{decode_instruction_status, StatusData};
use crate::transport::{Endpoint, Request};
use tracing::info;

impl<'a> Flow<'a> {
    pub(crate) async fn refresh(&mut self) -> Step<()> {
        self.with_token_retry(Replay::Refresh).await
    }

    pub(crate) async fn refresh_payment(&mut self) -> Step<()> {
        let config = self.config;
        let id = self.payment_id()?;

        self.check_pre_step().await?;
        let response = self
            .send(Request::get(Endpoint::PaymentRequest { id: id.clone() }))
            .await?;
        let document = response.body;

        if let Some(bank_payer) = payer(&document) {
            let current = self.payment.payer.get_or_insert_with(Default::default);
            if bank_payer.name.is_some() {
                current.name = bank_payer.name;
            }
            if bank_payer.iban.is_some() {
                current.iban = bank_payer.iban;
            }
        }

        let status = payment_status(&document)
            .ok_or_else(|| Error::Response("payment document without status".to_string()))?;
        self.payment
            .set_extra(extra::LAST_STATUS, status.status.clone());
        self.payment
            .set_extra(extra::LAST_STATUS_REASON, status.reason.clone());

        let statuses = instruction_statuses(&document);
        for (index, instruction) in self.payment.instructions.iter_mut().enumerate() {
            let data = statuses.get(index).cloned().unwrap_or_else(StatusData::default);
            let (instruction_status, reason) =
                decode_instruction_status(&status, &data, &config.instruction_reasons)?;
            instruction.status = instruction_status;
            instruction.status_reason = reason;
        }

        info!("Payment {} refreshed with status {:?}", id, status.status);
        Ok(())
    }
}
