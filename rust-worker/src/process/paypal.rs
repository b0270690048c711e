//! PayPal payment payloads.
//!
//! PayPal sends the amount as an object with a string value:
//! `{"amount": {"value": "10.50", "currency_code": "USD"}}`.

use rust_decimal::Decimal;

use super::fields::{self, Object};
use super::payment::PaymentFields;

/// Fields of a PayPal payment payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayPalPayment {
    pub fields: PaymentFields,
}

impl PayPalPayment {
    pub fn from_json(payload: &Object) -> Self {
        let amount_obj = fields::object(payload, "amount");

        // A non-numeric value leaves the amount at zero
        let amount = amount_obj
            .and_then(|a| fields::numeric_string(a, "value"))
            .unwrap_or(Decimal::ZERO);
        let currency = amount_obj.and_then(|a| fields::string(a, "currency_code"));

        let payer_email = fields::object(payload, "payer")
            .and_then(|payer| fields::string(payer, "email_address"));

        Self {
            fields: PaymentFields {
                external_id: fields::string(payload, "id"),
                status: fields::string(payload, "status"),
                status_detail: fields::string(payload, "status_detail"),
                amount: Some(amount),
                currency,
                payer_email,
                approved_at: fields::timestamp(payload, "update_time"),
            },
        }
    }
}
