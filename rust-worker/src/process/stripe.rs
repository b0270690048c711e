//! Stripe event payloads.
//!
//! Stripe wraps the payment intent in an event envelope:
//!
//! ```json
//! {"id": "evt_1", "type": "payment_intent.succeeded",
//!  "data": {"object": {"id": "pi_1", "status": "succeeded",
//!                      "amount_received": 2599, "currency": "usd",
//!                      "charges": {"data": [{"billing_details": {"email": "a@b.c"}}]}}}}
//! ```

use rust_decimal::Decimal;

use super::fields::{self, Object};
use super::payment::PaymentFields;

/// Fields of a Stripe event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StripePayment {
    /// `data.object` was present.
    Intent(PaymentFields),
    /// Envelope without `data.object`; only the event id and type are known.
    Envelope(PaymentFields),
}

impl StripePayment {
    pub fn from_json(payload: &Object) -> Self {
        let Some(object) = fields::object(payload, "data").and_then(|d| fields::object(d, "object"))
        else {
            return StripePayment::Envelope(PaymentFields {
                external_id: fields::string(payload, "id"),
                status: fields::string(payload, "type"),
                ..PaymentFields::default()
            });
        };

        // amount_received is in minor units (cents)
        let amount = fields::number(object, "amount_received")
            .map(|cents| cents / Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ZERO);

        StripePayment::Intent(PaymentFields {
            external_id: fields::string(object, "id"),
            status: fields::string(object, "status"),
            status_detail: None,
            amount: Some(amount),
            currency: fields::string(object, "currency"),
            payer_email: billing_email(object),
            approved_at: None,
        })
    }

    pub fn into_fields(self) -> PaymentFields {
        match self {
            StripePayment::Intent(f) | StripePayment::Envelope(f) => f,
        }
    }
}

/// `charges.data[0].billing_details.email`
fn billing_email(object: &Object) -> Option<String> {
    let charges = fields::object(object, "charges")?;
    let first_charge = fields::first_object(charges, "data")?;
    let billing = fields::object(first_charge, "billing_details")?;
    fields::string(billing, "email")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> StripePayment {
        StripePayment::from_json(value.as_object().unwrap())
    }

    #[test]
    fn test_payment_intent() {
        let payment = parse(json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_123",
                "status": "succeeded",
                "amount_received": 2599,
                "currency": "usd",
                "charges": {"data": [{"billing_details": {"email": "payer@example.com"}}]}
            }}
        }));

        assert!(matches!(payment, StripePayment::Intent(_)));
        let fields = payment.into_fields();
        assert_eq!(fields.external_id.as_deref(), Some("pi_123"));
        assert_eq!(fields.status.as_deref(), Some("succeeded"));
        assert_eq!(fields.amount, Some(Decimal::new(2599, 2)));
        assert_eq!(fields.currency.as_deref(), Some("usd"));
        assert_eq!(fields.payer_email.as_deref(), Some("payer@example.com"));
    }

    #[test]
    fn test_missing_data_falls_back_to_envelope() {
        let payment = parse(json!({"id": "evt_9", "type": "charge.refunded"}));

        assert!(matches!(payment, StripePayment::Envelope(_)));
        let fields = payment.into_fields();
        assert_eq!(fields.external_id.as_deref(), Some("evt_9"));
        assert_eq!(fields.status.as_deref(), Some("charge.refunded"));
        assert_eq!(fields.amount, None);
    }

    #[test]
    fn test_missing_object_falls_back_to_envelope() {
        let payment = parse(json!({"id": "evt_9", "type": "ping", "data": {}}));
        assert!(matches!(payment, StripePayment::Envelope(_)));
    }

    #[test]
    fn test_empty_charges_has_no_email() {
        let fields = parse(json!({
            "data": {"object": {"id": "pi_1", "charges": {"data": []}}}
        }))
        .into_fields();

        assert!(fields.payer_email.is_none());
        assert_eq!(fields.amount, Some(Decimal::ZERO));
    }

    #[test]
    fn test_broken_charge_chain_has_no_email() {
        let fields = parse(json!({
            "data": {"object": {"id": "pi_1", "charges": {"data": [{"billing_details": null}]}}}
        }))
        .into_fields();

        assert!(fields.payer_email.is_none());
    }
}
