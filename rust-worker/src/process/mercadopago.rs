//! MercadoPago payment payloads.
//!
//! MercadoPago sends the payment resource flat at the top level:
//!
//! ```json
//! {"id": 123, "status": "approved", "status_detail": "accredited",
//!  "transaction_amount": 150.00, "currency_id": "ARS",
//!  "payer": {"email": "buyer@example.com"},
//!  "date_approved": "2024-03-01T10:15:00.000-04:00"}
//! ```

use rust_decimal::Decimal;

use super::fields::{self, Object};
use super::payment::PaymentFields;

/// Fields of a MercadoPago payment payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MercadoPagoPayment {
    pub fields: PaymentFields,
}

impl MercadoPagoPayment {
    pub fn from_json(payload: &Object) -> Self {
        // Some notification shapes carry `amount` instead of `transaction_amount`.
        let amount = fields::number(payload, "transaction_amount")
            .filter(|a| !a.is_zero())
            .or_else(|| fields::number(payload, "amount"))
            .unwrap_or(Decimal::ZERO);

        let payer_email =
            fields::object(payload, "payer").and_then(|payer| fields::string(payer, "email"));

        Self {
            fields: PaymentFields {
                external_id: fields::string(payload, "id"),
                status: fields::string(payload, "status"),
                status_detail: fields::string(payload, "status_detail"),
                amount: Some(amount),
                currency: fields::string(payload, "currency_id"),
                payer_email,
                approved_at: fields::timestamp(payload, "date_approved"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> PaymentFields {
        MercadoPagoPayment::from_json(value.as_object().unwrap()).fields
    }

    #[test]
    fn test_full_payload() {
        let fields = parse(json!({
            "id": 1234567890u64,
            "status": "approved",
            "status_detail": "accredited",
            "transaction_amount": 150.00,
            "currency_id": "ARS",
            "payer": {"email": "buyer@example.com"},
            "date_approved": "2024-03-01T10:15:00.000-04:00"
        }));

        assert_eq!(fields.external_id.as_deref(), Some("1234567890"));
        assert_eq!(fields.status.as_deref(), Some("approved"));
        assert_eq!(fields.status_detail.as_deref(), Some("accredited"));
        assert_eq!(fields.amount, Some(Decimal::new(15000, 2)));
        assert_eq!(fields.currency.as_deref(), Some("ARS"));
        assert_eq!(fields.payer_email.as_deref(), Some("buyer@example.com"));
        assert!(fields.approved_at.is_some());
    }

    #[test]
    fn test_amount_fallback_when_primary_missing() {
        let fields = parse(json!({"id": "p1", "amount": 99.5}));
        assert_eq!(fields.amount, Some(Decimal::new(995, 1)));
    }

    #[test]
    fn test_amount_fallback_when_primary_zero() {
        let fields = parse(json!({"transaction_amount": 0, "amount": 12}));
        assert_eq!(fields.amount, Some(Decimal::from(12)));
    }

    #[test]
    fn test_bad_date_is_absent() {
        let fields = parse(json!({"id": "p1", "date_approved": "not a date"}));
        assert!(fields.approved_at.is_none());
    }

    #[test]
    fn test_payer_not_an_object() {
        let fields = parse(json!({"id": "p1", "payer": "someone"}));
        assert!(fields.payer_email.is_none());
        assert_eq!(fields.amount, Some(Decimal::ZERO));
    }
}
