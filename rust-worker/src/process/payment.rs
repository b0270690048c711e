//! Canonical payment record produced by normalization.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::queue::Provider;

/// Provider-agnostic fields pulled out of a webhook payload.
///
/// Every field is optional; a payload that matches none of the expected
/// shape still yields a (mostly empty) record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFields {
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub status_detail: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub payer_email: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// A normalized payment, created once per successfully processed webhook event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEvent {
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub status_detail: Option<String>,
    /// Major currency units (e.g. 25.99, never 2599).
    pub amount: Decimal,
    pub currency: Option<String>,
    pub payer_email: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub provider: Provider,
    pub webhook_event_id: i64,
}

impl PaymentEvent {
    pub fn new(fields: PaymentFields, provider: Provider, webhook_event_id: i64) -> Self {
        Self {
            external_id: fields.external_id,
            status: fields.status,
            status_detail: fields.status_detail,
            amount: fields.amount.unwrap_or(Decimal::ZERO),
            currency: fields.currency,
            payer_email: fields.payer_email,
            approved_at: fields.approved_at,
            provider,
            webhook_event_id,
        }
    }
}
