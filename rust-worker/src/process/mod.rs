//! Webhook payload normalization.
//!
//! This module turns the raw body of a queued webhook event into a
//! provider-agnostic `PaymentEvent`.
//!
//! ## Processing Flow
//!
//! ```text
//! raw body → ProviderPayload::parse() → PaymentFields → PaymentEvent
//! ```
//!
//! Only a body that is neither a JSON object nor `null` is an error. Any
//! other shape mismatch degrades to a partial record.

pub mod fields;
pub mod mercadopago;
pub mod payment;
pub mod paypal;
pub mod stripe;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::queue::{Provider, WebhookEvent};
use fields::Object;

pub use mercadopago::MercadoPagoPayment;
pub use payment::{PaymentEvent, PaymentFields};
pub use paypal::PayPalPayment;
pub use stripe::StripePayment;

/// Hard normalization failures.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid json: top-level value is not an object")]
    NotAnObject,
}

/// A decoded payload, tagged by the provider that sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    MercadoPago(MercadoPagoPayment),
    Stripe(StripePayment),
    PayPal(PayPalPayment),
    /// Unknown provider: only top-level `id`, `status` and `amount` are read.
    Generic(PaymentFields),
}

impl ProviderPayload {
    /// Decode `raw_body` and extract the fields for `provider`.
    pub fn parse(provider: &Provider, raw_body: &[u8]) -> Result<Self, NormalizeError> {
        // `null` decodes to an empty payload, like an empty object.
        let object = match serde_json::from_slice(raw_body)? {
            Value::Object(map) => map,
            Value::Null => Object::new(),
            _ => return Err(NormalizeError::NotAnObject),
        };
        let payload = &object;

        let parsed = match provider {
            Provider::MercadoPago => {
                ProviderPayload::MercadoPago(MercadoPagoPayment::from_json(payload))
            }
            Provider::Stripe => ProviderPayload::Stripe(StripePayment::from_json(payload)),
            Provider::PayPal => ProviderPayload::PayPal(PayPalPayment::from_json(payload)),
            Provider::Other(_) => ProviderPayload::Generic(PaymentFields {
                external_id: fields::string(payload, "id"),
                status: fields::string(payload, "status"),
                amount: fields::number(payload, "amount"),
                ..PaymentFields::default()
            }),
        };

        Ok(parsed)
    }

    pub fn into_fields(self) -> PaymentFields {
        match self {
            ProviderPayload::MercadoPago(p) => p.fields,
            ProviderPayload::Stripe(p) => p.into_fields(),
            ProviderPayload::PayPal(p) => p.fields,
            ProviderPayload::Generic(f) => f,
        }
    }
}

/// Normalize a raw provider payload into a payment for `webhook_event_id`.
pub fn normalize(
    provider: &Provider,
    raw_body: &[u8],
    webhook_event_id: i64,
) -> Result<PaymentEvent, NormalizeError> {
    let fields = ProviderPayload::parse(provider, raw_body)?.into_fields();
    let payment = PaymentEvent::new(fields, provider.clone(), webhook_event_id);

    info!(
        event_id = webhook_event_id,
        provider = %provider,
        external_id = ?payment.external_id,
        status = ?payment.status,
        amount = %payment.amount,
        currency = ?payment.currency,
        "payment_normalized"
    );

    Ok(payment)
}

/// Normalize a queued event.
pub fn normalize_event(event: &WebhookEvent) -> Result<PaymentEvent, NormalizeError> {
    normalize(&event.provider, &event.raw_body, event.id)
}
