//! Event types stored in the webhook queue.
//!
//! This module defines:
//! - `Provider`: the payment provider tag carried by every event
//! - `WebhookEvent`: one row of the append-only `webhook_events` table
//! - Claim outcomes and paging parameters shared by all queue backends

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Maximum number of characters kept from a processing error.
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Upper bound on the page size accepted by `list_page`.
pub const MAX_PAGE_SIZE: u32 = 500;

// =============================================================================
// Provider
// =============================================================================

/// Payment provider that sent a webhook.
///
/// Unknown tags are kept verbatim in `Other` so rows written by older
/// deployments still load; the ingestion gate only accepts the known ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    MercadoPago,
    Stripe,
    PayPal,
    Other(String),
}

impl Provider {
    /// Parse a provider tag as it appears in URLs and database rows.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mercadopago" => Provider::MercadoPago,
            "stripe" => Provider::Stripe,
            "paypal" => Provider::PayPal,
            _ => Provider::Other(tag.to_string()),
        }
    }

    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &str {
        match self {
            Provider::MercadoPago => "mercadopago",
            Provider::Stripe => "stripe",
            Provider::PayPal => "paypal",
            Provider::Other(tag) => tag,
        }
    }

    /// Whether webhooks for this provider may be ingested.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Provider::Other(_))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Provider {
    fn from(tag: String) -> Self {
        Provider::parse(&tag)
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.as_str().to_string()
    }
}

// =============================================================================
// Webhook Event
// =============================================================================

/// Processing state derived from the event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processed,
    Failed,
}

/// One inbound webhook, as stored in the queue.
///
/// The raw body and provider never change after enqueue. Status fields are
/// only written by a worker resolving its claim.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: Provider,
    #[serde(serialize_with = "serialize_raw_body")]
    pub raw_body: Vec<u8>,
    pub received_at: DateTime<Utc>,
    /// False for providers whose signatures are not verified yet.
    pub signature_verified: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    pub fn status(&self) -> EventStatus {
        if self.processed {
            EventStatus::Processed
        } else if self.failed_at.is_some() {
            EventStatus::Failed
        } else {
            EventStatus::Pending
        }
    }

    /// Whether a worker may claim this event at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status() == EventStatus::Pending && self.next_attempt_at <= now
    }
}

/// Raw bodies are bytes; listings render them as text.
fn serialize_raw_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(body))
}

/// Cut an error message down to `MAX_ERROR_MESSAGE_LEN` characters.
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

// =============================================================================
// Claim Outcomes
// =============================================================================

/// Result of processing a claimed event, handed back to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// What the queue did with a resolved claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Terminal success.
    Processed,
    /// Back in the pending set, claimable again after `delay`.
    Retrying { attempts: i32, delay: Duration },
    /// Retry ceiling reached; never claimed again.
    Failed { attempts: i32 },
}

/// Keyset page over events, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    /// Maximum number of events; capped at `MAX_PAGE_SIZE`. `None` returns everything.
    pub limit: Option<u32>,
    /// Only return events with an id strictly below this one.
    pub before_id: Option<i64>,
}

impl PageRequest {
    pub fn effective_limit(&self) -> Option<u32> {
        self.limit.map(|l| l.min(MAX_PAGE_SIZE))
    }
}
