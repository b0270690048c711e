//! Durable webhook event queue.
//!
//! This module provides:
//! - Event types stored in the `webhook_events` table
//! - The `EventQueue` contract implemented by every storage backend
//! - Retry bookkeeping for failed claims
//!
//! ## Claim Lifecycle
//!
//! ```text
//! enqueue → Pending → claim_next_pending → Claimed ─┬─ resolve(Success) → Processed
//!                ▲                                  ├─ resolve(Failure) → Pending (retry)
//!                │                                  ├─ resolve(Failure) → Failed (ceiling)
//!                └──────────── dropped claim ───────┘
//! ```
//!
//! A claim holds a row lock for as long as the claim value lives. Concurrent
//! claimers skip locked rows instead of waiting on them, so no event is ever
//! processed by two workers at once, and a worker that dies mid-claim simply
//! releases its lock.

pub mod retry;
pub mod types;

use async_trait::async_trait;

use crate::process::PaymentEvent;
use crate::store::StoreError;

pub use retry::{RetryDecision, RetryPolicy};
pub use types::{
    truncate_error, EventStatus, Outcome, PageRequest, Provider, Resolution, WebhookEvent,
    MAX_ERROR_MESSAGE_LEN, MAX_PAGE_SIZE,
};

/// Append-only queue of inbound webhook events with lock-and-skip claiming.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Exclusive hold on one pending event.
    type Claim: ClaimedEvent;

    /// Durably append a raw webhook. The returned event carries the
    /// store-assigned id and receipt time.
    async fn enqueue(
        &self,
        provider: &Provider,
        raw_body: &[u8],
        signature_verified: bool,
    ) -> Result<WebhookEvent, StoreError>;

    /// Lock the oldest claimable event, skipping rows other claimers hold.
    ///
    /// Returns `Ok(None)` when nothing is claimable.
    async fn claim_next_pending(&self) -> Result<Option<Self::Claim>, StoreError>;

    /// Events newest first, restricted to `page`.
    async fn list_page(&self, page: PageRequest) -> Result<Vec<WebhookEvent>, StoreError>;

    /// Every event, newest first.
    async fn list_all(&self) -> Result<Vec<WebhookEvent>, StoreError> {
        self.list_page(PageRequest::default()).await
    }
}

/// A claimed event. Dropping it without resolving releases the lock and
/// leaves the row untouched.
#[async_trait]
pub trait ClaimedEvent: Send {
    /// Snapshot of the event as it was when claimed.
    fn event(&self) -> &WebhookEvent;

    /// Record the payment produced by this event, as part of the claim.
    ///
    /// The write becomes durable together with `resolve` and is discarded if
    /// the claim is dropped. Returns `false` when a payment for this event
    /// already exists.
    async fn save_payment(&mut self, payment: &PaymentEvent) -> Result<bool, StoreError>;

    /// Record the processing outcome and release the lock.
    async fn resolve(self, outcome: Outcome) -> Result<Resolution, StoreError>;
}
