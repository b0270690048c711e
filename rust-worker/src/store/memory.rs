//! In-process storage backend.
//!
//! Mirrors the Postgres claim semantics: a claim marks its row locked until
//! the claim is resolved or dropped, and concurrent claimers skip locked rows.
//! A payment saved through a claim is staged on the claim and only lands in
//! the store when the claim resolves.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::clients::{Client, NewClient};
use crate::process::PaymentEvent;
use crate::queue::{
    truncate_error, ClaimedEvent, EventQueue, Outcome, PageRequest, Provider, Resolution,
    RetryDecision, RetryPolicy, WebhookEvent,
};
use crate::store::{ClientStore, StoreError};

#[derive(Default)]
struct State {
    last_event_id: i64,
    events: BTreeMap<i64, WebhookEvent>,
    locked: HashSet<i64>,
    last_client_id: i64,
    clients: Vec<Client>,
    payments: BTreeMap<i64, PaymentEvent>,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    retry: RetryPolicy,
}

impl MemoryStore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            state: Arc::default(),
            retry,
        }
    }

    /// Current snapshot of one event.
    pub fn event(&self, id: i64) -> Option<WebhookEvent> {
        self.lock().events.get(&id).cloned()
    }

    /// Recorded payments, ordered by webhook event id.
    pub fn payments(&self) -> Vec<PaymentEvent> {
        self.lock().payments.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // A panic while holding the lock cannot leave State half-written in a
    // way later callers care about.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl EventQueue for MemoryStore {
    type Claim = MemoryClaim;

    async fn enqueue(
        &self,
        provider: &Provider,
        raw_body: &[u8],
        signature_verified: bool,
    ) -> Result<WebhookEvent, StoreError> {
        let mut state = self.lock();
        state.last_event_id += 1;

        let now = Utc::now();
        let event = WebhookEvent {
            id: state.last_event_id,
            provider: provider.clone(),
            raw_body: raw_body.to_vec(),
            received_at: now,
            signature_verified,
            processed: false,
            processed_at: None,
            attempts: 0,
            error_message: None,
            next_attempt_at: now,
            failed_at: None,
        };

        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn claim_next_pending(&self) -> Result<Option<MemoryClaim>, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();

        let next = state
            .events
            .values()
            .find(|ev| ev.is_claimable(now) && !state.locked.contains(&ev.id))
            .cloned();

        Ok(next.map(|event| {
            state.locked.insert(event.id);
            MemoryClaim {
                state: Arc::clone(&self.state),
                retry: self.retry,
                event,
                staged_payment: None,
                released: false,
            }
        }))
    }

    async fn list_page(&self, page: PageRequest) -> Result<Vec<WebhookEvent>, StoreError> {
        let state = self.lock();
        let limit = page.effective_limit().map_or(usize::MAX, |l| l as usize);

        Ok(state
            .events
            .values()
            .rev()
            .filter(|ev| page.before_id.map_or(true, |before| ev.id < before))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Lock on one in-memory event.
pub struct MemoryClaim {
    state: Arc<Mutex<State>>,
    retry: RetryPolicy,
    event: WebhookEvent,
    staged_payment: Option<PaymentEvent>,
    released: bool,
}

#[async_trait]
impl ClaimedEvent for MemoryClaim {
    fn event(&self) -> &WebhookEvent {
        &self.event
    }

    async fn save_payment(&mut self, payment: &PaymentEvent) -> Result<bool, StoreError> {
        let state = lock_state(&self.state);
        if self.staged_payment.is_some() || state.payments.contains_key(&payment.webhook_event_id) {
            return Ok(false);
        }
        drop(state);

        self.staged_payment = Some(payment.clone());
        Ok(true)
    }

    async fn resolve(mut self, outcome: Outcome) -> Result<Resolution, StoreError> {
        let mut state = lock_state(&self.state);
        let now = Utc::now();
        let id = self.event.id;

        if let Some(payment) = self.staged_payment.take() {
            state
                .payments
                .entry(payment.webhook_event_id)
                .or_insert(payment);
        }

        let resolution = match state.events.get_mut(&id) {
            Some(row) => {
                row.attempts += 1;
                match outcome {
                    Outcome::Success => {
                        row.processed = true;
                        row.processed_at = Some(now);
                        row.error_message = None;
                        Resolution::Processed
                    }
                    Outcome::Failure(message) => {
                        row.processed = false;
                        row.processed_at = None;
                        row.error_message = Some(truncate_error(&message));
                        match self.retry.after_failure(row.attempts) {
                            RetryDecision::Retry { delay } => {
                                row.next_attempt_at = now
                                    + chrono::Duration::from_std(delay)
                                        .unwrap_or(chrono::Duration::zero());
                                Resolution::Retrying {
                                    attempts: row.attempts,
                                    delay,
                                }
                            }
                            RetryDecision::GiveUp => {
                                row.failed_at = Some(now);
                                Resolution::Failed {
                                    attempts: row.attempts,
                                }
                            }
                        }
                    }
                }
            }
            // Rows are never deleted, but resolve must still release the lock.
            None => Resolution::Processed,
        };

        state.locked.remove(&id);
        drop(state);
        self.released = true;

        Ok(resolution)
    }
}

impl Drop for MemoryClaim {
    fn drop(&mut self) {
        if !self.released {
            lock_state(&self.state).locked.remove(&self.event.id);
        }
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn find_client(&self, uid: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.lock().clients.iter().find(|c| c.uid == uid).cloned())
    }

    async fn create_client(&self, client: NewClient) -> Result<Client, StoreError> {
        let mut state = self.lock();
        if state.clients.iter().any(|c| c.uid == client.uid) {
            return Err(StoreError::DuplicateClient(client.uid));
        }

        state.last_client_id += 1;
        let created = Client {
            id: state.last_client_id,
            uid: client.uid,
            secret: client.secret,
            provider: client.provider,
        };
        state.clients.push(created.clone());

        Ok(created)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        Ok(self.lock().clients.iter().rev().cloned().collect())
    }
}
