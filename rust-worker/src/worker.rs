//! Processing loop: claim, normalize, persist, resolve.
//!
//! ## Loop Body
//!
//! ```text
//! claim_next_pending ─┬─ none  → idle for poll_interval (or until shutdown)
//!                     └─ event → normalize → save_payment → resolve(Success)
//!                                     └───── any error ───→ resolve(Failure)
//! ```
//!
//! The payment is written through the claim, before it is resolved, so both
//! writes commit together. A worker that dies in between leaves the event
//! pending and no payment behind.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::process::{normalize_event, NormalizeError};
use crate::queue::{ClaimedEvent, Outcome, Resolution};
use crate::store::{RelayStore, StoreError};

/// Failure while processing one claimed event. Recorded on the event row.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("failed to save payment: {0}")]
    Persist(#[source] StoreError),
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing claimable.
    Idle,
    Processed(i64),
    Retrying(i64),
    Failed(i64),
}

/// One processing loop. Run several against the same store to scale out.
pub struct Worker<S> {
    id: usize,
    store: S,
    poll_interval: Duration,
}

impl<S: RelayStore> Worker<S> {
    pub fn new(id: usize, store: S, poll_interval: Duration) -> Self {
        Self {
            id,
            store,
            poll_interval,
        }
    }

    /// Claim and handle at most one event.
    ///
    /// Processing failures are recorded on the event and reported through the
    /// returned `Tick`; only storage failures surface as `Err`.
    pub async fn process_next(&self) -> Result<Tick, StoreError> {
        let Some(mut claim) = self.store.claim_next_pending().await? else {
            return Ok(Tick::Idle);
        };

        let event_id = claim.event().id;
        let outcome = match self.process(&mut claim).await {
            Ok(()) => Outcome::Success,
            Err(e) => {
                warn!(
                    worker_id = self.id,
                    event_id = event_id,
                    error = %e,
                    "event_processing_failed"
                );
                Outcome::Failure(e.to_string())
            }
        };

        let tick = match claim.resolve(outcome).await? {
            Resolution::Processed => {
                info!(worker_id = self.id, event_id = event_id, "event_processed");
                Tick::Processed(event_id)
            }
            Resolution::Retrying { attempts, delay } => {
                info!(
                    worker_id = self.id,
                    event_id = event_id,
                    attempts = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "event_retry_scheduled"
                );
                Tick::Retrying(event_id)
            }
            Resolution::Failed { attempts } => {
                error!(
                    worker_id = self.id,
                    event_id = event_id,
                    attempts = attempts,
                    "event_failed_permanently"
                );
                Tick::Failed(event_id)
            }
        };

        Ok(tick)
    }

    async fn process<C: ClaimedEvent>(&self, claim: &mut C) -> Result<(), ProcessError> {
        let payment = normalize_event(claim.event())?;

        let inserted = claim
            .save_payment(&payment)
            .await
            .map_err(ProcessError::Persist)?;

        if !inserted {
            info!(
                worker_id = self.id,
                event_id = payment.webhook_event_id,
                "payment_already_recorded"
            );
        }

        Ok(())
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Shutdown is only observed between iterations and while idle, so an
    /// in-flight claim is always resolved first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = self.id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "worker_loop_started"
        );

        while !*shutdown.borrow() {
            let keep_going = match self.process_next().await {
                Ok(Tick::Idle) => self.idle(&mut shutdown).await,
                Ok(_) => true,
                Err(e) => {
                    error!(worker_id = self.id, error = %e, "worker_store_error");
                    self.idle(&mut shutdown).await
                }
            };

            if !keep_going {
                break;
            }
        }

        info!(worker_id = self.id, "worker_loop_stopped");
    }

    /// Sleep one poll interval. Returns `false` if shutdown was requested meanwhile.
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => true,
            changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
        }
    }
}
