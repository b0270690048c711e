//! PayRelay - Durable payment webhook relay.
//!
//! This library provides shared modules for the two PayRelay binaries:
//! - `payrelay-web`: Web server that authenticates and enqueues webhooks
//! - `payrelay-worker`: Processing loops that normalize queued events
//!
//! ## Architecture
//!
//! ```text
//! Provider → Web Server → webhook_events (Postgres) → Worker → Normalizer → payments
//! ```
//!
//! The `webhook_events` table is the queue. Workers claim rows with
//! `FOR UPDATE SKIP LOCKED`, so any number of them can run side by side.

pub mod clients;
pub mod config;
pub mod process;
pub mod queue;
pub mod store;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use clients::{Client, NewClient};
pub use config::Config;
pub use process::{normalize, NormalizeError, PaymentEvent};
pub use queue::{EventQueue, Outcome, Provider, RetryPolicy, WebhookEvent};
pub use store::{MemoryStore, PgStore, RelayStore, StoreError};
pub use web::{router, AppState};
pub use worker::{Tick, Worker};
