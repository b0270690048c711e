//! Storage backends.
//!
//! A single store handle serves the event queue and the client registry. It
//! is built once per process and handed to every component that needs it.
//! Payments are written through a claimed event, inside the claim.
//!
//! - `postgres`: production backend, row locks via `FOR UPDATE SKIP LOCKED`
//! - `memory`: in-process backend with the same claim semantics

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::clients::{Client, NewClient};
use crate::queue::EventQueue;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("client {0} already exists")]
    DuplicateClient(String),
}

/// Registered webhook senders.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find_client(&self, uid: &str) -> Result<Option<Client>, StoreError>;

    /// Fails with `StoreError::DuplicateClient` when the UID is taken.
    async fn create_client(&self, client: NewClient) -> Result<Client, StoreError>;

    /// All clients, newest first.
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;
}

/// Everything the relay needs from a storage backend.
pub trait RelayStore: EventQueue + ClientStore + Clone + 'static {}

impl<T> RelayStore for T where T: EventQueue + ClientStore + Clone + 'static {}
