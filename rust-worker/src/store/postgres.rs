//! PostgreSQL storage backend.
//!
//! Claims run inside a transaction that holds a `FOR UPDATE SKIP LOCKED` row
//! lock. The payment insert and the outcome update share that transaction, so
//! a claim costs one pooled connection. Resolving commits; dropping the claim
//! rolls back, which releases the lock and leaves the row pending.
//!
//! Resolution timestamps use `clock_timestamp()`; `NOW()` would be frozen at
//! claim time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::info;

use crate::clients::{Client, NewClient};
use crate::process::PaymentEvent;
use crate::queue::{
    truncate_error, ClaimedEvent, EventQueue, Outcome, PageRequest, Provider, Resolution,
    RetryDecision, RetryPolicy, WebhookEvent,
};
use crate::store::{ClientStore, StoreError};

/// Postgres-backed store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgStore {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Open a connection pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        retry: RetryPolicy,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        info!(max_connections = max_connections, "postgres_connected");

        Ok(Self::new(pool, retry))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("postgres_migrations_applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("postgres_pool_closed");
    }
}

#[derive(FromRow)]
struct EventRow {
    id: i64,
    provider: String,
    raw_body: Vec<u8>,
    received_at: DateTime<Utc>,
    signature_verified: bool,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
    attempts: i32,
    error_message: Option<String>,
    next_attempt_at: DateTime<Utc>,
    failed_at: Option<DateTime<Utc>>,
}

impl From<EventRow> for WebhookEvent {
    fn from(row: EventRow) -> Self {
        WebhookEvent {
            id: row.id,
            provider: Provider::parse(&row.provider),
            raw_body: row.raw_body,
            received_at: row.received_at,
            signature_verified: row.signature_verified,
            processed: row.processed,
            processed_at: row.processed_at,
            attempts: row.attempts,
            error_message: row.error_message,
            next_attempt_at: row.next_attempt_at,
            failed_at: row.failed_at,
        }
    }
}

#[derive(FromRow)]
struct ClientRow {
    id: i64,
    client_uid: String,
    secret: String,
    provider: String,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            uid: row.client_uid,
            secret: row.secret,
            provider: Provider::parse(&row.provider),
        }
    }
}

#[async_trait]
impl EventQueue for PgStore {
    type Claim = PgClaim;

    async fn enqueue(
        &self,
        provider: &Provider,
        raw_body: &[u8],
        signature_verified: bool,
    ) -> Result<WebhookEvent, StoreError> {
        let row: EventRow = sqlx::query_as(
            r#"
            INSERT INTO webhook_events (provider, raw_body, signature_verified)
            VALUES ($1, $2, $3)
            RETURNING id, provider, raw_body, received_at, signature_verified, processed,
                      processed_at, attempts, error_message, next_attempt_at, failed_at
            "#,
        )
        .bind(provider.as_str())
        .bind(raw_body)
        .bind(signature_verified)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn claim_next_pending(&self) -> Result<Option<PgClaim>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT id, provider, raw_body, received_at, signature_verified, processed,
                   processed_at, attempts, error_message, next_attempt_at, failed_at
            FROM webhook_events
            WHERE processed = FALSE
              AND failed_at IS NULL
              AND next_attempt_at <= NOW()
            ORDER BY id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(row) => Ok(Some(PgClaim {
                tx,
                retry: self.retry,
                event: row.into(),
            })),
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn list_page(&self, page: PageRequest) -> Result<Vec<WebhookEvent>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, provider, raw_body, received_at, signature_verified, processed,
                   processed_at, attempts, error_message, next_attempt_at, failed_at
            FROM webhook_events
            WHERE ($1::BIGINT IS NULL OR id < $1)
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(page.before_id)
        .bind(page.effective_limit().map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WebhookEvent::from).collect())
    }
}

/// A row lock held by an open transaction.
pub struct PgClaim {
    tx: Transaction<'static, Postgres>,
    retry: RetryPolicy,
    event: WebhookEvent,
}

#[async_trait]
impl ClaimedEvent for PgClaim {
    fn event(&self) -> &WebhookEvent {
        &self.event
    }

    async fn save_payment(&mut self, payment: &PaymentEvent) -> Result<bool, StoreError> {
        // Same transaction as the row lock: the foreign key check on
        // webhook_event_id would otherwise wait on our own FOR UPDATE.
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                external_id, status, status_detail, amount, currency,
                payer_email, approved_at, provider, webhook_event_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (webhook_event_id) DO NOTHING
            "#,
        )
        .bind(&payment.external_id)
        .bind(&payment.status)
        .bind(&payment.status_detail)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payer_email)
        .bind(payment.approved_at)
        .bind(payment.provider.as_str())
        .bind(payment.webhook_event_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn resolve(mut self, outcome: Outcome) -> Result<Resolution, StoreError> {
        let id = self.event.id;
        let attempts = self.event.attempts + 1;

        let resolution = match outcome {
            Outcome::Success => {
                sqlx::query(
                    r#"
                    UPDATE webhook_events
                    SET processed = TRUE,
                        processed_at = clock_timestamp(),
                        attempts = attempts + 1,
                        error_message = NULL
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .execute(&mut *self.tx)
                .await?;

                Resolution::Processed
            }
            Outcome::Failure(message) => {
                let message = truncate_error(&message);

                match self.retry.after_failure(attempts) {
                    RetryDecision::Retry { delay } => {
                        sqlx::query(
                            r#"
                            UPDATE webhook_events
                            SET processed = FALSE,
                                processed_at = NULL,
                                attempts = attempts + 1,
                                error_message = $2,
                                next_attempt_at = clock_timestamp() + make_interval(secs => $3)
                            WHERE id = $1
                            "#,
                        )
                        .bind(id)
                        .bind(&message)
                        .bind(delay.as_secs_f64())
                        .execute(&mut *self.tx)
                        .await?;

                        Resolution::Retrying { attempts, delay }
                    }
                    RetryDecision::GiveUp => {
                        sqlx::query(
                            r#"
                            UPDATE webhook_events
                            SET processed = FALSE,
                                processed_at = NULL,
                                attempts = attempts + 1,
                                error_message = $2,
                                failed_at = clock_timestamp()
                            WHERE id = $1
                            "#,
                        )
                        .bind(id)
                        .bind(&message)
                        .execute(&mut *self.tx)
                        .await?;

                        Resolution::Failed { attempts }
                    }
                }
            }
        };

        self.tx.commit().await?;
        Ok(resolution)
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn find_client(&self, uid: &str) -> Result<Option<Client>, StoreError> {
        let row: Option<ClientRow> = sqlx::query_as(
            "SELECT id, client_uid, secret, provider FROM clients WHERE client_uid = $1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Client::from))
    }

    async fn create_client(&self, client: NewClient) -> Result<Client, StoreError> {
        let result: Result<ClientRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO clients (client_uid, secret, provider)
            VALUES ($1, $2, $3)
            RETURNING id, client_uid, secret, provider
            "#,
        )
        .bind(&client.uid)
        .bind(&client.secret)
        .bind(client.provider.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateClient(client.uid))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let rows: Vec<ClientRow> = sqlx::query_as(
            "SELECT id, client_uid, secret, provider FROM clients ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Client::from).collect())
    }
}
