//! PayRelay Worker - Processing loops for queued payment webhooks.
//!
//! This worker claims pending events from the `webhook_events` table,
//! normalizes each provider payload into a payment record, and records the
//! outcome on the event row. Run as many replicas as needed.

mod consumer;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payrelay::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        database_url_set = !config.database_url.is_empty(),
        concurrency = config.worker_concurrency,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        max_attempts = config.max_attempts,
        retry_backoff_base_ms = config.retry_backoff_base.as_millis() as u64,
        "config_loaded"
    );

    // Start the processing loops
    consumer::run(config).await?;

    Ok(())
}
