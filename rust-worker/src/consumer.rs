//! Worker pool runner.
//!
//! This module connects to Postgres, starts `WORKER_CONCURRENCY` processing
//! loops against the shared pool, and stops them cleanly on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use tokio::{signal, sync::watch};
use tracing::{error, info};

use payrelay::{Config, PgStore, Worker};

/// Run the processing loops until a shutdown signal arrives.
///
/// This function:
/// 1. Connects to Postgres and applies migrations
/// 2. Spawns one task per configured worker
/// 3. On SIGINT/SIGTERM, flips the shutdown channel
/// 4. Waits for every loop to resolve its current claim and exit
pub async fn run(config: Config) -> Result<()> {
    info!(
        max_connections = config.database_max_connections,
        "postgres_connecting"
    );

    let store = PgStore::connect(
        &config.database_url,
        config.database_max_connections,
        config.retry_policy(),
    )
    .await
    .context("Failed to connect to Postgres")?;

    store
        .migrate()
        .await
        .context("Failed to apply migrations")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles: Vec<_> = (0..config.worker_concurrency)
        .map(|id| {
            let worker = Worker::new(id, store.clone(), config.poll_interval);
            tokio::spawn(worker.run(shutdown_rx.clone()))
        })
        .collect();

    info!(workers = handles.len(), "worker_ready");

    shutdown_signal().await;
    info!("worker_stopping");

    // Receivers only see the flip; a send error means every loop already exited.
    let _ = shutdown_tx.send(true);

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "worker_task_panicked");
        }
    }

    store.close().await;

    info!("worker_shutdown_complete");
    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
