//! Webhook endpoint handlers.
//!
//! The ingestion handler only authenticates and enqueues:
//! 1. Resolve the client and verify the signature
//! 2. Append the raw body to the event queue
//! 3. Return immediately
//!
//! Normalization happens in the worker.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::queue::{PageRequest, Provider, WebhookEvent};
use crate::store::RelayStore;
use crate::web::gate::IngestionGate;
use crate::web::signature::SIGNATURE_HEADER;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState<S> {
    pub config: Arc<Config>,
    pub store: S,
    pub gate: Arc<IngestionGate<S>>,
}

impl<S: RelayStore> AppState<S> {
    pub fn new(config: Config, store: S) -> Self {
        let gate = IngestionGate::new(store.clone(), config.allow_unverified_providers);
        Self {
            config: Arc::new(config),
            store,
            gate: Arc::new(gate),
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Payment Webhooks
// =============================================================================

/// Acknowledgement for an enqueued webhook.
#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub status: &'static str,
    pub event_id: i64,
    pub provider: Provider,
    pub received: DateTime<Utc>,
}

/// Payment webhook endpoint: `POST /webhooks/:client_id/:provider/payments`.
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what the provider sent.
pub async fn receive_payment_webhook<S: RelayStore>(
    State(state): State<AppState<S>>,
    Path((client_id, provider)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(
        client_uid = %client_id,
        provider = %provider,
        body_length = body.len(),
        has_signature = headers.contains_key(SIGNATURE_HEADER),
        "payment_webhook_received"
    );

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state
        .gate
        .ingest(&client_id, &provider, signature, &body)
        .await
    {
        Ok(event) => (
            StatusCode::OK,
            Json(ReceivedResponse {
                status: "received",
                event_id: event.id,
                provider: event.provider,
                received: event.received_at,
            }),
        )
            .into_response(),
        Err(e) => error_response(e.status_code(), e.to_string()),
    }
}

// =============================================================================
// Event Listing
// =============================================================================

/// Event listing endpoint: `GET /webhooks/events?limit=&before_id=`.
pub async fn list_events<S: RelayStore>(
    State(state): State<AppState<S>>,
    Query(page): Query<PageRequest>,
) -> Response {
    match state.store.list_page(page).await {
        Ok(events) => Json::<Vec<WebhookEvent>>(events).into_response(),
        Err(e) => {
            error!(error = %e, "list_events_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list events")
        }
    }
}
