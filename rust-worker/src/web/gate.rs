//! Ingestion gate: authenticate a webhook, then append it to the queue.
//!
//! ## Checks, in order
//!
//! ```text
//! client lookup → provider tag → client/provider match → signature → enqueue
//! ```
//!
//! Every rejection happens before the queue is touched. The gate returns as
//! soon as the event is durably stored; processing happens in the worker.

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::queue::{Provider, WebhookEvent};
use crate::store::{RelayStore, StoreError};
use crate::web::signature::{verify_signature, Verification};

/// Reasons a webhook is turned away.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid client")]
    UnknownClient(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid client")]
    ProviderMismatch { expected: Provider, got: Provider },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signature verification not available for {0}")]
    UnverifiedProvider(Provider),

    #[error("failed to store event")]
    Storage(#[from] StoreError),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
            IngestError::UnknownClient(_)
            | IngestError::ProviderMismatch { .. }
            | IngestError::InvalidSignature
            | IngestError::UnverifiedProvider(_) => StatusCode::UNAUTHORIZED,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Authenticates inbound webhooks against the client registry.
pub struct IngestionGate<S> {
    store: S,
    allow_unverified: bool,
}

impl<S: RelayStore> IngestionGate<S> {
    /// `allow_unverified` controls whether providers without signature
    /// verification are accepted (and flagged) or rejected.
    pub fn new(store: S, allow_unverified: bool) -> Self {
        Self {
            store,
            allow_unverified,
        }
    }

    /// Check a webhook and enqueue it.
    pub async fn ingest(
        &self,
        client_uid: &str,
        provider_tag: &str,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookEvent, IngestError> {
        let client = match self.store.find_client(client_uid).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                warn!(client_uid = %client_uid, "webhook_unknown_client");
                return Err(IngestError::UnknownClient(client_uid.to_string()));
            }
            Err(e) => {
                error!(client_uid = %client_uid, error = %e, "client_lookup_failed");
                return Err(e.into());
            }
        };

        let provider = Provider::parse(provider_tag);
        if !provider.is_supported() {
            warn!(provider = %provider_tag, "webhook_unsupported_provider");
            return Err(IngestError::UnsupportedProvider(provider_tag.to_string()));
        }

        // A client's secret is only meaningful for the provider it was issued for.
        if provider != client.provider {
            warn!(
                client_uid = %client_uid,
                expected = %client.provider,
                got = %provider,
                "webhook_provider_mismatch"
            );
            return Err(IngestError::ProviderMismatch {
                expected: client.provider,
                got: provider,
            });
        }

        let signature_verified =
            match verify_signature(&provider, &client.secret, signature_header, body) {
                Verification::Verified => true,
                Verification::Invalid => {
                    warn!(client_uid = %client_uid, provider = %provider, "webhook_signature_invalid");
                    return Err(IngestError::InvalidSignature);
                }
                Verification::Unsupported if self.allow_unverified => {
                    warn!(
                        client_uid = %client_uid,
                        provider = %provider,
                        "webhook_signature_unverified"
                    );
                    false
                }
                Verification::Unsupported => {
                    warn!(
                        client_uid = %client_uid,
                        provider = %provider,
                        "webhook_unverified_provider_rejected"
                    );
                    return Err(IngestError::UnverifiedProvider(provider));
                }
            };

        let event = self
            .store
            .enqueue(&provider, body, signature_verified)
            .await
            .map_err(|e| {
                error!(provider = %provider, error = %e, "webhook_enqueue_failed");
                IngestError::from(e)
            })?;

        info!(
            event_id = event.id,
            provider = %provider,
            client_uid = %client_uid,
            signature_verified = signature_verified,
            body_length = body.len(),
            "webhook_enqueued"
        );

        Ok(event)
    }
}
