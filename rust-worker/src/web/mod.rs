//! Web server module for receiving payment webhooks.
//!
//! This module provides a thin web server that:
//! - Receives webhooks from MercadoPago, Stripe and PayPal
//! - Authenticates them against the registered client
//! - Durably enqueues the raw body and returns right away
//! - Exposes the event log and client administration
//!
//! All normalization happens in the background worker.

pub mod admin;
pub mod gate;
pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};

use crate::store::RelayStore;

pub use admin::{create_client, list_clients, CreateClientRequest, CreatedClientResponse};
pub use gate::{IngestError, IngestionGate};
pub use handlers::{
    health, list_events, receive_payment_webhook, AppState, ErrorResponse, HealthResponse,
    ReceivedResponse,
};
pub use signature::{verify_mercadopago_signature, verify_signature, Verification};

/// Build the application router.
pub fn router<S: RelayStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/webhooks/:client_id/:provider/payments",
            post(receive_payment_webhook::<S>),
        )
        .route("/webhooks/events", get(list_events::<S>))
        .route(
            "/admin/clients",
            post(create_client::<S>).get(list_clients::<S>),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::NewClient;
    use crate::queue::{EventQueue, Provider};
    use crate::store::{ClientStore, MemoryStore};
    use crate::web::signature::mercadopago_signature_header;
    use crate::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const ADMIN_TOKEN: &str = "admin-token";

    fn app(store: &MemoryStore) -> Router {
        let config = Config {
            admin_token: Some(ADMIN_TOKEN.to_string()),
            ..Config::default()
        };
        router(AppState::new(config, store.clone()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_webhook(path: &str, signature: Option<&str>, body: &[u8]) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(signature) = signature {
            builder = builder.header("X-Signature", signature);
        }
        builder.body(Body::from(body.to_vec())).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let store = MemoryStore::default();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_signed_webhook_is_received() {
        let store = MemoryStore::default();
        let client = store
            .create_client(NewClient::generate(Some("acme".into()), Provider::MercadoPago))
            .await
            .unwrap();
        let body = br#"{"id":"1","transaction_amount":150.00}"#;
        let header = mercadopago_signature_header(client.secret.as_bytes(), "1702000000", body);

        let (status, json) = send(
            app(&store),
            post_webhook("/webhooks/acme/mercadopago/payments", Some(&header), body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "received");
        assert_eq!(json["provider"], "mercadopago");
        assert_eq!(json["event_id"], 1);
        assert!(json["received"].is_string());

        let events = store.list_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw_body, body);
    }

    #[tokio::test]
    async fn test_webhook_error_statuses() {
        let store = MemoryStore::default();
        store
            .create_client(NewClient::generate(Some("acme".into()), Provider::MercadoPago))
            .await
            .unwrap();

        let cases = [
            ("/webhooks/ghost/mercadopago/payments", Some("ts=1, v1=00"), StatusCode::UNAUTHORIZED),
            ("/webhooks/acme/mercadopago/payments", Some("ts=1, v1=00"), StatusCode::UNAUTHORIZED),
            ("/webhooks/acme/mercadopago/payments", None, StatusCode::UNAUTHORIZED),
            ("/webhooks/acme/bitcoin/payments", None, StatusCode::BAD_REQUEST),
        ];

        for (path, signature, expected) in cases {
            let (status, json) =
                send(app(&store), post_webhook(path, signature, b"{}")).await;
            assert_eq!(status, expected, "{}", path);
            assert!(json["error"].is_string());
        }

        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_events_newest_first() {
        let store = MemoryStore::default();
        for _ in 0..3 {
            store.enqueue(&Provider::Stripe, b"{}", false).await.unwrap();
        }

        let request = Request::builder()
            .uri("/webhooks/events")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(json[0]["raw_body"], "{}");
    }

    #[tokio::test]
    async fn test_list_events_paging() {
        let store = MemoryStore::default();
        for _ in 0..5 {
            store.enqueue(&Provider::PayPal, b"{}", false).await.unwrap();
        }

        let request = Request::builder()
            .uri("/webhooks/events?limit=2&before_id=4")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app(&store), request).await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }

    fn admin_request(method: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/admin/clients");
        if let Some(token) = token {
            builder = builder.header("X-Admin-Token", token);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_admin_create_and_list_clients() {
        let store = MemoryStore::default();

        let (status, created) = send(
            app(&store),
            admin_request(
                "POST",
                Some(ADMIN_TOKEN),
                Some(r#"{"client_uid":"acme","provider":"mercadopago"}"#),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["client_uid"], "acme");
        assert_eq!(created["provider"], "mercadopago");
        assert_eq!(created["secret"].as_str().unwrap().len(), 64);

        let (status, listed) =
            send(app(&store), admin_request("GET", Some(ADMIN_TOKEN), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["client_uid"], "acme");
        assert!(listed[0].get("secret").is_none());
    }

    #[tokio::test]
    async fn test_admin_generates_uid_when_missing() {
        let store = MemoryStore::default();

        let (status, created) = send(
            app(&store),
            admin_request("POST", Some(ADMIN_TOKEN), Some(r#"{"provider":"stripe"}"#)),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["client_uid"].as_str().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_admin_error_statuses() {
        let store = MemoryStore::default();
        store
            .create_client(NewClient::generate(Some("taken".into()), Provider::PayPal))
            .await
            .unwrap();

        let cases = [
            (Some("wrong"), r#"{"provider":"stripe"}"#, StatusCode::UNAUTHORIZED),
            (None, r#"{"provider":"stripe"}"#, StatusCode::UNAUTHORIZED),
            (Some(ADMIN_TOKEN), r#"{"client_uid":"x"}"#, StatusCode::BAD_REQUEST),
            (Some(ADMIN_TOKEN), r#"{"provider":"bitcoin"}"#, StatusCode::BAD_REQUEST),
            (
                Some(ADMIN_TOKEN),
                r#"{"client_uid":"taken","provider":"paypal"}"#,
                StatusCode::CONFLICT,
            ),
        ];

        for (token, body, expected) in cases {
            let (status, _) =
                send(app(&store), admin_request("POST", token, Some(body))).await;
            assert_eq!(status, expected, "{}", body);
        }

        assert_eq!(store.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_configured_token() {
        let store = MemoryStore::default();
        let app = router(AppState::new(Config::default(), store.clone()));

        let (status, _) = send(app, admin_request("GET", Some(""), None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
