//! Client management endpoints.
//!
//! Every request must carry `X-Admin-Token`. With no token configured the
//! routes refuse everything.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::clients::{Client, NewClient};
use crate::queue::Provider;
use crate::store::{RelayStore, StoreError};
use crate::web::handlers::{error_response, AppState};

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Body of `POST /admin/clients`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateClientRequest {
    #[serde(default)]
    pub client_uid: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// A freshly created client. The only response that includes the secret.
#[derive(Debug, Serialize)]
pub struct CreatedClientResponse {
    pub client_uid: String,
    pub secret: String,
    pub provider: Provider,
}

fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = expected else {
        warn!("admin_token_not_configured");
        return Err(error_response(StatusCode::UNAUTHORIZED, "admin disabled"));
    };

    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        warn!(has_token = !provided.is_empty(), "admin_token_invalid");
        Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

/// `POST /admin/clients`
pub async fn create_client<S: RelayStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(request): Json<CreateClientRequest>,
) -> Response {
    if let Err(rejection) = authorize(state.config.admin_token.as_deref(), &headers) {
        return rejection;
    }

    let Some(tag) = request.provider.filter(|p| !p.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "provider is required");
    };

    let provider = Provider::parse(&tag);
    if !provider.is_supported() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unsupported provider: {}", tag),
        );
    }

    match state
        .store
        .create_client(NewClient::generate(request.client_uid, provider))
        .await
    {
        Ok(client) => {
            info!(client_uid = %client.uid, provider = %client.provider, "client_created");
            (
                StatusCode::CREATED,
                Json(CreatedClientResponse {
                    client_uid: client.uid,
                    secret: client.secret,
                    provider: client.provider,
                }),
            )
                .into_response()
        }
        Err(StoreError::DuplicateClient(uid)) => {
            warn!(client_uid = %uid, "client_already_exists");
            error_response(
                StatusCode::CONFLICT,
                format!("client {} already exists", uid),
            )
        }
        Err(e) => {
            error!(error = %e, "client_create_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create client")
        }
    }
}

/// `GET /admin/clients`
pub async fn list_clients<S: RelayStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(state.config.admin_token.as_deref(), &headers) {
        return rejection;
    }

    match state.store.list_clients().await {
        Ok(clients) => Json::<Vec<Client>>(clients).into_response(),
        Err(e) => {
            error!(error = %e, "client_list_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list clients")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_TOKEN_HEADER, token.parse().unwrap());
        headers
    }

    #[test]
    fn test_authorize_matching_token() {
        assert!(authorize(Some("s3cret"), &headers_with("s3cret")).is_ok());
    }

    #[test]
    fn test_authorize_wrong_token() {
        let rejection = authorize(Some("s3cret"), &headers_with("s3cre")).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_authorize_missing_header() {
        let rejection = authorize(Some("s3cret"), &HeaderMap::new()).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_authorize_disabled_without_token() {
        let rejection = authorize(None, &headers_with("")).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }
}
