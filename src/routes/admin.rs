use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    authz::PolicySnapshot,
    config::GatewayConfig,
    gateway::ErrorResponse,
    AppState,
};

/// `POST /admin/reload`: re-read the configuration file and swap the live
/// policy snapshot. Requires the operator key from `server.admin_key`; the
/// endpoint answers 404 when no key is configured so its existence is not
/// advertised.
pub async fn reload(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(expected) = state.config.server.admin_key.as_deref() else {
        let body = ErrorResponse::with_type(
            "invalid_request_error",
            "not_found",
            "Not found",
        );
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    let provided = match crate::auth::extract_credential(&headers) {
        Ok(credential) => credential,
        Err(_) => {
            let body = ErrorResponse::with_type(
                "authentication_error",
                "unauthenticated",
                "Invalid authentication credentials",
            );
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }
    };

    // Digest before comparing so the comparison length is fixed.
    let provided_digest: [u8; 32] = Sha256::digest(provided.as_bytes()).into();
    let expected_digest: [u8; 32] = Sha256::digest(expected.as_bytes()).into();
    if !bool::from(provided_digest.ct_eq(&expected_digest)) {
        let body = ErrorResponse::with_type(
            "authentication_error",
            "unauthenticated",
            "Invalid authentication credentials",
        );
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    let Some(path) = state.config_path.as_deref() else {
        let body = ErrorResponse::with_type(
            "invalid_request_error",
            "reload_unavailable",
            "Gateway was not started from a configuration file",
        );
        return (StatusCode::CONFLICT, Json(body)).into_response();
    };

    let snapshot = GatewayConfig::from_file(path)
        .and_then(|config| PolicySnapshot::from_config(&config));
    match snapshot {
        Ok(snapshot) => {
            let tenants = snapshot.tenant_count();
            let credentials = snapshot.credentials.len();
            state.policy.swap(snapshot);
            tracing::info!(tenants, credentials, "Policy snapshot reloaded");
            Json(json!({
                "status": "reloaded",
                "tenants": tenants,
                "credentials": credentials,
            }))
            .into_response()
        }
        // The previous snapshot stays live; a broken file on disk must not
        // take the gateway down.
        Err(error) => {
            tracing::error!(error = %error, "Reload rejected; keeping current policy");
            let body = ErrorResponse::with_type(
                "invalid_request_error",
                "reload_failed",
                error.to_string(),
            );
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
    }
}
