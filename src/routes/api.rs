use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::{
    gateway::{ErrorResponse, GatewayError, InboundRequest},
    AppState,
};

/// Handler for the proxied `/api/{*path}` surface.
///
/// The pipeline runs in a spawned task so it survives the handler future
/// being dropped on client disconnect: the drop guard cancels the token,
/// the coordinator abandons the backend call, and the audit record is still
/// written.
pub async fn proxy(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.config.server.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            let body = ErrorResponse::with_type(
                "invalid_request_error",
                "payload_too_large",
                "Request body exceeds the configured limit",
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response();
        }
    };

    let inbound = InboundRequest {
        method: parts.method,
        path,
        headers: parts.headers,
        body,
    };

    let cancel = CancellationToken::new();
    let disconnect_guard = cancel.clone().drop_guard();

    let coordinator = state.coordinator.clone();
    let pipeline = tokio::spawn(async move { coordinator.handle(inbound, cancel).await });

    let response = match pipeline.await {
        Ok(response) => response,
        Err(join_error) => {
            tracing::error!(error = %join_error, "Request pipeline task failed");
            GatewayError::Internal(join_error.to_string()).into_response()
        }
    };

    // Completed normally; cancelling the token now is a no-op.
    drop(disconnect_guard);
    response
}
