//! HTTP surface: health, the proxied `/api` tree and the admin reload
//! endpoint.

mod admin;
mod api;
mod health;

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::AppState;

/// Assemble the gateway router.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health::health))
        .route("/admin/reload", post(admin::reload))
        .route("/api/{*path}", any(api::proxy))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
