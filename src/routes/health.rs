use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Liveness probe. Unauthenticated and exempt from rate limiting: it never
/// enters the security pipeline. Reports the count of audit records dropped
/// to sink failure so monitors can alert on a broken trail.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "palisade",
        "audit_drops": state.coordinator.audit_drops(),
    }))
}
