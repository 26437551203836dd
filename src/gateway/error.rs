use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use http::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::{auth::AuthError, authz::DenyReason, proxy::ProxyError};

/// Caller-facing error body: `{"error": {"type", "code", "message"}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error classification (e.g. "authentication_error").
    #[serde(rename = "type")]
    pub error_type: String,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorResponse {
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Terminal request failures, one variant per outcome in the taxonomy.
///
/// Authentication detail is withheld from the caller (all credential
/// problems render the same 401); authorization reasons are included since
/// they are not secret-bearing; backend failures get a generic message with
/// the full detail kept in the audit record.
#[derive(Debug)]
pub enum GatewayError {
    /// `X-Tenant-ID` header missing or empty.
    MissingTenant,

    /// `X-Operation` header missing or empty.
    MissingOperation,

    /// Both credential headers presented.
    AmbiguousCredentials,

    /// Missing, malformed, unknown or expired credential.
    Unauthenticated,

    /// Valid key, but the principal is outside the global admin allow-list.
    NotAllowListed,

    /// Denied by the authorization engine.
    Unauthorized(DenyReason),

    /// Over the (principal, tenant) budget.
    RateLimited { limit: u32, retry_after_secs: u64 },

    /// Could not reach the backend.
    BackendUnreachable,

    /// Backend did not answer within the configured ceiling.
    BackendTimeout,

    /// Backend connection broke while reading the response.
    BackendError,

    /// Caller disconnected before a response was produced.
    ClientCancelled,

    /// Pipeline infrastructure failure (e.g. a panicked task).
    Internal(String),
}

impl GatewayError {
    /// Machine-readable reason recorded in the audit trail. Distinct per
    /// terminal outcome and always non-empty.
    pub fn audit_reason(&self) -> String {
        match self {
            GatewayError::MissingTenant => "missing-tenant".into(),
            GatewayError::MissingOperation => "missing-operation".into(),
            GatewayError::AmbiguousCredentials => "ambiguous-credentials".into(),
            GatewayError::Unauthenticated => "unauthenticated".into(),
            GatewayError::NotAllowListed => "not-allow-listed".into(),
            GatewayError::Unauthorized(reason) => reason.as_str().into(),
            GatewayError::RateLimited { .. } => "rate-limited".into(),
            GatewayError::BackendUnreachable => "backend-unreachable".into(),
            GatewayError::BackendTimeout => "backend-timeout".into(),
            GatewayError::BackendError => "backend-error".into(),
            GatewayError::ClientCancelled => "client-cancelled".into(),
            GatewayError::Internal(_) => "internal".into(),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AmbiguousCredentials => GatewayError::AmbiguousCredentials,
            AuthError::NotAllowListed(_) => GatewayError::NotAllowListed,
            AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                GatewayError::Unauthenticated
            }
        }
    }
}

impl From<ProxyError> for GatewayError {
    fn from(error: ProxyError) -> Self {
        match error {
            ProxyError::Unreachable(_) => GatewayError::BackendUnreachable,
            ProxyError::Timeout(_) => GatewayError::BackendTimeout,
            ProxyError::Body(_) => GatewayError::BackendError,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match &self {
            GatewayError::MissingTenant => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_tenant".to_string(),
                "Tenant ID required in X-Tenant-ID header".to_string(),
            ),
            GatewayError::MissingOperation => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_operation".to_string(),
                "Operation name required in X-Operation header".to_string(),
            ),
            GatewayError::AmbiguousCredentials => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "ambiguous_credentials".to_string(),
                "Provide either X-API-Key or Authorization header, not both".to_string(),
            ),
            // One generic body for every credential problem: the caller
            // must not learn which check failed.
            GatewayError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthenticated".to_string(),
                "Invalid authentication credentials".to_string(),
            ),
            GatewayError::NotAllowListed => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "not-allow-listed".to_string(),
                "Admin not authorized for gateway access".to_string(),
            ),
            GatewayError::Unauthorized(reason) => (
                StatusCode::FORBIDDEN,
                "permission_error",
                reason.as_str().to_string(),
                reason.message().to_string(),
            ),
            GatewayError::RateLimited {
                limit,
                retry_after_secs,
            } => {
                let body = ErrorResponse::with_type(
                    "rate_limit_error",
                    "rate_limited",
                    format!("Rate limit exceeded: {} requests per window", limit),
                );
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                let headers = response.headers_mut();
                if let Ok(v) = HeaderValue::try_from(retry_after_secs.to_string()) {
                    headers.insert("Retry-After", v.clone());
                    headers.insert("X-RateLimit-Reset", v);
                }
                if let Ok(v) = HeaderValue::try_from(limit.to_string()) {
                    headers.insert("X-RateLimit-Limit", v);
                }
                headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
                return response;
            }
            // Generic messages: internal topology stays out of caller
            // responses; the audit record has the detail.
            GatewayError::BackendUnreachable => (
                StatusCode::BAD_GATEWAY,
                "server_error",
                "backend_unreachable".to_string(),
                "Upstream service unavailable".to_string(),
            ),
            GatewayError::BackendError => (
                StatusCode::BAD_GATEWAY,
                "server_error",
                "backend_error".to_string(),
                "Upstream service unavailable".to_string(),
            ),
            GatewayError::BackendTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "server_error",
                "backend_timeout".to_string(),
                "Upstream service did not respond in time".to_string(),
            ),
            // 499: the client is gone, nobody reads this response.
            GatewayError::ClientCancelled => (
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
                "request_error",
                "client_cancelled".to_string(),
                "Client closed the request".to_string(),
            ),
            GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal_error".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let body = ErrorResponse::with_type(error_type, code, message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_taxonomy() {
        let cases: Vec<(GatewayError, u16)> = vec![
            (GatewayError::MissingTenant, 400),
            (GatewayError::AmbiguousCredentials, 400),
            (GatewayError::Unauthenticated, 401),
            (GatewayError::NotAllowListed, 403),
            (GatewayError::Unauthorized(DenyReason::CrossTenant), 403),
            (
                GatewayError::RateLimited {
                    limit: 60,
                    retry_after_secs: 30,
                },
                429,
            ),
            (GatewayError::BackendUnreachable, 502),
            (GatewayError::BackendTimeout, 504),
            (GatewayError::BackendError, 502),
            (GatewayError::Internal("boom".into()), 500),
        ];
        for (error, expected) in cases {
            let response = error.into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let response = GatewayError::RateLimited {
            limit: 60,
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.headers().get("Retry-After").unwrap(), "42");
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "60");
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            "0"
        );
    }

    #[test]
    fn test_expired_and_unknown_credentials_render_identically() {
        // Both collapse to GatewayError::Unauthenticated before rendering.
        let from_unknown: GatewayError = AuthError::InvalidCredentials.into();
        let from_missing: GatewayError = AuthError::MissingCredentials.into();
        assert_eq!(from_unknown.audit_reason(), from_missing.audit_reason());
    }

    #[test]
    fn test_audit_reasons_are_distinct_and_non_empty() {
        let errors = [
            GatewayError::MissingTenant,
            GatewayError::MissingOperation,
            GatewayError::AmbiguousCredentials,
            GatewayError::Unauthenticated,
            GatewayError::NotAllowListed,
            GatewayError::Unauthorized(DenyReason::Role),
            GatewayError::Unauthorized(DenyReason::CrossTenant),
            GatewayError::Unauthorized(DenyReason::NotTenantAdmin),
            GatewayError::Unauthorized(DenyReason::OperationNotEnabled),
            GatewayError::RateLimited {
                limit: 1,
                retry_after_secs: 1,
            },
            GatewayError::BackendUnreachable,
            GatewayError::BackendTimeout,
            GatewayError::BackendError,
            GatewayError::ClientCancelled,
        ];
        let reasons: std::collections::HashSet<_> =
            errors.iter().map(|e| e.audit_reason()).collect();
        assert_eq!(reasons.len(), errors.len());
        assert!(reasons.iter().all(|r| !r.is_empty()));
    }
}
