//! The request coordinator.
//!
//! One linear pass per request: validate credential → authorize →
//! rate-limit → forward, with any failure short-circuiting the rest. Every
//! request that enters [`Coordinator::handle`] produces exactly one audit
//! record, written before the response is returned — including requests
//! whose caller disconnected mid-flight.

mod error;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
pub use error::{ErrorInfo, ErrorResponse, GatewayError};
use http::{HeaderMap, HeaderValue, Method};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    audit::{AuditDecision, AuditRecord, AuditSink},
    auth,
    authz::{self, Decision, PolicySnapshot, PolicyStore},
    proxy::{ProxyForwarder, ProxyRequest, ProxyResponse},
    ratelimit::{RateLimiter, RateQuota},
};

/// Header naming the tenant a request acts for.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header naming the requested operation.
pub const OPERATION_HEADER: &str = "x-operation";

/// The inbound request, already decomposed by the route handler.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path under `/api/`, without a leading slash.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Everything learned about a request on its way through the pipeline,
/// folded into the audit record at the end.
#[derive(Default)]
struct Trail {
    principal: Option<String>,
    tenant: Option<String>,
    operation: Option<String>,
    backend_status: Option<String>,
    retried: bool,
    quota: Option<RateQuota>,
}

/// Sequences the security pipeline and owns its collaborators.
pub struct Coordinator {
    policy: Arc<PolicyStore>,
    limiter: RateLimiter,
    forwarder: ProxyForwarder,
    sink: Arc<dyn AuditSink>,
    audit_drops: AtomicU64,
}

impl Coordinator {
    pub fn new(
        policy: Arc<PolicyStore>,
        limiter: RateLimiter,
        forwarder: ProxyForwarder,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy,
            limiter,
            forwarder,
            sink,
            audit_drops: AtomicU64::new(0),
        }
    }

    /// Run one request through the pipeline.
    ///
    /// `cancel` fires when the caller disconnects; the in-flight backend
    /// call is then abandoned and the request is audited as
    /// client-cancelled. The audit write itself is not cancellable — it
    /// happens here, after the pipeline, on whatever path was taken.
    pub async fn handle(&self, request: InboundRequest, cancel: CancellationToken) -> Response {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        // One snapshot per request: a reload mid-flight does not change
        // the policy this request is judged against.
        let snapshot = self.policy.snapshot();

        let mut trail = Trail::default();
        let result = self.run(&request, &snapshot, &mut trail, &cancel).await;

        let (decision, reason) = match &result {
            Ok(_) => (AuditDecision::Allowed, None),
            Err(error) => {
                match error {
                    GatewayError::BackendTimeout => {
                        trail.backend_status = Some("timeout".into());
                    }
                    GatewayError::BackendUnreachable => {
                        trail.backend_status = Some("unreachable".into());
                    }
                    GatewayError::BackendError => {
                        trail.backend_status = Some("error".into());
                    }
                    _ => {}
                }
                (AuditDecision::Denied, Some(error.audit_reason()))
            }
        };

        let record = AuditRecord {
            timestamp: Utc::now(),
            request_id,
            principal: trail.principal,
            tenant: trail.tenant,
            operation: trail.operation,
            method: request.method.to_string(),
            path: request.path.clone(),
            decision,
            reason,
            backend_status: trail.backend_status,
            retried: trail.retried,
            latency_ms: started.elapsed().as_millis() as u64,
        };
        self.write_audit(record).await;

        let mut response = match result {
            Ok(proxied) => proxied_response(proxied, trail.quota),
            Err(error) => error.into_response(),
        };
        if let Ok(value) = HeaderValue::try_from(request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }

    async fn run(
        &self,
        request: &InboundRequest,
        snapshot: &PolicySnapshot,
        trail: &mut Trail,
        cancel: &CancellationToken,
    ) -> Result<ProxyResponse, GatewayError> {
        // Stage 1: authenticate. Fails before the authorization engine is
        // ever consulted.
        let credential = auth::extract_credential(&request.headers)?;
        let principal = snapshot.credentials.validate(&credential)?;
        trail.principal = Some(principal.id.clone());

        let tenant = header_value(&request.headers, TENANT_HEADER)
            .ok_or(GatewayError::MissingTenant)?;
        trail.tenant = Some(tenant.clone());
        let operation = header_value(&request.headers, OPERATION_HEADER)
            .ok_or(GatewayError::MissingOperation)?;
        trail.operation = Some(operation.clone());

        // Stage 2: authorize.
        match authz::authorize(&principal, &tenant, &operation, snapshot.tenant(&tenant)) {
            Decision::Allow => {}
            Decision::Deny(reason) => {
                tracing::warn!(
                    principal = %principal.id,
                    tenant = %tenant,
                    operation = %operation,
                    reason = reason.as_str(),
                    "Request denied"
                );
                return Err(GatewayError::Unauthorized(reason));
            }
        }

        // Stage 3: rate-limit.
        let settings = snapshot.rate_settings(&tenant);
        let quota = self
            .limiter
            .check_and_consume(&principal.id, &tenant, settings)
            .map_err(|exceeded| GatewayError::RateLimited {
                limit: exceeded.limit,
                retry_after_secs: exceeded.retry_after_secs,
            })?;
        trail.quota = Some(quota);

        // Stage 4: forward, abandoning the call if the caller disconnects.
        let proxy_request = ProxyRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        };
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(
                    principal = %principal.id,
                    tenant = %tenant,
                    "Client disconnected; abandoning backend call"
                );
                return Err(GatewayError::ClientCancelled);
            }
            result = self.forwarder.forward(&proxy_request, &principal, &tenant) => result?,
        };

        trail.retried = response.retried;
        trail.backend_status = Some(response.status.to_string());
        Ok(response)
    }

    /// Write the audit record, escalating (but never propagating) sink
    /// failure: the business response must not be blocked, and the failure
    /// must not be swallowed either.
    async fn write_audit(&self, record: AuditRecord) {
        if let Err(error) = self.sink.record(&record).await {
            let dropped = self.audit_drops.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::error!(
                alert = true,
                sink = self.sink.name(),
                error = %error,
                dropped_total = dropped,
                request_id = %record.request_id,
                "AUDIT WRITE FAILED - record dropped"
            );
        }
    }

    /// Total audit records dropped due to sink failure since startup.
    pub fn audit_drops(&self) -> u64 {
        self.audit_drops.load(Ordering::Relaxed)
    }
}

/// Relay the backend's answer, adding the remaining-quota headers.
fn proxied_response(proxied: ProxyResponse, quota: Option<RateQuota>) -> Response {
    let mut builder = http::Response::builder().status(proxied.status);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(proxied.headers);
        if let Some(quota) = quota {
            if let Ok(v) = HeaderValue::try_from(quota.limit.to_string()) {
                headers.insert("X-RateLimit-Limit", v);
            }
            if let Ok(v) = HeaderValue::try_from(quota.remaining.to_string()) {
                headers.insert("X-RateLimit-Remaining", v);
            }
            if let Ok(v) = HeaderValue::try_from(quota.reset_secs.to_string()) {
                headers.insert("X-RateLimit-Reset", v);
            }
        }
    }
    builder
        .body(axum::body::Body::from(proxied.body))
        .unwrap_or_else(|_| GatewayError::Internal("response build failed".into()).into_response())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_trims_and_rejects_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("  acme  "));
        assert_eq!(header_value(&headers, TENANT_HEADER).as_deref(), Some("acme"));

        headers.insert(TENANT_HEADER, HeaderValue::from_static("   "));
        assert_eq!(header_value(&headers, TENANT_HEADER), None);
        assert_eq!(header_value(&headers, OPERATION_HEADER), None);
    }
}
