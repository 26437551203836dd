//! Forwarding to the internal backend.
//!
//! The forwarder owns one shared `reqwest` client (reqwest pools
//! connections per host internally). Per call it enforces the configured
//! timeout, forwards only an explicit allow-list of headers in each
//! direction, strips the caller's gateway credential, substitutes the
//! gateway's own backend credential, and attaches identity context headers
//! for the backend's benefit. Idempotent requests may be retried once on a
//! transient connect failure; non-idempotent requests never are.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::auth::Principal;
use crate::config::{BackendConfig, ConfigError};

/// Request headers copied through to the backend. Everything else —
/// including the caller's `Authorization` / `X-API-Key` — is dropped.
const FORWARD_REQUEST_HEADERS: &[&str] = &["content-type", "accept", "x-request-id"];

/// Response headers relayed back to the caller. Hop-by-hop headers and any
/// backend-internal headers (including echoes of the backend credential)
/// never leave the gateway.
const FORWARD_RESPONSE_HEADERS: &[&str] = &["content-type", "x-request-id"];

/// Header carrying the gateway's backend credential.
const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

/// Transient request to be forwarded; owned by the forwarder for the
/// duration of one call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path under the backend base URL, without a leading slash.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The backend's answer, already filtered down to relayable headers.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when the forwarder retried a transient failure.
    pub retried: bool,
}

/// Transport-level forwarding failures. Backend application responses of
/// any status are relayed as a [`ProxyResponse`], not an error.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("failed reading backend response body: {0}")]
    Body(String),
}

/// Forwards authorized requests to the internal management API.
pub struct ProxyForwarder {
    client: reqwest::Client,
    base_url: String,
    backend_key: Option<String>,
    timeout: Duration,
    retry_idempotent: bool,
}

impl ProxyForwarder {
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| {
                ConfigError::Validation(format!("failed to build backend HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            backend_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry_idempotent: config.retry_idempotent,
        })
    }

    /// Forward one request, relaying whatever status the backend answers.
    ///
    /// The per-call timeout covers connect, request and the full response
    /// body; on expiry the pending call is dropped and
    /// [`ProxyError::Timeout`] is returned — the caller never waits past
    /// the ceiling.
    pub async fn forward(
        &self,
        request: &ProxyRequest,
        principal: &Principal,
        tenant_id: &str,
    ) -> Result<ProxyResponse, ProxyError> {
        let first = self.send(request, principal, tenant_id).await;

        match first {
            Err(ProxyError::Unreachable(reason))
                if self.retry_idempotent && is_idempotent(&request.method) =>
            {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    reason = %reason,
                    "Retrying idempotent request after transient failure"
                );
                let mut response = self.send(request, principal, tenant_id).await?;
                response.retried = true;
                Ok(response)
            }
            other => other,
        }
    }

    async fn send(
        &self,
        request: &ProxyRequest,
        principal: &Principal,
        tenant_id: &str,
    ) -> Result<ProxyResponse, ProxyError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let headers = self.backend_headers(&request.headers, principal, tenant_id);

        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(request.body.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status().as_u16();
        let response_headers = filter_headers(response.headers(), FORWARD_RESPONSE_HEADERS);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::Timeout(self.timeout)
            } else {
                ProxyError::Body(e.to_string())
            }
        })?;

        Ok(ProxyResponse {
            status,
            headers: response_headers,
            body,
            retried: false,
        })
    }

    fn classify_send_error(&self, error: reqwest::Error) -> ProxyError {
        if error.is_timeout() {
            ProxyError::Timeout(self.timeout)
        } else {
            ProxyError::Unreachable(error.to_string())
        }
    }

    /// Build the outbound header set: allow-listed caller headers, identity
    /// context for the backend, and the gateway's backend credential.
    fn backend_headers(
        &self,
        inbound: &HeaderMap,
        principal: &Principal,
        tenant_id: &str,
    ) -> HeaderMap {
        let mut headers = filter_headers(inbound, FORWARD_REQUEST_HEADERS);

        insert_str(&mut headers, "x-gateway-principal", &principal.id);
        insert_str(&mut headers, "x-gateway-roles", &principal.role_names());
        insert_str(&mut headers, "x-gateway-tenant", tenant_id);
        insert_str(&mut headers, "x-gateway-source", "palisade");

        if let Some(key) = &self.backend_key {
            insert_str(&mut headers, INTERNAL_API_KEY_HEADER, key);
        }

        headers
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

// The allow-lists are compile-time constants; `from_static` needs that.
fn filter_headers(source: &HeaderMap, allow_list: &[&'static str]) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for name in allow_list {
        let name = HeaderName::from_static(name);
        for value in source.get_all(&name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

fn insert_str(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
