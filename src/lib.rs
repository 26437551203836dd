//! Palisade: a security gateway in front of an internal HTTP backend.
//!
//! Every request to `/api/{*path}` passes a single pipeline — credential
//! validation, tenant/role authorization, per-(principal, tenant) rate
//! limiting — before being forwarded with the gateway's own backend
//! credential, and every request leaves exactly one record in a
//! tamper-evident append-only audit trail.

use std::path::PathBuf;
use std::sync::Arc;

pub mod audit;
pub mod auth;
pub mod authz;
pub mod config;
pub mod gateway;
pub mod proxy;
pub mod ratelimit;
pub mod routes;

use audit::AuditSink;
use authz::{PolicySnapshot, PolicyStore};
use config::{ConfigError, GatewayConfig};
use gateway::Coordinator;
use proxy::ProxyForwarder;
use ratelimit::RateLimiter;

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub policy: Arc<PolicyStore>,
    pub coordinator: Arc<Coordinator>,
    /// Where the configuration was loaded from; reload is unavailable
    /// without it.
    pub config_path: Option<Arc<PathBuf>>,
}

impl AppState {
    /// Wire up the pipeline from validated configuration.
    pub fn new(
        config: GatewayConfig,
        sink: Arc<dyn AuditSink>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let policy = Arc::new(PolicyStore::new(PolicySnapshot::from_config(&config)?));
        let limiter = RateLimiter::new(&config.limits);
        let forwarder = ProxyForwarder::from_config(&config.backend)?;

        let coordinator = Arc::new(Coordinator::new(
            policy.clone(),
            limiter,
            forwarder,
            sink,
        ));

        Ok(Self {
            config: Arc::new(config),
            policy,
            coordinator,
            config_path: config_path.map(Arc::new),
        })
    }
}
