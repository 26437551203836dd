use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::auth::CredentialTable;
use crate::config::{ConfigError, GatewayConfig, RateLimitSettings};

/// Runtime form of one tenant's policy.
#[derive(Debug, Clone)]
pub struct TenantPolicy {
    /// Principals allowed to act as this tenant's admins. Empty admits any
    /// org-admin whose home tenant matches.
    pub admins: HashSet<String>,

    /// Enabled operation names, matched exactly.
    pub operations: HashSet<String>,

    /// Rate-limit override for this tenant.
    pub rate_limit: Option<RateLimitSettings>,
}

/// An immutable view of everything reloadable: tenant policies, the
/// credential table and the default rate limit.
///
/// A request clones the `Arc` once at entry and completes against that view
/// even if a reload swaps the store underneath it.
pub struct PolicySnapshot {
    tenants: HashMap<String, TenantPolicy>,
    /// Credential digest table; reloaded together with the policies so a
    /// revoked key and its tenant policy disappear in the same swap.
    pub credentials: CredentialTable,
    default_rate_limit: RateLimitSettings,
}

impl PolicySnapshot {
    /// Build a snapshot from validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let credentials = CredentialTable::from_config(&config.credentials)?;

        let tenants = config
            .tenants
            .policies
            .iter()
            .map(|p| {
                (
                    p.id.clone(),
                    TenantPolicy {
                        admins: p.admins.iter().cloned().collect(),
                        operations: p.operations.iter().cloned().collect(),
                        rate_limit: p.rate_limit,
                    },
                )
            })
            .collect();

        Ok(Self {
            tenants,
            credentials,
            default_rate_limit: config.limits.rate_limit,
        })
    }

    /// Look up a tenant's policy. `None` means the tenant is unconfigured
    /// and denies everything.
    pub fn tenant(&self, tenant_id: &str) -> Option<&TenantPolicy> {
        self.tenants.get(tenant_id)
    }

    /// Effective rate-limit settings for a tenant: its override, or the
    /// global default.
    pub fn rate_settings(&self, tenant_id: &str) -> RateLimitSettings {
        self.tenant(tenant_id)
            .and_then(|p| p.rate_limit)
            .unwrap_or(self.default_rate_limit)
    }

    /// Number of configured tenants.
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

/// Holder for the current [`PolicySnapshot`].
///
/// Reads take the lock only long enough to clone an `Arc`; a reload in
/// progress never blocks request handling for more than that.
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot to use for one request, captured at request start.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.read().clone()
    }

    /// Atomically replace the snapshot. In-flight requests keep the one
    /// they already hold.
    pub fn swap(&self, snapshot: PolicySnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = snapshot;
    }
}
