use serde::{Deserialize, Serialize};

use super::{ConfigError, RateLimitSettings};

/// Per-tenant policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantsConfig {
    /// One policy per tenant. Tenants without a policy deny every
    /// operation.
    #[serde(default)]
    pub policies: Vec<TenantPolicyConfig>,
}

/// Policy for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantPolicyConfig {
    /// Tenant identifier, matched against the `X-Tenant-ID` header.
    pub id: String,

    /// Principals allowed to act as this tenant's admins.
    ///
    /// Empty means any org-admin whose home tenant matches (system-admins
    /// are always exempt from this list).
    #[serde(default)]
    pub admins: Vec<String>,

    /// Operation names enabled for this tenant. Matched exactly.
    #[serde(default)]
    pub operations: Vec<String>,

    /// Rate-limit override for this tenant. Falls back to
    /// `limits.rate_limit` when unset.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

impl TenantsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for policy in &self.policies {
            if policy.id.is_empty() {
                return Err(ConfigError::Validation(
                    "tenant policy with an empty id".into(),
                ));
            }
            if !seen.insert(policy.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate tenant policy for '{}'",
                    policy.id
                )));
            }
            if let Some(rl) = &policy.rate_limit {
                rl.validate(&format!("tenants.policies[{}].rate_limit", policy.id))?;
            }
        }
        Ok(())
    }
}
