use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::auth::Role;

/// Caller credential table.
///
/// Credentials are opaque bearer keys. A key can be given either in
/// cleartext (typically via `${VAR}` interpolation so the TOML file never
/// holds the secret) or as a pre-computed SHA-256 hex digest. Only digests
/// are kept in memory after startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Known credentials.
    #[serde(default)]
    pub keys: Vec<CredentialEntry>,

    /// Optional global narrowing of which principals may use the gateway
    /// at all. Empty means every principal in the table is eligible.
    #[serde(default)]
    pub allowed_admins: Vec<String>,
}

/// One provisioned credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialEntry {
    /// Stable principal identifier the key resolves to.
    pub principal: String,

    /// Cleartext key. Exactly one of `key` and `key_sha256` must be set.
    #[serde(default)]
    pub key: Option<String>,

    /// Hex-encoded SHA-256 digest of the key.
    #[serde(default)]
    pub key_sha256: Option<String>,

    /// Roles held by the principal.
    pub roles: Vec<Role>,

    /// The principal's home tenant.
    pub tenant: String,

    /// Optional expiry. Expired keys are rejected identically to unknown
    /// ones.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.keys {
            match (&entry.key, &entry.key_sha256) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Validation(format!(
                        "credential for '{}' sets both key and key_sha256",
                        entry.principal
                    )));
                }
                (None, None) => {
                    return Err(ConfigError::Validation(format!(
                        "credential for '{}' sets neither key nor key_sha256",
                        entry.principal
                    )));
                }
                (Some(key), None) => {
                    if key.len() < MIN_KEY_LEN {
                        return Err(ConfigError::Validation(format!(
                            "credential for '{}' is shorter than {} characters",
                            entry.principal, MIN_KEY_LEN
                        )));
                    }
                }
                (None, Some(digest)) => {
                    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(ConfigError::Validation(format!(
                            "credential for '{}' has a malformed key_sha256 \
                             (expected 64 hex characters)",
                            entry.principal
                        )));
                    }
                }
            }

            if entry.roles.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "credential for '{}' has no roles",
                    entry.principal
                )));
            }
            if entry.tenant.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "credential for '{}' has an empty home tenant",
                    entry.principal
                )));
            }
        }

        Ok(())
    }
}

/// Minimum length for cleartext keys, matching what the backend provisions.
pub const MIN_KEY_LEN: usize = 32;
