use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{AuthError, Principal, Role};
use crate::config::{ConfigError, CredentialsConfig};

/// The in-memory credential table.
///
/// Built from configuration at startup (and on reload); this is the
/// authoritative store, so lookups never leave the process. Keys are held
/// only as SHA-256 digests.
pub struct CredentialTable {
    entries: Vec<StoredCredential>,
    allowed_admins: Vec<String>,
}

struct StoredCredential {
    digest: [u8; 32],
    principal_id: String,
    roles: Vec<Role>,
    tenant: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialTable {
    /// Build the table from validated configuration. Cleartext keys are
    /// digested immediately and dropped.
    pub fn from_config(config: &CredentialsConfig) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(config.keys.len());
        for entry in &config.keys {
            let digest: [u8; 32] = match (&entry.key, &entry.key_sha256) {
                (Some(key), None) => Sha256::digest(key.as_bytes()).into(),
                (None, Some(hex_digest)) => {
                    let bytes = hex::decode(hex_digest).map_err(|e| {
                        ConfigError::Validation(format!(
                            "credential for '{}' has a malformed key_sha256: {}",
                            entry.principal, e
                        ))
                    })?;
                    bytes.try_into().map_err(|_| {
                        ConfigError::Validation(format!(
                            "credential for '{}' has a key_sha256 of the wrong length",
                            entry.principal
                        ))
                    })?
                }
                // Rejected by CredentialsConfig::validate before we get here.
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "credential for '{}' must set exactly one of key and key_sha256",
                        entry.principal
                    )));
                }
            };

            entries.push(StoredCredential {
                digest,
                principal_id: entry.principal.clone(),
                roles: entry.roles.clone(),
                tenant: entry.tenant.clone(),
                expires_at: entry.expires_at,
            });
        }

        Ok(Self {
            entries,
            allowed_admins: config.allowed_admins.clone(),
        })
    }

    /// Resolve a presented credential to a [`Principal`].
    ///
    /// The presented key's digest is compared against every entry with a
    /// constant-time comparison and no early exit, so response timing does
    /// not distinguish unknown from expired keys (both return the same
    /// generic error). Read-only; never fails open.
    pub fn validate(&self, credential: &str) -> Result<Principal, AuthError> {
        let digest: [u8; 32] = Sha256::digest(credential.as_bytes()).into();

        let mut matched: Option<&StoredCredential> = None;
        for entry in &self.entries {
            if bool::from(digest.ct_eq(&entry.digest)) {
                matched = Some(entry);
            }
            // Keep scanning: the full table is walked for every lookup.
        }

        let entry = matched.ok_or(AuthError::InvalidCredentials)?;

        if let Some(expires_at) = entry.expires_at {
            if Utc::now() >= expires_at {
                return Err(AuthError::InvalidCredentials);
            }
        }

        if !self.allowed_admins.is_empty()
            && !self.allowed_admins.iter().any(|a| a == &entry.principal_id)
        {
            tracing::warn!(
                principal = %entry.principal_id,
                "Principal with a valid key is not in the admin allow-list"
            );
            return Err(AuthError::NotAllowListed(entry.principal_id.clone()));
        }

        Ok(Principal {
            id: entry.principal_id.clone(),
            roles: entry.roles.clone(),
            tenant: entry.tenant.clone(),
        })
    }

    /// Number of provisioned credentials.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
