//! Configuration module for the gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Configuration is read
//! once at startup and again only on an explicit `/admin/reload`; it is never
//! silently re-read mid-request.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [backend]
//! base_url = "http://jai-internal:8000"
//! api_key = "${BACKEND_API_KEY}"
//!
//! [[credentials.keys]]
//! principal = "alice"
//! key = "${ALICE_API_KEY}"
//! roles = ["org_admin"]
//! tenant = "acme"
//! ```

mod audit;
mod backend;
mod credentials;
mod limits;
mod observability;
mod server;
mod tenants;

use std::path::Path;

pub use audit::*;
pub use backend::*;
pub use credentials::*;
pub use limits::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use tenants::*;

/// Root configuration for the gateway.
///
/// All sections are optional with sensible defaults, allowing minimal
/// configuration for local development. A production deployment needs at
/// least `backend.base_url` and one credential entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// The internal backend the gateway fronts.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Caller credential table.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Per-tenant policies (admin allow-lists, enabled operations,
    /// rate-limit overrides).
    #[serde(default)]
    pub tenants: TenantsConfig,

    /// Global rate-limit defaults and limiter sizing.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: GatewayConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.credentials.validate()?;
        self.tenants.validate()?;
        self.limits.validate()?;

        if self.server.admin_key.is_none() {
            tracing::warn!(
                "server.admin_key is not configured; the /admin/reload endpoint is disabled \
                 and policy changes require a restart"
            );
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(toml::de::Error),

    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Expand `${VAR_NAME}` references against the process environment.
///
/// Unset variables are an error rather than an empty substitution, so a
/// missing secret fails loudly at startup instead of producing a credential
/// table with empty keys. References at or after a `#` on a line are left
/// alone, so comments may mention the syntax without requiring the variable
/// to exist.
fn expand_env_vars(contents: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(contents.len());
    let mut chars = contents.chars().peekable();
    let mut in_comment = false;

    while let Some(c) = chars.next() {
        match c {
            '#' => in_comment = true,
            '\n' => in_comment = false,
            _ => {}
        }
        if in_comment || c != '$' || !matches!(chars.peek(), Some('{')) {
            result.push(c);
            continue;
        }
        chars.next(); // consume '{'

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }

        if !closed {
            return Err(ConfigError::Validation(format!(
                "Unterminated environment variable reference: ${{{}",
                name
            )));
        }

        let value = std::env::var(&name).map_err(|_| ConfigError::MissingEnvVar(name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
