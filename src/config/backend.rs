use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration for the internal backend the gateway fronts.
///
/// The backend is reachable only from inside the private network; callers
/// never talk to it directly and never see its credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the internal management API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Credential sent to the backend as `X-Internal-API-Key`.
    ///
    /// Distinct from any caller credential; typically injected via
    /// `${BACKEND_API_KEY}`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds, covering the full response.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Retry idempotent (GET/HEAD) requests once on transient network
    /// failure. Non-idempotent requests are never retried.
    #[serde(default = "default_retry_idempotent")]
    pub retry_idempotent: bool,
}

impl BackendConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("backend.base_url is not a valid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "backend.base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_idempotent: default_retry_idempotent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_retry_idempotent() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_valid() {
        BackendConfig::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = BackendConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let config = BackendConfig {
            base_url: "ftp://internal:21".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BackendConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
