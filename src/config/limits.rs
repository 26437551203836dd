use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global rate-limit defaults and limiter sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Default per-(principal, tenant) rate limit, used for tenants without
    /// an override.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Counters idle for longer than this are eligible for eviction.
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    /// Soft cap on tracked (principal, tenant) counters. When reached,
    /// idle counters are evicted before new ones are admitted.
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

impl LimitsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate("limits.rate_limit")?;
        if self.max_tracked_keys == 0 {
            return Err(ConfigError::Validation(
                "limits.max_tracked_keys must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitSettings::default(),
            idle_eviction_secs: default_idle_eviction_secs(),
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

/// A fixed-window request budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Requests accepted per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl RateLimitSettings {
    pub(super) fn validate(&self, context: &str) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Validation(format!(
                "{}.max_requests must be greater than zero",
                context
            )));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "{}.window_secs must be greater than zero",
                context
            )));
        }
        Ok(())
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

fn default_idle_eviction_secs() -> u64 {
    900
}

fn default_max_tracked_keys() -> usize {
    10_000
}
