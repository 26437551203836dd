//! Fixed-window rate limiting keyed by (principal, tenant).
//!
//! Counters live in a concurrent map with per-key atomic check-and-increment
//! under the entry guard — there is no global lock, so tenants do not
//! contend with each other. Windows are reset lazily on access rather than
//! by a background sweep, and idle keys are evicted on access once the map
//! grows past its configured bound.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::{LimitsConfig, RateLimitSettings};

/// Identifies one counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateKey {
    principal: String,
    tenant: String,
}

/// Mutable window state for one key. Only touched while holding the map's
/// entry guard.
struct WindowSlot {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

/// Remaining budget after an accepted request, surfaced as
/// `X-RateLimit-*` response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateQuota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

/// A rejected request, with the time remaining in the current window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after_secs: u64,
}

/// Per-(principal, tenant) fixed-window limiter.
pub struct RateLimiter {
    slots: DashMap<RateKey, WindowSlot>,
    idle_after: Duration,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            slots: DashMap::new(),
            idle_after: Duration::from_secs(limits.idle_eviction_secs),
            max_keys: limits.max_tracked_keys,
        }
    }

    /// Check the (principal, tenant) budget and consume one request from it.
    ///
    /// The check and the increment happen under the entry guard as a single
    /// operation; two concurrent requests for the same key cannot both
    /// observe the last free slot.
    pub fn check_and_consume(
        &self,
        principal_id: &str,
        tenant_id: &str,
        settings: RateLimitSettings,
    ) -> Result<RateQuota, RateLimitExceeded> {
        // Evict before taking the entry guard; retain() and an outstanding
        // guard on the same shard would deadlock.
        self.maybe_evict();

        let key = RateKey {
            principal: principal_id.to_string(),
            tenant: tenant_id.to_string(),
        };
        let window = Duration::from_secs(settings.window_secs);
        let now = Instant::now();

        let mut slot = self.slots.entry(key).or_insert_with(|| WindowSlot {
            window_start: now,
            count: 0,
            last_seen: now,
        });

        // Lazy reset once the window has elapsed.
        if now.duration_since(slot.window_start) >= window {
            slot.window_start = now;
            slot.count = 0;
        }
        slot.last_seen = now;

        let elapsed = now.duration_since(slot.window_start);
        let reset_secs = remaining_secs(window, elapsed);

        if slot.count >= settings.max_requests {
            return Err(RateLimitExceeded {
                limit: settings.max_requests,
                retry_after_secs: reset_secs,
            });
        }

        slot.count += 1;
        Ok(RateQuota {
            limit: settings.max_requests,
            remaining: settings.max_requests - slot.count,
            reset_secs,
        })
    }

    /// Drop idle counters once the map is at capacity. An evicted key that
    /// comes back simply starts a fresh window.
    fn maybe_evict(&self) {
        if self.slots.len() < self.max_keys {
            return;
        }
        let idle_after = self.idle_after;
        self.slots
            .retain(|_, slot| slot.last_seen.elapsed() < idle_after);
        if self.slots.len() >= self.max_keys {
            tracing::warn!(
                tracked_keys = self.slots.len(),
                max_keys = self.max_keys,
                "Rate limiter at capacity with no idle keys to evict"
            );
        }
    }

    /// Number of tracked counters (for tests and diagnostics).
    pub fn tracked_keys(&self) -> usize {
        self.slots.len()
    }
}

/// Seconds until the window resets, rounded up and never zero: a 429 must
/// always carry a positive `Retry-After`.
fn remaining_secs(window: Duration, elapsed: Duration) -> u64 {
    let remaining = window.saturating_sub(elapsed);
    remaining.as_secs().max(1).min(window.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(&LimitsConfig::default())
    }

    fn settings(max_requests: u32, window_secs: u64) -> RateLimitSettings {
        RateLimitSettings {
            max_requests,
            window_secs,
        }
    }

    #[test]
    fn test_threshold_plus_one_is_denied() {
        let rl = limiter();
        let s = settings(3, 60);
        for _ in 0..3 {
            rl.check_and_consume("alice", "acme", s).unwrap();
        }
        let err = rl.check_and_consume("alice", "acme", s).unwrap_err();
        assert_eq!(err.limit, 3);
        assert!(err.retry_after_secs > 0);
        assert!(err.retry_after_secs <= 60);
    }

    #[test]
    fn test_remaining_counts_down() {
        let rl = limiter();
        let s = settings(2, 60);
        assert_eq!(rl.check_and_consume("alice", "acme", s).unwrap().remaining, 1);
        assert_eq!(rl.check_and_consume("alice", "acme", s).unwrap().remaining, 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let rl = limiter();
        let s = settings(1, 60);
        rl.check_and_consume("alice", "acme", s).unwrap();
        // Same principal, different tenant: separate budget.
        rl.check_and_consume("alice", "globex", s).unwrap();
        // Different principal, same tenant: separate budget.
        rl.check_and_consume("bob", "acme", s).unwrap();
        assert!(rl.check_and_consume("alice", "acme", s).is_err());
    }

    #[test]
    fn test_window_resets_lazily() {
        let rl = limiter();
        let s = settings(1, 1);
        rl.check_and_consume("alice", "acme", s).unwrap();
        assert!(rl.check_and_consume("alice", "acme", s).is_err());
        std::thread::sleep(Duration::from_millis(1100));
        // No background sweep ran; the next access resets the window.
        assert!(rl.check_and_consume("alice", "acme", s).is_ok());
    }

    #[test]
    fn test_denied_requests_do_not_consume() {
        let rl = limiter();
        let s = settings(1, 1);
        rl.check_and_consume("alice", "acme", s).unwrap();
        for _ in 0..5 {
            assert!(rl.check_and_consume("alice", "acme", s).is_err());
        }
        std::thread::sleep(Duration::from_millis(1100));
        // The rejected attempts above must not have pushed the window
        // forward or inflated the count.
        assert!(rl.check_and_consume("alice", "acme", s).is_ok());
    }

    #[test]
    fn test_idle_keys_evicted_at_capacity() {
        let limits = LimitsConfig {
            idle_eviction_secs: 0, // everything is immediately idle
            max_tracked_keys: 4,
            ..Default::default()
        };
        let rl = RateLimiter::new(&limits);
        let s = settings(10, 60);
        for i in 0..8 {
            rl.check_and_consume(&format!("p{}", i), "acme", s).unwrap();
        }
        // Eviction kept the map from growing without bound.
        assert!(rl.tracked_keys() <= 4);
    }

    #[test]
    fn test_concurrent_consumers_never_exceed_limit() {
        use std::sync::Arc;

        let rl = Arc::new(limiter());
        let s = settings(50, 60);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let rl = rl.clone();
            handles.push(std::thread::spawn(move || {
                let mut accepted = 0u32;
                for _ in 0..25 {
                    if rl.check_and_consume("alice", "acme", s).is_ok() {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
