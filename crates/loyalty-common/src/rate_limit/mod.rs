//! Keyed request throttling
//!
//! Services depend on the [`KeyedRateLimiter`] trait so the limiter can be
//! swapped or reset between test cases instead of living in process-global
//! state.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

/// Checks between sweeps of keys whose buckets have refilled
const DEFAULT_PRUNE_INTERVAL: u64 = 1024;

/// Per-key admission control
pub trait KeyedRateLimiter: Send + Sync {
    /// Returns `true` if a request for `key` may proceed now
    fn check(&self, key: &str) -> bool;

    /// Forget all recorded requests
    fn reset(&self);
}

/// Token-bucket limiter backed by `governor`
pub struct GovernorRateLimiter {
    quota: Quota,
    inner: RwLock<DefaultKeyedRateLimiter<String>>,
    checks: AtomicU64,
    prune_interval: u64,
}

impl GovernorRateLimiter {
    /// Bucket that refills `per_minute` tokens every minute, with a burst of the same size
    #[must_use]
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_minute(per_minute))
    }

    #[must_use]
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            quota,
            inner: RwLock::new(RateLimiter::keyed(quota)),
            checks: AtomicU64::new(0),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    /// Sweep idle keys every `checks` calls to [`KeyedRateLimiter::check`]
    #[must_use]
    pub fn with_prune_interval(mut self, checks: u64) -> Self {
        self.prune_interval = checks.max(1);
        self
    }

    /// Drop state for keys whose buckets are full again
    pub fn prune(&self) {
        let inner = self.inner.read();
        inner.retain_recent();
        inner.shrink_to_fit();
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.inner.read().len()
    }
}

impl KeyedRateLimiter for GovernorRateLimiter {
    fn check(&self, key: &str) -> bool {
        let allowed = self.inner.read().check_key(&key.to_string()).is_ok();
        if !allowed {
            tracing::debug!(key, "rate limit hit");
        }
        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks % self.prune_interval == 0 {
            self.prune();
        }
        allowed
    }

    fn reset(&self) {
        *self.inner.write() = RateLimiter::keyed(self.quota);
    }
}

impl std::fmt::Debug for GovernorRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernorRateLimiter")
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_per_minute() -> GovernorRateLimiter {
        GovernorRateLimiter::per_minute(NonZeroU32::MIN)
    }

    #[test]
    fn test_second_request_rejected() {
        let limiter = one_per_minute();
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = one_per_minute();
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_reset_clears_state() {
        let limiter = one_per_minute();
        assert!(limiter.check("10.0.0.1"));
        limiter.reset();
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_idle_keys_swept_during_checks() {
        let quota = Quota::with_period(std::time::Duration::from_millis(1))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        let limiter = GovernorRateLimiter::with_quota(quota).with_prune_interval(8);

        for i in 0..7 {
            assert!(limiter.check(&format!("10.0.0.{i}")));
        }
        assert_eq!(limiter.tracked_keys(), 7);

        std::thread::sleep(std::time::Duration::from_millis(20));
        limiter.check("10.0.1.1");
        assert!(limiter.tracked_keys() <= 1);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let limiter: Box<dyn KeyedRateLimiter> = Box::new(one_per_minute());
        assert!(limiter.check("k"));
    }
}
