// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter backed by a shared counter store.
//!
//! Each identifier gets a counter with a time-to-live equal to the window
//! length; the counter is created on the first request of a window and
//! reclaimed by the store's expiry, never deleted here. Fixed windows admit
//! bursts of up to twice the nominal limit across a window boundary; that is
//! the chosen trade-off, not a bug.
//!
//! When the store is unreachable the limiter fails open: enforcement is
//! disabled rather than rejecting all traffic, and the degraded state is
//! visible through [`RateLimiter::status`].

use crate::config::RateLimitConfig;
use crate::store::{CounterStore, StoreError, StoreHealth};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is admitted
    Allowed {
        /// Remaining requests in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
    },
    /// Request is rejected
    Limited {
        /// Time until the window expires and requests are admitted again
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Read-only view of an identifier's current budget. Computed on demand,
/// never persisted.
#[derive(Debug, Clone, Copy)]
pub struct UsageSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

const HEALTH_AVAILABLE: u8 = 0;
const HEALTH_DEGRADED: u8 = 1;
const HEALTH_UNAVAILABLE: u8 = 2;

/// Fixed-window rate limiter. Holds no per-request state of its own; all
/// mutable state lives in the counter store.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    health: AtomicU8,
}

impl RateLimiter {
    /// Create a limiter over an already-probed store.
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            config,
            store,
            health: AtomicU8::new(HEALTH_AVAILABLE),
        }
    }

    /// Create a limiter, probing the store once. A failed probe starts the
    /// limiter in Unavailable (fail-open) rather than erroring out.
    pub async fn connect(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        let limiter = Self::new(config, store);
        match limiter.bounded(limiter.store.ping()).await {
            Ok(()) => {}
            Err(err) => {
                warn!(error = %err, "Counter store unreachable, rate limiting disabled");
                limiter.health.store(HEALTH_UNAVAILABLE, Ordering::Relaxed);
            }
        }
        limiter
    }

    /// Current store health as seen by the limiter.
    pub fn status(&self) -> StoreHealth {
        match self.health.load(Ordering::Relaxed) {
            HEALTH_AVAILABLE => StoreHealth::Available,
            HEALTH_DEGRADED => StoreHealth::Degraded,
            _ => StoreHealth::Unavailable,
        }
    }

    /// True when checks currently enforce the limit.
    pub fn enforcing(&self) -> bool {
        self.config.enabled && self.status() == StoreHealth::Available
    }

    fn key(identifier: &str) -> String {
        format!("rate_limit:{identifier}")
    }

    /// Run a store operation under the configured timeout.
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.store_timeout(), op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    fn fail_open(&self, err: &StoreError) -> RateLimitResult {
        warn!(error = %err, "Counter store error, admitting request (fail-open)");
        if self.health.load(Ordering::Relaxed) == HEALTH_AVAILABLE {
            self.health.store(HEALTH_DEGRADED, Ordering::Relaxed);
        }
        RateLimitResult::Allowed {
            remaining: self.config.max_requests,
            reset_in: self.config.window_duration(),
        }
    }

    /// Check whether a request from `identifier` is admitted, counting it
    /// if so. Rejected requests are not counted.
    pub async fn check(&self, identifier: &str) -> RateLimitResult {
        if !self.config.enabled || self.status() == StoreHealth::Unavailable {
            return RateLimitResult::Allowed {
                remaining: self.config.max_requests,
                reset_in: self.config.window_duration(),
            };
        }

        let key = Self::key(identifier);
        let window = self.config.window_duration();
        let limit = self.config.max_requests;

        let current = match self.bounded(self.store.get(&key)).await {
            Ok(current) => current,
            Err(err) => return self.fail_open(&err),
        };

        match current {
            None => {
                // First request of a new window
                if let Err(err) = self.bounded(self.store.set_ex(&key, 1, window)).await {
                    return self.fail_open(&err);
                }
                self.health.store(HEALTH_AVAILABLE, Ordering::Relaxed);
                debug!(identifier, remaining = limit.saturating_sub(1), "New rate window");
                RateLimitResult::Allowed {
                    remaining: limit.saturating_sub(1),
                    reset_in: window,
                }
            }
            Some(count) if count >= u64::from(limit) => {
                let retry_after = match self.bounded(self.store.ttl(&key)).await {
                    Ok(ttl) => ttl.unwrap_or(window),
                    Err(err) => return self.fail_open(&err),
                };
                debug!(identifier, count, ?retry_after, "Rate limit exceeded");
                RateLimitResult::Limited { retry_after }
            }
            Some(_) => {
                let count = match self.bounded(self.store.incr(&key)).await {
                    Ok(count) => count,
                    Err(err) => return self.fail_open(&err),
                };
                self.health.store(HEALTH_AVAILABLE, Ordering::Relaxed);
                let reset_in = match self.bounded(self.store.ttl(&key)).await {
                    Ok(ttl) => ttl.unwrap_or(window),
                    Err(err) => return self.fail_open(&err),
                };
                // The increment is the atomic arbiter: concurrent checks
                // that raced past the read are caught here, so admits
                // within an established window never exceed the limit.
                if count > u64::from(limit) {
                    debug!(identifier, count, "Rate limit exceeded (increment race)");
                    return RateLimitResult::Limited { retry_after: reset_in };
                }
                let remaining = u64::from(limit).saturating_sub(count) as u32;
                debug!(identifier, count, remaining, "Request counted");
                RateLimitResult::Allowed { remaining, reset_in }
            }
        }
    }

    /// Current usage for an identifier. Never mutates state; an identifier
    /// with no counter reports a full budget.
    pub async fn usage(&self, identifier: &str) -> UsageSnapshot {
        let limit = self.config.max_requests;
        let full = UsageSnapshot {
            limit,
            remaining: limit,
            reset_secs: 0,
        };

        if !self.config.enabled || self.status() == StoreHealth::Unavailable {
            return full;
        }

        let key = Self::key(identifier);
        let count = match self.bounded(self.store.get(&key)).await {
            Ok(count) => count,
            Err(_) => return full,
        };
        let ttl = match self.bounded(self.store.ttl(&key)).await {
            Ok(ttl) => ttl,
            Err(_) => return full,
        };

        match count {
            None => UsageSnapshot {
                limit,
                remaining: limit,
                reset_secs: self.config.window_secs,
            },
            Some(count) => UsageSnapshot {
                limit,
                remaining: u64::from(limit).saturating_sub(count) as u32,
                reset_secs: ttl.unwrap_or(self.config.window_duration()).as_secs(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCounterStore;
    use async_trait::async_trait;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        let config = RateLimitConfig {
            max_requests,
            window_secs,
            ..Default::default()
        };
        RateLimiter::new(config, Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_admits_up_to_limit_then_rejects() {
        let limiter = limiter(2, 60);

        match limiter.check("ip:1.2.3.4").await {
            RateLimitResult::Allowed { remaining, .. } => assert_eq!(remaining, 1),
            RateLimitResult::Limited { .. } => panic!("first request should be admitted"),
        }
        assert!(limiter.check("ip:1.2.3.4").await.is_allowed());

        match limiter.check("ip:1.2.3.4").await {
            RateLimitResult::Limited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(60));
            }
            RateLimitResult::Allowed { .. } => panic!("third request should be rejected"),
        }
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("ip:10.0.0.1").await.is_allowed());
        assert!(!limiter.check("ip:10.0.0.1").await.is_allowed());
        assert!(limiter.check("ip:10.0.0.2").await.is_allowed());
        assert!(limiter.check("user:alice").await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_expiry_resets_counter() {
        let config = RateLimitConfig {
            max_requests: 1,
            window_secs: 1,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(MemoryCounterStore::new()));

        assert!(limiter.check("ip:1.1.1.1").await.is_allowed());
        assert!(!limiter.check("ip:1.1.1.1").await.is_allowed());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        // New window, counter starts over
        match limiter.check("ip:1.1.1.1").await {
            RateLimitResult::Allowed { remaining, .. } => assert_eq!(remaining, 0),
            RateLimitResult::Limited { .. } => panic!("new window should admit"),
        }
    }

    #[tokio::test]
    async fn test_usage_is_read_only() {
        let limiter = limiter(5, 60);
        let usage = limiter.usage("ip:2.2.2.2").await;
        assert_eq!(usage.remaining, 5);

        limiter.check("ip:2.2.2.2").await;
        let usage = limiter.usage("ip:2.2.2.2").await;
        assert_eq!(usage.remaining, 4);
        assert!(usage.reset_secs <= 60);

        // Reading again does not consume budget
        let usage = limiter.usage("ip:2.2.2.2").await;
        assert_eq!(usage.remaining, 4);
    }

    #[tokio::test]
    async fn test_rejection_does_not_increment() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("ip:3.3.3.3").await.is_allowed());
        for _ in 0..5 {
            assert!(!limiter.check("ip:3.3.3.3").await.is_allowed());
        }
        let usage = limiter.usage("ip:3.3.3.3").await;
        assert_eq!(usage.remaining, 0);
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let config = RateLimitConfig {
            enabled: false,
            max_requests: 1,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(MemoryCounterStore::new()));
        for _ in 0..10 {
            assert!(limiter.check("ip:4.4.4.4").await.is_allowed());
        }
        assert!(!limiter.enforcing());
    }

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn set_ex(
            &self,
            _key: &str,
            _value: u64,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn incr(&self, _key: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unreachable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_fail_open_on_store_error() {
        let config = RateLimitConfig {
            max_requests: 1,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config, Arc::new(BrokenStore));

        for _ in 0..10 {
            assert!(limiter.check("ip:5.5.5.5").await.is_allowed());
        }
        assert_eq!(limiter.status(), StoreHealth::Degraded);
        assert!(!limiter.enforcing());
    }

    #[tokio::test]
    async fn test_connect_probe_failure_starts_unavailable() {
        let config = RateLimitConfig::default();
        let limiter = RateLimiter::connect(config, Arc::new(BrokenStore)).await;
        assert_eq!(limiter.status(), StoreHealth::Unavailable);
        assert!(limiter.check("ip:6.6.6.6").await.is_allowed());
    }

    #[tokio::test]
    async fn test_concurrent_checks_bounded_overshoot() {
        let limiter = Arc::new(limiter(10, 60));

        // Establish the window, then hammer it concurrently.
        assert!(limiter.check("ip:7.7.7.7").await.is_allowed());

        let mut handles = Vec::new();
        for _ in 0..40 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(
                async move { limiter.check("ip:7.7.7.7").await },
            ));
        }
        let mut admitted = 1;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                admitted += 1;
            }
        }
        // The store-side atomic increment bounds the race to at most one
        // extra admit per window.
        assert!(admitted <= 11, "admitted {admitted} of 41 with limit 10");
    }
}
