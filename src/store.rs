// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Counter store abstraction for the rate limiter.
//!
//! The limiter only needs four primitives: get, set-with-expiry, atomic
//! increment, and remaining ttl. Anything offering those satisfies the
//! contract; the built-in backend is an in-memory map with a reaper.
//! Increments happen under the store's own lock, never as a caller-side
//! read-modify-write, which bounds the over-admit race to one request.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Store failure, internal to the limiter. Never surfaced to clients;
/// it routes the limiter into fail-open instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unreachable: {0}")]
    Unreachable(String),

    #[error("counter store operation timed out")]
    Timeout,
}

/// Health of the counter store as observed by the limiter.
///
/// Degraded and Unavailable both route rate-limit decisions to "admit all".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    /// Store is answering normally
    Available,
    /// Store answered recently but the last operation failed
    Degraded,
    /// Store was never reachable
    Unavailable,
}

impl std::fmt::Display for StoreHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Minimal counter-store interface required by the rate limiter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Get the current value for a key, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Set a key to a value with an expiry.
    async fn set_ex(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically increment a key, returning the new value. A missing or
    /// expired key restarts at one with a short grace deadline; callers
    /// are expected to have created it with [`CounterStore::set_ex`]
    /// first.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Remaining time-to-live for a key, if present and not expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Liveness probe used at startup and for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Lifetime of an entry created by an increment that raced window expiry.
const RESEED_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory counter store with per-entry deadlines.
///
/// Expired entries are treated as absent on read and reclaimed by
/// [`MemoryCounterStore::cleanup`], which the binary drives on an interval.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: RwLock<HashMap<String, CounterEntry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Called periodically; the store stays correct
    /// without it since reads check deadlines, this just bounds memory.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.expired(now));
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.expired(now))
            .map(|entry| entry.count))
    }

    async fn set_ex(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CounterEntry {
                count: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.expired(now) => {
                entry.count += 1;
                Ok(entry.count)
            }
            _ => {
                // Missing or lapsed: restart from one under RESEED_GRACE
                // so the entry cannot outlive the race that created it;
                // the caller re-seeds via set_ex on the next window.
                entries.insert(
                    key.to_string(),
                    CounterEntry {
                        count: 1,
                        expires_at: now + RESEED_GRACE,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.expired(now))
            .map(|entry| entry.expires_at - now))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
