//! Short-lived cache for rendered metrics
//!
//! Collecting metrics costs a few hundred milliseconds of sampling, so
//! dashboards polling several endpoints share one result per TTL.

use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use warden_core::Result;

pub const KEY_ALL: &str = "metrics:all";
pub const KEY_CPU: &str = "metrics:cpu";
pub const KEY_MEMORY: &str = "metrics:memory";
pub const KEY_DISK: &str = "metrics:disk";
pub const KEY_NETWORK: &str = "metrics:network";

pub const DEFAULT_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct MetricsCache {
    ttl: Duration,
    entries: DashMap<&'static str, Entry>,
}

impl MetricsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|e| now < e.expires_at)
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: &'static str, value: Value) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Cached value for `key`, or the result of `fill` (cached on success)
    pub async fn get_or_try_insert<F, Fut>(&self, key: &'static str, fill: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(hit) = self.get(key) {
            tracing::trace!(key, "metrics cache hit");
            return Ok(hit);
        }

        let value = fill().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| now < e.expires_at);
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
