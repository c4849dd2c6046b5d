//! Per-client sliding-window admission
//!
//! Each key owns an ordered queue of admission timestamps behind its own
//! mutex; the surrounding `DashMap` only shards key lookup.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use warden_core::constants::DEFAULT_RATE_LIMIT_RPS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub capacity: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    /// `rps` requests per one-second window
    #[must_use]
    pub fn per_second(rps: usize) -> Self {
        Self {
            capacity: rps,
            window: Duration::from_secs(1),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_second(DEFAULT_RATE_LIMIT_RPS)
    }
}

#[derive(Debug, Default)]
struct SlidingWindow {
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Mutex<SlidingWindow>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit and record a request for `key`, or deny without recording
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock reading
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let entry = match self.windows.get(key) {
            Some(existing) => existing,
            None => self
                .windows
                .entry(key.to_string())
                .or_insert_with(|| Mutex::new(SlidingWindow::default()))
                .downgrade(),
        };

        let mut window = entry.lock();
        window.prune(now, self.config.window);

        if window.admitted.len() < self.config.capacity {
            window.admitted.push_back(now);
            true
        } else {
            tracing::debug!(key, capacity = self.config.capacity, "rate limit exceeded");
            false
        }
    }

    /// Drop keys with no admissions left in their window
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    pub fn prune_idle_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows.retain(|_, slot| {
            let mut slot = slot.lock();
            slot.prune(now, window);
            !slot.admitted.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::trace!(removed, "pruned idle rate-limit windows");
        }
        removed
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
