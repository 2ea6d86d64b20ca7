//! Fixed-window rate limiter keyed by client IP

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Rate limiter entry
#[derive(Debug)]
struct RateLimiterEntry {
    /// Requests seen in the current window
    count: u32,
    window_start: Instant,
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key` and decide whether it may proceed
    pub async fn check(&self, key: &str) -> RateLimitStatus {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> RateLimitStatus {
        let mut entries = self.entries.lock().await;

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            count: 0,
            window_start: now,
        });

        // Window expired, start a new one
        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_requests {
            let retry_after = self
                .config
                .window
                .saturating_sub(now.duration_since(entry.window_start));
            debug!("Rate limit exceeded for {}", key);
            return RateLimitStatus::Limited { retry_after };
        }

        entry.count += 1;
        RateLimitStatus::Allowed {
            remaining: self.config.max_requests - entry.count,
        }
    }

    /// Drop entries whose window has passed
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.config.window);
        let removed = before - entries.len();

        if removed > 0 {
            info!("Pruned {} rate limiter entries", removed);
        }
        removed
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
