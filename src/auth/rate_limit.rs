use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::minutes(1),
            max_requests: 10, // login attempts per window
        }
    }
}

/// Attempt times for one caller, oldest first.
#[derive(Debug, Default)]
struct RequestWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl RequestWindow {
    fn expire(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
    }
}

/// Sliding-window limiter keyed by caller (client address for login).
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn check_rate_limit(&self, key: &str) -> bool {
        let mut windows = self.windows.write().await;

        let window = windows.entry(key.to_string()).or_default();
        window.expire(self.config.window_size);

        if window.timestamps.len() < self.config.max_requests as usize {
            window.timestamps.push_back(Utc::now());
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) -> usize {
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| {
            window.expire(self.config.window_size);
            !window.timestamps.is_empty()
        });
        windows.len()
    }
}
