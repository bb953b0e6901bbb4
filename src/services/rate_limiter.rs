//! Rate limiter for login attempts
//!
//! Counts failed logins per email inside a sliding window. Once the limit is
//! reached, further attempts are refused until the oldest failure ages out
//! or a login succeeds.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased email
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.max_login_attempts,
            Duration::minutes(config.lockout_minutes),
        )
    }

    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let Some(times) = attempts.get_mut(&email.to_lowercase()) else {
            return false;
        };
        times.retain(|time| *time > cutoff);
        times.len() >= self.max_attempts
    }

    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures for `email` (on successful login)
    pub async fn clear(&self, email: &str) {
        self.attempts.write().await.remove(&email.to_lowercase());
    }

    /// Drop entries whose failures have all aged out; returns how many remain
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
        attempts.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}
