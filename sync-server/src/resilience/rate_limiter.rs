//! Sliding-window rate limiter
//!
//! Per-key admission control for outbound platform calls. Each key (shop
//! or global) tracks request timestamps inside a trailing window; a call
//! is rejected when the window is full, with a hint for when the oldest
//! slot frees up.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::utils::{SyncError, SyncResult};

/// Window tuning
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Max requests per key inside the window
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Per-key sliding windows
pub struct RateLimiter {
    windows: DashMap<String, Mutex<VecDeque<Instant>>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Try to admit one request for `key`.
    ///
    /// On success the request is recorded. On rejection returns
    /// [`SyncError::RateLimited`] with the seconds until a slot frees.
    pub fn try_acquire(&self, key: &str) -> SyncResult<()> {
        let now = Instant::now();
        let entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut window = entry.lock().unwrap_or_else(|e| e.into_inner());

        // Drop timestamps that slid out of the window
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= self.config.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.config.max_requests as usize {
            let retry_after = window
                .front()
                .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.config.window);
            return Err(SyncError::RateLimited {
                retry_after_secs: Some(retry_after.as_secs().max(1)),
            });
        }

        window.push_back(now);
        Ok(())
    }

    /// Requests currently recorded for `key`
    pub fn current_usage(&self, key: &str) -> usize {
        self.windows
            .get(key)
            .map(|w| w.lock().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_up_to_max() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
        });

        for _ in 0..3 {
            limiter.try_acquire("shop-1").unwrap();
        }
        let err = limiter.try_acquire("shop-1").unwrap_err();
        assert!(matches!(err, SyncError::RateLimited { .. }));
        assert_eq!(limiter.current_usage("shop-1"), 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
        });

        limiter.try_acquire("shop-a").unwrap();
        assert!(limiter.try_acquire("shop-a").is_err());
        limiter.try_acquire("shop-b").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 2,
            window: Duration::from_secs(60),
        });

        limiter.try_acquire("k").unwrap();
        limiter.try_acquire("k").unwrap();
        assert!(limiter.try_acquire("k").is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.try_acquire("k").unwrap();
        assert_eq!(limiter.current_usage("k"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
        });

        limiter.try_acquire("k").unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        match limiter.try_acquire("k") {
            Err(SyncError::RateLimited {
                retry_after_secs: Some(secs),
            }) => assert_eq!(secs, 40),
            other => panic!("expected RateLimited with hint, got {other:?}"),
        }
    }
}
