//! Per-key FIFO request queue
//!
//! Serializes outbound calls per key while letting other keys proceed
//! concurrently. A rate-limited request keeps its place at the head of
//! its key's queue and the queue sleeps before retrying, so head-of-line
//! blocking is bounded to the one limited key.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::rate_limiter::RateLimiter;
use crate::utils::{SyncError, SyncResult};

/// Queue tuning
#[derive(Debug, Clone)]
pub struct RequestQueueConfig {
    /// Sleep before retrying a rate-limited request
    pub rate_limit_delay: Duration,
    /// Max retries for a platform-side 429 before propagating
    pub max_rate_limit_retries: u32,
}

impl Default for RequestQueueConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay: Duration::from_secs(2),
            max_rate_limit_retries: 3,
        }
    }
}

pub struct RequestQueue {
    limiter: Arc<RateLimiter>,
    // tokio Mutex wakes waiters in FIFO order, which preserves per-key ordering
    lanes: DashMap<String, Arc<Mutex<()>>>,
    config: RequestQueueConfig,
}

impl RequestQueue {
    pub fn new(limiter: Arc<RateLimiter>, config: RequestQueueConfig) -> Self {
        Self {
            limiter,
            lanes: DashMap::new(),
            config,
        }
    }

    fn lane(&self, key: &str) -> Arc<Mutex<()>> {
        self.lanes
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `op` for `key`: wait for the key's lane, pass the sliding-window
    /// limiter, then execute. A platform 429 sleeps and re-runs `op` while
    /// still holding the lane (stays at the front of the queue).
    pub async fn execute<T, F, Fut>(&self, key: &str, op: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let lane = self.lane(key);
        let _guard = lane.lock().await;

        // Admission: holding the lane while waiting keeps FIFO order
        loop {
            match self.limiter.try_acquire(key) {
                Ok(()) => break,
                Err(SyncError::RateLimited { retry_after_secs }) => {
                    let delay = retry_after_secs
                        .map(Duration::from_secs)
                        .unwrap_or(self.config.rate_limit_delay)
                        .max(self.config.rate_limit_delay);
                    tracing::debug!(key, delay_secs = delay.as_secs(), "Rate limit window full, queue sleeping");
                    tokio::time::sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
        }

        // Platform-side 429s retry in place, bounded
        let mut rate_limit_retries = 0;
        loop {
            match op().await {
                Err(SyncError::RateLimited { retry_after_secs })
                    if rate_limit_retries < self.config.max_rate_limit_retries =>
                {
                    rate_limit_retries += 1;
                    let delay = retry_after_secs
                        .map(Duration::from_secs)
                        .unwrap_or(self.config.rate_limit_delay);
                    tracing::warn!(
                        key,
                        retry = rate_limit_retries,
                        delay_secs = delay.as_secs(),
                        "Platform rate limit hit, retrying at queue head"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}
