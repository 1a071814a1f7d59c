//! Retry manager with exponential backoff
//!
//! Wraps any fallible async operation. Delay grows as
//! `base * multiplier^(attempt-1)`, capped at `max_delay_ms`, with up to
//! 25% additive jitter when enabled. The default predicate retries unless
//! the error reports itself non-retryable; on exhaustion the original
//! error is returned unmodified.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::utils::{SyncError, SyncResult};

/// Backoff tuning
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry executor
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute with the default retry predicate ([`SyncError::is_retryable`])
    pub async fn execute<F, Fut, T>(&self, operation: F) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        self.execute_with(operation, SyncError::is_retryable, |_, _, _| {})
            .await
    }

    /// Execute with a caller-supplied predicate and an `on_retry` hook.
    ///
    /// The hook fires before each backoff sleep with
    /// `(next_attempt, error, delay)`.
    pub async fn execute_with<F, Fut, T, P, H>(
        &self,
        operation: F,
        should_retry: P,
        on_retry: H,
    ) -> SyncResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
        P: Fn(&SyncError) -> bool,
        H: Fn(u32, &SyncError, Duration),
    {
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.config.max_attempts || !should_retry(&err) {
                        if attempt >= self.config.max_attempts {
                            warn!(
                                attempts = attempt,
                                max_attempts = self.config.max_attempts,
                                error = %err,
                                "Retries exhausted"
                            );
                        }
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after backoff"
                    );
                    on_retry(attempt + 1, &err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff before retrying after `attempt` (1-based) failed
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let base = self.config.base_delay_ms as f64 * self.config.backoff_multiplier.powi(exp as i32);
        let capped = base.min(self.config.max_delay_ms as f64);

        let with_jitter = if self.config.jitter {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };

        Duration::from_millis(with_jitter as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_delay_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let manager = RetryManager::new(no_delay_config());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result = manager
            .execute(|| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let manager = RetryManager::new(no_delay_config());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result = manager
            .execute(|| {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(SyncError::platform_status(503, "unavailable"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_original_error() {
        let manager = RetryManager::new(no_delay_config());
        let result: SyncResult<()> = manager
            .execute(|| async { Err(SyncError::platform_status(502, "bad gateway")) })
            .await;

        match result {
            Err(SyncError::PlatformApi { status, .. }) => assert_eq!(status, Some(502)),
            other => panic!("expected PlatformApi error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let manager = RetryManager::new(no_delay_config());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        let result: SyncResult<()> = manager
            .execute(|| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(SyncError::validation("malformed"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate_overrides_default() {
        let manager = RetryManager::new(no_delay_config());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();

        // Treat validation as retryable for this caller
        let result: SyncResult<()> = manager
            .execute_with(
                || {
                    let calls = calls_in.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(SyncError::validation("flaky upstream payload"))
                    }
                },
                |_| true,
                |_, _, _| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_on_retry_hook_fires_per_wait() {
        let manager = RetryManager::new(no_delay_config());
        let hook_calls = Arc::new(AtomicU32::new(0));
        let hook_in = hook_calls.clone();

        let _: SyncResult<()> = manager
            .execute_with(
                || async { Err(SyncError::platform_status(500, "x")) },
                SyncError::is_retryable,
                |_, _, _| {
                    hook_in.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        // 3 attempts → 2 waits
        assert_eq!(hook_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_monotone_and_capped() {
        let manager = RetryManager::new(RetryConfig {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(manager.delay_for_attempt(1), Duration::from_millis(1_000));
        assert_eq!(manager.delay_for_attempt(2), Duration::from_millis(2_000));
        assert_eq!(manager.delay_for_attempt(3), Duration::from_millis(4_000));

        let mut prev = Duration::ZERO;
        for attempt in 1..=10 {
            let d = manager.delay_for_attempt(attempt);
            assert!(d >= prev);
            assert!(d <= Duration::from_millis(30_000));
            prev = d;
        }
    }

    #[test]
    fn test_jitter_bounded_at_125_percent() {
        let manager = RetryManager::new(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        });

        for _ in 0..200 {
            let d = manager.delay_for_attempt(8); // capped branch
            assert!(d >= Duration::from_millis(30_000));
            assert!(d <= Duration::from_millis(37_500));
        }
    }
}
