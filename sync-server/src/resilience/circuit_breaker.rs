//! Circuit breaker for failing platform dependencies
//!
//! Per-target failure-threshold state machine. While open, calls fail fast
//! with [`SyncError::CircuitOpen`] and no network attempt is made. Expected
//! application-level rejections (validation, rate limits) never count
//! toward the threshold.
//!
//! # State transitions
//!
//! - closed → open: consecutive failures since last success ≥ threshold
//! - open → half-open: now ≥ next_attempt_at
//! - half-open → closed: 3 consecutive successes
//! - half-open → open: any failure, immediately

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::utils::{SyncError, SyncResult};

/// Breaker tuning for one registry
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before tripping open
    pub failure_threshold: u32,
    /// How long to stay open before probing, millis
    pub recovery_timeout_ms: i64,
    /// Consecutive half-open successes required to close
    pub half_open_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            half_open_successes: 3,
        }
    }
}

/// Breaker state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<i64>,
    next_attempt_at: Option<i64>,
}

/// Observability snapshot of one breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<i64>,
    pub next_attempt_at: Option<i64>,
}

/// Per-target circuit breaker
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    /// Errors matching this predicate do not count toward the threshold
    expected: fn(&SyncError) -> bool,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                next_attempt_at: None,
            }),
            expected: SyncError::is_expected,
        }
    }

    /// Override the expected-error allow-list predicate
    pub fn with_expected(mut self, expected: fn(&SyncError) -> bool) -> Self {
        self.expected = expected;
        self
    }

    /// Run `op` through the breaker.
    ///
    /// Fails fast with `CircuitOpen` while open; otherwise runs the future
    /// and records the outcome.
    pub async fn call<T, F>(&self, op: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        self.before_call()?;
        match op.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                if !(self.expected)(&err) {
                    self.on_failure();
                }
                Err(err)
            }
        }
    }

    /// Admission check; open → half-open when the recovery timeout elapsed
    fn before_call(&self) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state == CircuitState::Open {
            let next_attempt_at = inner.next_attempt_at.unwrap_or(0);
            if shared::util::now_millis() >= next_attempt_at {
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
                tracing::info!(breaker = %self.key, "Circuit breaker half-open, probing");
            } else {
                return Err(SyncError::CircuitOpen { next_attempt_at });
            }
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_successes {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.next_attempt_at = None;
                    tracing::info!(breaker = %self.key, "Circuit breaker closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = shared::util::now_millis();
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.next_attempt_at = Some(now + self.config.recovery_timeout_ms);
                    tracing::warn!(
                        breaker = %self.key,
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // One failure while probing re-opens immediately
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.next_attempt_at = Some(now + self.config.recovery_timeout_ms);
                tracing::warn!(breaker = %self.key, "Circuit breaker re-opened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        BreakerSnapshot {
            key: self.key.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            next_attempt_at: inner.next_attempt_at,
        }
    }
}

/// Per-key breaker arena
///
/// All transitions for one key go through that key's single mutex.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config.clone())))
            .clone()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.iter().map(|e| e.value().snapshot()).collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
