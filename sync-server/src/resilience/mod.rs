//! Resilience primitives for outbound platform calls
//!
//! Every adapter call goes through three layers: sliding-window rate
//! limiting (with per-key FIFO queuing), a per-target circuit breaker,
//! and exponential-backoff retry.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod request_queue;
pub mod retry;

pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use request_queue::{RequestQueue, RequestQueueConfig};
pub use retry::{RetryConfig, RetryManager};
