//! 统一错误处理
//!
//! 同步引擎的应用级错误类型：
//! - [`SyncError`] - 错误枚举（校验 / 平台 API / 限流 / 熔断 / 编排）
//! - [`SyncResult`] - Result 别名
//!
//! # 错误分类
//!
//! | 分类 | 可重试 | 说明 |
//! |------|--------|------|
//! | Validation | 否 | 订单数据不合法，按条目记录 |
//! | PlatformApi | 5xx 或显式标记 | 平台 HTTP/API 失败 |
//! | RateLimited | 经重排队 | 触发滑动窗口限流 |
//! | CircuitOpen | 否 | 熔断器打开，快速失败 |
//! | Sync | 是 | 编排层包装错误 |

use serde::Serialize;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // ========== 数据错误（不重试） ==========
    #[error("Validation failed: {0}")]
    /// 订单/条目校验失败
    Validation(String),

    // ========== 平台错误 ==========
    #[error("Platform API error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    /// 平台 HTTP/API 失败
    PlatformApi {
        /// HTTP status, if the failure came from a response
        status: Option<u16>,
        message: String,
        /// Explicit retryable flag; 5xx defaults to true
        retryable: bool,
        /// Server-provided backoff hint, seconds
        retry_after_secs: Option<u64>,
    },

    #[error("Rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    /// 滑动窗口限流，重排队后延迟重试
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Circuit open until {next_attempt_at}")]
    /// 熔断器打开，未发起网络请求
    CircuitOpen {
        /// Unix millis of the next half-open probe
        next_attempt_at: i64,
    },

    // ========== 编排错误 ==========
    #[error("Sync error: {0}")]
    /// 编排层包装错误
    Sync(String),

    #[error("Store error: {0}")]
    /// 订单/任务存储失败
    Store(String),

    #[error("Configuration error: {0}")]
    /// 缺失配置或凭证
    Config(String),

    // ========== 传输/编码 ==========
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result 别名
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Whether the default retry policy should retry this error.
    ///
    /// Validation and circuit-open never retry; rate limits are owned by
    /// the request queue, not the retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Validation(_) => false,
            SyncError::PlatformApi { retryable, .. } => *retryable,
            SyncError::RateLimited { .. } => false,
            SyncError::CircuitOpen { .. } => false,
            SyncError::Sync(_) => true,
            SyncError::Store(_) => false,
            SyncError::Config(_) => false,
            SyncError::Http(e) => e.is_timeout() || e.is_connect(),
            SyncError::Serialization(_) => false,
        }
    }

    /// Whether this error is an expected application-level rejection that
    /// must not count toward the circuit-breaker failure threshold.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_) | SyncError::RateLimited { .. } | SyncError::CircuitOpen { .. }
        )
    }

    /// 错误阶段标签，用于 SyncReport 结构化错误
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::PlatformApi { .. } => "platform_api",
            SyncError::RateLimited { .. } => "rate_limit",
            SyncError::CircuitOpen { .. } => "circuit_open",
            SyncError::Sync(_) => "sync",
            SyncError::Store(_) => "store",
            SyncError::Config(_) => "config",
            SyncError::Http(_) => "http",
            SyncError::Serialization(_) => "serialization",
        }
    }
}

// ========== Helper Constructors ==========

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Platform failure from an HTTP status; ≥500 is retryable
    pub fn platform_status(status: u16, message: impl Into<String>) -> Self {
        Self::PlatformApi {
            status: Some(status),
            message: message.into(),
            retryable: status >= 500,
            retry_after_secs: None,
        }
    }

    /// Platform failure without an HTTP status (API-level error body)
    pub fn platform(message: impl Into<String>, retryable: bool) -> Self {
        Self::PlatformApi {
            status: None,
            message: message.into(),
            retryable,
            retry_after_secs: None,
        }
    }
}

/// One captured per-item failure inside a sync batch
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncErrorDetail {
    /// Platform order the failure belongs to, when known
    pub platform_order_id: Option<String>,
    /// Pipeline stage that failed (validation / platform_api / store / ...)
    pub stage: String,
    pub message: String,
}

impl SyncErrorDetail {
    pub fn from_error(platform_order_id: Option<String>, err: &SyncError) -> Self {
        Self {
            platform_order_id,
            stage: err.stage().to_string(),
            message: err.to_string(),
        }
    }
}
