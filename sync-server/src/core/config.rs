//! 服务器配置 - 同步引擎的所有配置项
//!
//! # 环境变量
//!
//! 所有配置项都可以通过环境变量覆盖：
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | ENVIRONMENT | development | 运行环境 |
//! | LOG_DIR | (无) | 日志目录，设置后写入滚动文件 |
//! | SYNC_INTERVAL_SECS | 900 | 每个店铺的同步周期（秒） |
//! | MAX_CONCURRENT_SYNCS | 3 | 并发同步上限 |
//! | PULL_WINDOW_DAYS | 7 | 拉取窗口（天） |
//! | PUSH_WINDOW_HOURS | 24 | 推送窗口（小时） |
//! | BATCH_SIZE | 50 | 平台分页大小 |
//! | RATE_LIMIT_MAX_REQUESTS | 10 | 限流窗口内最大请求数 |
//! | RATE_LIMIT_WINDOW_SECS | 60 | 限流窗口（秒） |
//! | BREAKER_FAILURE_THRESHOLD | 5 | 熔断失败阈值 |
//! | BREAKER_RECOVERY_SECS | 60 | 熔断恢复时间（秒） |
//! | MAX_ERROR_RATE | 10.0 | 告警错误率阈值（%） |
//! | STORES_FILE | (无) | 店铺配置 JSON 文件 |
//! | CREDENTIALS_FILE | (无) | 店铺凭证 JSON 文件 |
//!
//! # 示例
//!
//! ```ignore
//! SYNC_INTERVAL_SECS=300 MAX_CONCURRENT_SYNCS=5 cargo run
//! ```

use std::str::FromStr;
use std::time::Duration;

use crate::monitor::MonitorThresholds;
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use crate::scheduler::SchedulerConfig;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// 同步引擎配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 日志目录（可选）
    pub log_dir: Option<String>,
    /// 日志级别
    pub log_level: String,

    // === 调度 ===
    pub sync_interval_secs: u64,
    pub max_concurrent_syncs: usize,
    pub startup_jitter_secs: u64,
    pub max_job_retries: u32,
    pub job_retry_delay_secs: u64,

    // === 同步窗口 ===
    pub pull_window_days: i64,
    pub push_window_hours: i64,
    pub batch_size: u32,

    // === 限流 ===
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_delay_secs: u64,

    // === 熔断 ===
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_secs: u64,

    // === 重试 ===
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    // === 监控告警 ===
    pub max_error_rate: f64,
    pub max_sync_delay_minutes: i64,
    pub min_orders_expected: u32,
    pub max_consecutive_failures: u32,
    pub sync_timeout_minutes: i64,
    pub notifications_per_type_per_hour: u32,
    pub critical_cooldown_secs: u64,
    pub escalation_delay_secs: u64,
    pub alert_retention_days: i64,
    pub alert_prune_interval_secs: u64,

    // === 平台接入 ===
    pub shopee_base_url: String,
    pub shopee_partner_id: String,
    pub shopee_partner_key: String,
    pub tiktok_base_url: String,
    pub tiktok_app_key: String,
    pub tiktok_app_secret: String,
    pub storefront_base_url: String,

    // === 店铺/凭证装载 ===
    pub stores_file: Option<String>,
    pub credentials_file: Option<String>,
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self {
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_dir: env_opt("LOG_DIR"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),

            sync_interval_secs: env_parse("SYNC_INTERVAL_SECS", 900),
            max_concurrent_syncs: env_parse("MAX_CONCURRENT_SYNCS", 3),
            startup_jitter_secs: env_parse("STARTUP_JITTER_SECS", 30),
            max_job_retries: env_parse("MAX_JOB_RETRIES", 2),
            job_retry_delay_secs: env_parse("JOB_RETRY_DELAY_SECS", 30),

            pull_window_days: env_parse("PULL_WINDOW_DAYS", 7),
            push_window_hours: env_parse("PUSH_WINDOW_HOURS", 24),
            batch_size: env_parse("BATCH_SIZE", 50),

            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 10),
            rate_limit_window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_delay_secs: env_parse("RATE_LIMIT_DELAY_SECS", 2),

            breaker_failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", 5),
            breaker_recovery_secs: env_parse("BREAKER_RECOVERY_SECS", 60),

            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 1_000),
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", 30_000),

            max_error_rate: env_parse("MAX_ERROR_RATE", 10.0),
            max_sync_delay_minutes: env_parse("MAX_SYNC_DELAY_MINUTES", 60),
            min_orders_expected: env_parse("MIN_ORDERS_EXPECTED", 0),
            max_consecutive_failures: env_parse("MAX_CONSECUTIVE_FAILURES", 3),
            sync_timeout_minutes: env_parse("SYNC_TIMEOUT_MINUTES", 30),
            notifications_per_type_per_hour: env_parse("NOTIFICATIONS_PER_TYPE_PER_HOUR", 10),
            critical_cooldown_secs: env_parse("CRITICAL_COOLDOWN_SECS", 300),
            escalation_delay_secs: env_parse("ESCALATION_DELAY_SECS", 900),
            alert_retention_days: env_parse("ALERT_RETENTION_DAYS", 7),
            alert_prune_interval_secs: env_parse("ALERT_PRUNE_INTERVAL_SECS", 3_600),

            shopee_base_url: std::env::var("SHOPEE_BASE_URL")
                .unwrap_or_else(|_| "https://partner.shopeemobile.com".into()),
            shopee_partner_id: std::env::var("SHOPEE_PARTNER_ID").unwrap_or_default(),
            shopee_partner_key: std::env::var("SHOPEE_PARTNER_KEY").unwrap_or_default(),
            tiktok_base_url: std::env::var("TIKTOK_BASE_URL")
                .unwrap_or_else(|_| "https://open-api.tiktokglobalshop.com".into()),
            tiktok_app_key: std::env::var("TIKTOK_APP_KEY").unwrap_or_default(),
            tiktok_app_secret: std::env::var("TIKTOK_APP_SECRET").unwrap_or_default(),
            storefront_base_url: std::env::var("STOREFRONT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000".into()),

            stores_file: env_opt("STORES_FILE"),
            credentials_file: env_opt("CREDENTIALS_FILE"),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    // ── 派生的组件配置 ───────────────────────────────────────────────

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            max_concurrent_syncs: self.max_concurrent_syncs,
            startup_jitter_secs: self.startup_jitter_secs,
            max_job_retries: self.max_job_retries,
            retry_delay: Duration::from_secs(self.job_retry_delay_secs),
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            recovery_timeout_ms: self.breaker_recovery_secs as i64 * 1000,
            half_open_successes: 3,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn monitor_thresholds(&self) -> MonitorThresholds {
        MonitorThresholds {
            max_error_rate: self.max_error_rate,
            max_sync_delay_minutes: self.max_sync_delay_minutes,
            min_orders_expected: self.min_orders_expected,
            max_consecutive_failures: self.max_consecutive_failures,
            sync_timeout_minutes: self.sync_timeout_minutes,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_configs_use_defaults() {
        let config = Config::from_env();
        assert_eq!(config.breaker_config().failure_threshold, 5);
        assert_eq!(config.retry_config().max_attempts, 3);
        assert!((config.monitor_thresholds().max_error_rate - 10.0).abs() < f64::EPSILON);
    }
}
