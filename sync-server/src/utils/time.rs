//! 时间工具函数 — 同步窗口计算
//!
//! 引擎与监控统一使用 `i64` Unix millis；窗口计算集中在这里。

use chrono::{Duration, Utc};

/// 拉取窗口 [now - days, now)，返回 (start, end) Unix millis
pub fn pull_window_millis(days: i64) -> (i64, i64) {
    let now = Utc::now();
    let start = now - Duration::days(days);
    (start.timestamp_millis(), now.timestamp_millis())
}

/// 推送窗口起点 now - hours，返回 Unix millis
pub fn push_window_start_millis(hours: i64) -> i64 {
    (Utc::now() - Duration::hours(hours)).timestamp_millis()
}

/// 时间戳距今的分钟数（非负）
pub fn minutes_since(millis: i64) -> i64 {
    let elapsed = shared::util::now_millis() - millis;
    (elapsed / 60_000).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_window_span() {
        let (start, end) = pull_window_millis(7);
        let span_days = (end - start) / 86_400_000;
        assert_eq!(span_days, 7);
        assert!(start < end);
    }

    #[test]
    fn test_minutes_since_past() {
        let fifteen_min_ago = shared::util::now_millis() - 15 * 60_000;
        let minutes = minutes_since(fifteen_min_ago);
        assert!((14..=16).contains(&minutes));
    }

    #[test]
    fn test_minutes_since_future_clamped() {
        let future = shared::util::now_millis() + 600_000;
        assert_eq!(minutes_since(future), 0);
    }
}
