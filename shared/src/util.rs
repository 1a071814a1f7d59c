use chrono::{DateTime, Utc};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 获取当前 UTC 时间戳（秒）— 用于平台请求签名
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Unix millis → `DateTime<Utc>`，无效值 fallback 到 epoch
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_monotone_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }

    #[test]
    fn test_millis_roundtrip() {
        let millis = 1_722_500_000_000;
        let dt = millis_to_datetime(millis);
        assert_eq!(dt.timestamp_millis(), millis);
    }
}
