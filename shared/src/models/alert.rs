//! Alert Model
//!
//! Durable record of a monitoring threshold breach. At most one unresolved
//! alert exists per (organization, store, type) — repeats merge into the
//! existing record instead of duplicating.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert categories raised by the sync monitor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighErrorRate,
    SyncDelay,
    LowOrderVolume,
    SyncFailure,
    StuckSync,
}

impl AlertType {
    /// Wire name used in notification payloads and dedup keys
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighErrorRate => "high_error_rate",
            AlertType::SyncDelay => "sync_delay",
            AlertType::LowOrderVolume => "low_order_volume",
            AlertType::SyncFailure => "sync_failure",
            AlertType::StuckSync => "stuck_sync",
        }
    }
}

/// Severity, ordered so `>=` comparisons express channel minimums
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A threshold breach record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub organization_id: String,
    pub store_id: Option<String>,
    pub message: String,
    /// Structured context for the breach (rates, counts, job ids)
    pub details: serde_json::Value,
    /// Unix millis
    pub created_at: i64,
    pub resolved_at: Option<i64>,
    /// Times this alert re-fired while unresolved
    pub occurrences: u32,
    /// Unix millis of the latest occurrence
    pub last_seen_at: i64,
    /// Channel names that were successfully notified
    pub notifications_sent: Vec<String>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        organization_id: impl Into<String>,
        store_id: Option<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let now = crate::util::now_millis();
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            organization_id: organization_id.into(),
            store_id,
            message: message.into(),
            details,
            created_at: now,
            resolved_at: None,
            occurrences: 1,
            last_seen_at: now,
            notifications_sent: Vec::new(),
            acknowledged: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Dedup key: (organization, store, type)
    pub fn dedup_key(&self) -> (String, Option<String>, AlertType) {
        (
            self.organization_id.clone(),
            self.store_id.clone(),
            self.alert_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::High > AlertSeverity::Medium);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(AlertType::HighErrorRate.as_str(), "high_error_rate");
        assert_eq!(
            serde_json::to_string(&AlertType::SyncFailure).unwrap(),
            "\"sync_failure\""
        );
    }

    #[test]
    fn test_new_alert_unresolved() {
        let alert = Alert::new(
            AlertType::SyncDelay,
            AlertSeverity::Medium,
            "org-1",
            Some("store-1".into()),
            "sync is late",
            serde_json::json!({"minutes": 75}),
        );
        assert!(!alert.is_resolved());
        assert_eq!(alert.occurrences, 1);
    }
}
