//! Alert registry
//!
//! Process-wide record of threshold breaches, deduplicated per
//! (organization, store, type): raising while an unresolved alert exists
//! merges into it instead of creating a duplicate. Records age out via
//! [`AlertRegistry::prune_older_than`]; multi-instance deployments need
//! an external store for cross-process dedup, which is out of scope here.

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use shared::models::alert::{Alert, AlertSeverity, AlertType};

/// Result of raising an alert
#[derive(Debug, Clone)]
pub enum RaiseOutcome {
    Created(Alert),
    Merged(Alert),
}

impl RaiseOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            RaiseOutcome::Created(a) | RaiseOutcome::Merged(a) => a,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RaiseOutcome::Created(_))
    }
}

#[derive(Default)]
pub struct AlertRegistry {
    // Single mutex: dedup scan + insert must be atomic
    alerts: Mutex<HashMap<Uuid, Alert>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or merge. Merging bumps occurrences/last_seen, keeps the
    /// highest severity and folds new detail fields over the old ones.
    pub fn raise(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        organization_id: &str,
        store_id: Option<&str>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> RaiseOutcome {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());

        let existing = alerts.values_mut().find(|a| {
            !a.is_resolved()
                && a.organization_id == organization_id
                && a.store_id.as_deref() == store_id
                && a.alert_type == alert_type
        });

        if let Some(alert) = existing {
            alert.occurrences += 1;
            alert.last_seen_at = shared::util::now_millis();
            alert.severity = alert.severity.max(severity);
            alert.message = message.into();
            merge_details(&mut alert.details, details);
            tracing::debug!(
                alert = %alert.id,
                alert_type = alert_type.as_str(),
                occurrences = alert.occurrences,
                "Merged repeat alert"
            );
            return RaiseOutcome::Merged(alert.clone());
        }

        let alert = Alert::new(
            alert_type,
            severity,
            organization_id,
            store_id.map(str::to_string),
            message,
            details,
        );
        tracing::info!(
            alert = %alert.id,
            alert_type = alert_type.as_str(),
            severity = severity.as_str(),
            organization = organization_id,
            store = store_id.unwrap_or("-"),
            "Alert raised"
        );
        alerts.insert(alert.id, alert.clone());
        RaiseOutcome::Created(alert)
    }

    /// Record which channels were notified for an alert
    pub fn record_notifications(&self, alert_id: Uuid, channels: &[String]) {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(alert) = alerts.get_mut(&alert_id) {
            for channel in channels {
                if !alert.notifications_sent.contains(channel) {
                    alert.notifications_sent.push(channel.clone());
                }
            }
        }
    }

    /// Resolve the unresolved alert for a dedup key, if any
    pub fn resolve(
        &self,
        organization_id: &str,
        store_id: Option<&str>,
        alert_type: AlertType,
    ) -> Option<Alert> {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        let alert = alerts.values_mut().find(|a| {
            !a.is_resolved()
                && a.organization_id == organization_id
                && a.store_id.as_deref() == store_id
                && a.alert_type == alert_type
        })?;
        alert.resolved_at = Some(shared::util::now_millis());
        Some(alert.clone())
    }

    pub fn resolve_by_id(&self, alert_id: Uuid) -> Option<Alert> {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        let alert = alerts.get_mut(&alert_id)?;
        if alert.resolved_at.is_none() {
            alert.resolved_at = Some(shared::util::now_millis());
        }
        Some(alert.clone())
    }

    pub fn acknowledge(&self, alert_id: Uuid) -> Option<Alert> {
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        let alert = alerts.get_mut(&alert_id)?;
        alert.acknowledged = true;
        Some(alert.clone())
    }

    pub fn get(&self, alert_id: Uuid) -> Option<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&alert_id)
            .cloned()
    }

    pub fn unresolved(&self) -> Vec<Alert> {
        let mut out: Vec<Alert> = self
            .alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|a| !a.is_resolved())
            .cloned()
            .collect();
        out.sort_by_key(|a| a.created_at);
        out
    }

    /// Drop alerts whose last activity is older than `max_age_millis`.
    /// Returns how many were removed.
    pub fn prune_older_than(&self, max_age_millis: i64) -> usize {
        let cutoff = shared::util::now_millis() - max_age_millis;
        let mut alerts = self.alerts.lock().unwrap_or_else(|e| e.into_inner());
        let before = alerts.len();
        alerts.retain(|_, a| a.last_seen_at >= cutoff || !a.is_resolved());
        before - alerts.len()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shallow-merge `new` object fields over `existing`; non-object values replace
fn merge_details(existing: &mut serde_json::Value, new: serde_json::Value) {
    match (existing.as_object_mut(), new) {
        (Some(map), serde_json::Value::Object(new_map)) => {
            for (k, v) in new_map {
                map.insert(k, v);
            }
        }
        (_, new) => *existing = new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raise(registry: &AlertRegistry, severity: AlertSeverity, details: serde_json::Value) -> RaiseOutcome {
        registry.raise(
            AlertType::HighErrorRate,
            severity,
            "org-1",
            Some("store-1"),
            "error rate too high",
            details,
        )
    }

    #[test]
    fn test_repeat_raise_merges_into_one_record() {
        let registry = AlertRegistry::new();
        let first = raise(&registry, AlertSeverity::Medium, json!({"rate": 12.0}));
        assert!(first.is_new());

        let second = raise(&registry, AlertSeverity::High, json!({"rate": 35.0, "run": 2}));
        assert!(!second.is_new());

        assert_eq!(registry.len(), 1);
        let alert = second.alert();
        assert_eq!(alert.occurrences, 2);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.details["rate"], json!(35.0));
        assert_eq!(alert.details["run"], json!(2));
    }

    #[test]
    fn test_merge_never_downgrades_severity() {
        let registry = AlertRegistry::new();
        raise(&registry, AlertSeverity::Critical, json!({}));
        let merged = raise(&registry, AlertSeverity::Low, json!({}));
        assert_eq!(merged.alert().severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_resolved_alert_allows_new_record() {
        let registry = AlertRegistry::new();
        raise(&registry, AlertSeverity::Medium, json!({}));
        registry
            .resolve("org-1", Some("store-1"), AlertType::HighErrorRate)
            .unwrap();

        let next = raise(&registry, AlertSeverity::Medium, json!({}));
        assert!(next.is_new());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.unresolved().len(), 1);
    }

    #[test]
    fn test_different_stores_do_not_dedup() {
        let registry = AlertRegistry::new();
        registry.raise(
            AlertType::SyncDelay,
            AlertSeverity::Medium,
            "org-1",
            Some("store-1"),
            "late",
            json!({}),
        );
        let other = registry.raise(
            AlertType::SyncDelay,
            AlertSeverity::Medium,
            "org-1",
            Some("store-2"),
            "late",
            json!({}),
        );
        assert!(other.is_new());
    }

    #[test]
    fn test_prune_keeps_unresolved() {
        let registry = AlertRegistry::new();
        let outcome = raise(&registry, AlertSeverity::Medium, json!({}));
        registry.resolve_by_id(outcome.alert().id);
        raise(&registry, AlertSeverity::Medium, json!({}));

        // Cutoff in the future relative to both records
        let pruned = registry.prune_older_than(-60_000);
        assert_eq!(pruned, 1);
        assert_eq!(registry.unresolved().len(), 1);
    }
}
