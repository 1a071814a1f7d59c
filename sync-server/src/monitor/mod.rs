//! Sync health monitoring
//!
//! Runs after every sync completion — the engine's single integration
//! point with alerting policy. Evaluates the run against per-organization
//! thresholds, deduplicates alerts through the [`AlertRegistry`] and fans
//! notifications out through the [`NotificationDispatcher`]. Critical
//! alerts re-notify after an escalation delay unless acknowledged or
//! resolved.

pub mod alerts;
pub mod notify;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use shared::models::alert::{AlertSeverity, AlertType};
use shared::models::store::StoreConfig;
use shared::models::sync_job::JobStatus;

use crate::engine::report::SyncReport;
use crate::store::SyncJobStore;
use crate::utils::time::minutes_since;

pub use alerts::{AlertRegistry, RaiseOutcome};
pub use notify::{
    ChannelConfig, ChannelKind, NotificationDispatcher, NotificationPolicy, NotificationSender,
};

/// Per-organization alerting thresholds
#[derive(Debug, Clone)]
pub struct MonitorThresholds {
    /// Max acceptable failed/total percentage
    pub max_error_rate: f64,
    /// Max minutes between successful completions
    pub max_sync_delay_minutes: i64,
    /// Expected writes per run; 0 disables the check
    pub min_orders_expected: u32,
    pub max_consecutive_failures: u32,
    /// Running jobs older than this are flagged stuck
    pub sync_timeout_minutes: i64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: 10.0,
            max_sync_delay_minutes: 60,
            min_orders_expected: 0,
            max_consecutive_failures: 3,
            sync_timeout_minutes: 30,
        }
    }
}

/// Cancellable delayed re-notification, keyed by alert id
struct EscalationScheduler {
    pending: Arc<DashMap<Uuid, CancellationToken>>,
    delay: Duration,
}

impl EscalationScheduler {
    fn new(delay: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            delay,
        }
    }

    fn schedule(
        &self,
        alert_id: Uuid,
        registry: Arc<AlertRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
    ) {
        // One pending escalation per alert
        if self.pending.contains_key(&alert_id) {
            return;
        }
        let token = CancellationToken::new();
        self.pending.insert(alert_id, token.clone());
        let delay = self.delay;
        let pending = self.pending.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(alert) = registry.get(alert_id)
                        && !alert.is_resolved()
                        && !alert.acknowledged
                    {
                        tracing::warn!(alert = %alert_id, "Escalating unacknowledged critical alert");
                        let delivered = dispatcher.dispatch(&alert).await;
                        if !delivered.is_empty() {
                            registry.record_notifications(alert_id, &delivered);
                        }
                    }
                }
            }
            pending.remove(&alert_id);
        });
    }

    fn cancel(&self, alert_id: Uuid) {
        if let Some((_, token)) = self.pending.remove(&alert_id) {
            token.cancel();
        }
    }
}

pub struct OrderSyncMonitor {
    default_thresholds: MonitorThresholds,
    org_thresholds: DashMap<String, MonitorThresholds>,
    registry: Arc<AlertRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    jobs: Arc<dyn SyncJobStore>,
    escalation: EscalationScheduler,
    /// store_id → Unix millis of the last successful completion
    last_success: DashMap<String, i64>,
}

impl OrderSyncMonitor {
    pub fn new(
        registry: Arc<AlertRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        jobs: Arc<dyn SyncJobStore>,
        default_thresholds: MonitorThresholds,
        escalation_delay: Duration,
    ) -> Self {
        Self {
            default_thresholds,
            org_thresholds: DashMap::new(),
            registry,
            dispatcher,
            jobs,
            escalation: EscalationScheduler::new(escalation_delay),
            last_success: DashMap::new(),
        }
    }

    pub fn set_org_thresholds(&self, organization_id: impl Into<String>, thresholds: MonitorThresholds) {
        self.org_thresholds.insert(organization_id.into(), thresholds);
    }

    fn thresholds_for(&self, organization_id: &str) -> MonitorThresholds {
        self.org_thresholds
            .get(organization_id)
            .map(|t| t.clone())
            .unwrap_or_else(|| self.default_thresholds.clone())
    }

    pub fn registry(&self) -> &Arc<AlertRegistry> {
        &self.registry
    }

    /// Completion hook, invoked by the engine after every sync run
    pub async fn on_sync_complete(&self, store: &StoreConfig, report: &SyncReport) {
        let thresholds = self.thresholds_for(&store.organization_id);

        self.check_error_rate(store, report, &thresholds).await;
        self.check_sync_delay(store, &thresholds).await;
        self.check_order_volume(store, report, &thresholds).await;
        self.check_consecutive_failures(store, &thresholds).await;
        self.check_stuck_jobs_for(store, &thresholds).await;

        // A run that produced at least one success (or had nothing to do)
        // counts as a successful completion
        if report.failed == 0 || report.failed < report.total_processed {
            self.last_success
                .insert(store.id.clone(), shared::util::now_millis());
        }
    }

    /// (a) failed/total percentage vs max_error_rate
    async fn check_error_rate(
        &self,
        store: &StoreConfig,
        report: &SyncReport,
        thresholds: &MonitorThresholds,
    ) {
        if report.total_processed == 0 {
            return;
        }
        let rate = report.error_rate();
        if rate <= thresholds.max_error_rate {
            return;
        }

        let ratio = rate / thresholds.max_error_rate;
        let severity = if ratio >= 5.0 {
            AlertSeverity::Critical
        } else if ratio >= 2.0 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };

        self.raise(
            AlertType::HighErrorRate,
            severity,
            store,
            format!(
                "Sync error rate {rate:.1}% exceeds limit {:.1}% ({} of {} orders failed)",
                thresholds.max_error_rate, report.failed, report.total_processed
            ),
            serde_json::json!({
                "error_rate": rate,
                "max_error_rate": thresholds.max_error_rate,
                "failed": report.failed,
                "total_processed": report.total_processed,
                "errors": report.errors,
            }),
        )
        .await;
    }

    /// (b) minutes since the last successful completion vs max_sync_delay
    async fn check_sync_delay(&self, store: &StoreConfig, thresholds: &MonitorThresholds) {
        let Some(last) = self.last_success.get(&store.id).map(|v| *v) else {
            return;
        };
        let minutes = minutes_since(last);
        if minutes <= thresholds.max_sync_delay_minutes {
            return;
        }

        let severity = if minutes >= thresholds.max_sync_delay_minutes * 2 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };

        self.raise(
            AlertType::SyncDelay,
            severity,
            store,
            format!(
                "No successful sync for {minutes} minutes (limit {})",
                thresholds.max_sync_delay_minutes
            ),
            serde_json::json!({
                "minutes_since_success": minutes,
                "max_sync_delay_minutes": thresholds.max_sync_delay_minutes,
            }),
        )
        .await;
    }

    /// (c) imported+updated vs min_orders_expected
    async fn check_order_volume(
        &self,
        store: &StoreConfig,
        report: &SyncReport,
        thresholds: &MonitorThresholds,
    ) {
        if thresholds.min_orders_expected == 0 {
            return;
        }
        let written = report.written();
        if written >= thresholds.min_orders_expected {
            return;
        }

        self.raise(
            AlertType::LowOrderVolume,
            AlertSeverity::Medium,
            store,
            format!(
                "Only {written} orders written, expected at least {}",
                thresholds.min_orders_expected
            ),
            serde_json::json!({
                "written": written,
                "min_orders_expected": thresholds.min_orders_expected,
            }),
        )
        .await;
    }

    /// (d) consecutive failed jobs, newest backwards until a non-failure
    async fn check_consecutive_failures(&self, store: &StoreConfig, thresholds: &MonitorThresholds) {
        let recent = match self.jobs.recent_jobs(&store.id, 20).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(store = %store.id, error = %e, "Failed to load recent jobs");
                return;
            }
        };

        let mut streak = 0u32;
        for job in &recent {
            match job.status {
                JobStatus::Failed => streak += 1,
                // In-flight jobs neither extend nor break the streak
                JobStatus::Pending | JobStatus::Running => continue,
                JobStatus::Completed => break,
            }
        }

        if streak < thresholds.max_consecutive_failures {
            return;
        }

        self.raise(
            AlertType::SyncFailure,
            AlertSeverity::Critical,
            store,
            format!("{streak} consecutive sync jobs failed"),
            serde_json::json!({
                "consecutive_failures": streak,
                "max_consecutive_failures": thresholds.max_consecutive_failures,
                "last_error": recent.first().and_then(|j| j.error_message.clone()),
            }),
        )
        .await;
    }

    /// (e) running jobs past the timeout are surfaced, never killed —
    /// termination is the process supervisor's call
    async fn check_stuck_jobs_for(&self, store: &StoreConfig, thresholds: &MonitorThresholds) {
        let running = match self.jobs.running_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load running jobs");
                return;
            }
        };

        for job in running.iter().filter(|j| j.store_id == store.id) {
            let Some(started) = job.started_at else { continue };
            let minutes = minutes_since(started);
            if minutes <= thresholds.sync_timeout_minutes {
                continue;
            }

            self.raise(
                AlertType::StuckSync,
                AlertSeverity::High,
                store,
                format!("Sync job {} running for {minutes} minutes", job.id),
                serde_json::json!({
                    "job_id": job.id,
                    "running_minutes": minutes,
                    "sync_timeout_minutes": thresholds.sync_timeout_minutes,
                }),
            )
            .await;
        }
    }

    async fn raise(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
        store: &StoreConfig,
        message: String,
        details: serde_json::Value,
    ) {
        let outcome = self.registry.raise(
            alert_type,
            severity,
            &store.organization_id,
            Some(&store.id),
            message,
            details,
        );
        let alert = outcome.alert().clone();

        let delivered = self.dispatcher.dispatch(&alert).await;
        if !delivered.is_empty() {
            self.registry.record_notifications(alert.id, &delivered);
        }

        if alert.severity == AlertSeverity::Critical {
            self.escalation
                .schedule(alert.id, self.registry.clone(), self.dispatcher.clone());
        }
    }

    /// Resolve the open alert for a dedup key and cancel its escalation
    pub fn resolve_alert(
        &self,
        organization_id: &str,
        store_id: Option<&str>,
        alert_type: AlertType,
    ) {
        if let Some(alert) = self.registry.resolve(organization_id, store_id, alert_type) {
            self.escalation.cancel(alert.id);
        }
    }

    /// Acknowledge an alert; pending escalation is cancelled
    pub fn acknowledge_alert(&self, alert_id: Uuid) {
        if self.registry.acknowledge(alert_id).is_some() {
            self.escalation.cancel(alert_id);
        }
    }

    /// Background maintenance: age-prune the alert registry
    pub async fn run_maintenance(
        self: Arc<Self>,
        retention: Duration,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Alert maintenance task started");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Alert maintenance shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let pruned = self.registry.prune_older_than(retention.as_millis() as i64);
                    if pruned > 0 {
                        tracing::info!(pruned, "Pruned aged-out alerts");
                    }
                }
            }
        }
    }
}
