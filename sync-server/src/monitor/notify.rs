//! Notification fan-out
//!
//! Each organization configures channels (email/webhook/slack/teams) with
//! an alert-type allow-list and a minimum severity. Qualifying alerts go
//! to every matching enabled channel concurrently; one channel failing
//! never blocks the others. A sliding per-type hourly cap and a critical
//! cooldown keep noisy alerts from flooding recipients.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::models::alert::{Alert, AlertSeverity, AlertType};
use shared::util::millis_to_datetime;

use crate::utils::{SyncError, SyncResult};

/// Supported channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Webhook,
    Slack,
    Teams,
}

/// One configured channel for an organization
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    /// Unique name within the organization ("ops-webhook", "oncall-mail")
    pub name: String,
    pub enabled: bool,
    /// Webhook/Slack/Teams endpoint
    pub endpoint: Option<String>,
    /// Email recipient
    pub recipient: Option<String>,
    /// Allow-list; empty means all alert types
    pub alert_types: Vec<AlertType>,
    pub min_severity: AlertSeverity,
}

impl ChannelConfig {
    fn accepts(&self, alert: &Alert) -> bool {
        self.enabled
            && alert.severity >= self.min_severity
            && (self.alert_types.is_empty() || self.alert_types.contains(&alert.alert_type))
    }
}

/// Channel delivery capability
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, config: &ChannelConfig, alert: &Alert) -> SyncResult<()>;
}

/// Webhook payload — this wire format is a published contract
pub fn webhook_payload(alert: &Alert) -> serde_json::Value {
    serde_json::json!({
        "alert_type": alert.alert_type.as_str(),
        "severity": alert.severity.as_str(),
        "organization_id": alert.organization_id,
        "store_id": alert.store_id,
        "message": alert.message,
        "details": alert.details,
        "created_at": millis_to_datetime(alert.created_at).to_rfc3339(),
        "alert_id": alert.id,
    })
}

/// Generic JSON POST webhook
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(SyncError::Http)?,
        })
    }

    async fn post(&self, config: &ChannelConfig, body: &serde_json::Value) -> SyncResult<()> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| SyncError::config(format!("Channel {} has no endpoint", config.name)))?;

        let response = self.client.post(endpoint).json(body).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::platform_status(
                response.status().as_u16(),
                format!("Notification endpoint rejected delivery for {}", config.name),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, config: &ChannelConfig, alert: &Alert) -> SyncResult<()> {
        self.post(config, &webhook_payload(alert)).await
    }
}

/// Slack incoming-webhook sender
pub struct SlackSender {
    inner: WebhookSender,
}

impl SlackSender {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            inner: WebhookSender::new()?,
        })
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    async fn send(&self, config: &ChannelConfig, alert: &Alert) -> SyncResult<()> {
        let body = serde_json::json!({
            "text": format!(
                "[{}] {} — {}{}",
                alert.severity.as_str().to_uppercase(),
                alert.alert_type.as_str(),
                alert.message,
                alert
                    .store_id
                    .as_deref()
                    .map(|s| format!(" (store {s})"))
                    .unwrap_or_default(),
            ),
        });
        self.inner.post(config, &body).await
    }
}

/// Teams message-card sender
pub struct TeamsSender {
    inner: WebhookSender,
}

impl TeamsSender {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            inner: WebhookSender::new()?,
        })
    }
}

#[async_trait]
impl NotificationSender for TeamsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Teams
    }

    async fn send(&self, config: &ChannelConfig, alert: &Alert) -> SyncResult<()> {
        let body = serde_json::json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "summary": alert.message,
            "themeColor": match alert.severity {
                AlertSeverity::Critical => "d93025",
                AlertSeverity::High => "f29900",
                _ => "1a73e8",
            },
            "title": format!("Sync alert: {}", alert.alert_type.as_str()),
            "text": alert.message,
        });
        self.inner.post(config, &body).await
    }
}

/// Email sender — delivery is delegated to the host's mail relay; this
/// core only logs the handoff
pub struct EmailSender;

#[async_trait]
impl NotificationSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, config: &ChannelConfig, alert: &Alert) -> SyncResult<()> {
        let recipient = config
            .recipient
            .as_deref()
            .ok_or_else(|| SyncError::config(format!("Channel {} has no recipient", config.name)))?;
        tracing::info!(
            recipient,
            alert = %alert.id,
            severity = alert.severity.as_str(),
            "Email notification queued: {}",
            alert.message
        );
        Ok(())
    }
}

/// Dispatcher-wide limits
#[derive(Debug, Clone)]
pub struct NotificationPolicy {
    /// Max notifications per (org, alert type) per hour
    pub max_per_type_per_hour: u32,
    /// Extra spacing between critical notifications per (org, type)
    pub critical_cooldown: Duration,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            max_per_type_per_hour: 10,
            critical_cooldown: Duration::from_secs(300),
        }
    }
}

/// Fan-out coordinator
pub struct NotificationDispatcher {
    senders: HashMap<ChannelKind, Arc<dyn NotificationSender>>,
    channels_by_org: DashMap<String, Vec<ChannelConfig>>,
    policy: NotificationPolicy,
    // (org, type) → timestamps of notifications inside the last hour
    sent_history: Mutex<HashMap<(String, AlertType), VecDeque<i64>>>,
    last_critical: Mutex<HashMap<(String, AlertType), i64>>,
}

impl NotificationDispatcher {
    pub fn new(policy: NotificationPolicy) -> SyncResult<Self> {
        let mut senders: HashMap<ChannelKind, Arc<dyn NotificationSender>> = HashMap::new();
        senders.insert(ChannelKind::Webhook, Arc::new(WebhookSender::new()?));
        senders.insert(ChannelKind::Slack, Arc::new(SlackSender::new()?));
        senders.insert(ChannelKind::Teams, Arc::new(TeamsSender::new()?));
        senders.insert(ChannelKind::Email, Arc::new(EmailSender));

        Ok(Self {
            senders,
            channels_by_org: DashMap::new(),
            policy,
            sent_history: Mutex::new(HashMap::new()),
            last_critical: Mutex::new(HashMap::new()),
        })
    }

    /// Replace a sender implementation (test hook)
    pub fn set_sender(&mut self, sender: Arc<dyn NotificationSender>) {
        self.senders.insert(sender.kind(), sender);
    }

    pub fn configure_org(&self, organization_id: impl Into<String>, channels: Vec<ChannelConfig>) {
        self.channels_by_org.insert(organization_id.into(), channels);
    }

    /// Fan an alert out to every matching channel. Returns the names of
    /// channels that delivered successfully.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<String> {
        if !self.admit(alert) {
            return Vec::new();
        }

        let Some(channels) = self
            .channels_by_org
            .get(&alert.organization_id)
            .map(|c| c.clone())
        else {
            tracing::debug!(
                organization = %alert.organization_id,
                "No notification channels configured"
            );
            return Vec::new();
        };

        let matching: Vec<ChannelConfig> =
            channels.into_iter().filter(|c| c.accepts(alert)).collect();
        if matching.is_empty() {
            return Vec::new();
        }

        let sends = matching.iter().map(|config| {
            let sender = self.senders.get(&config.kind).cloned();
            async move {
                let Some(sender) = sender else {
                    tracing::error!(channel = %config.name, "No sender for channel kind");
                    return None;
                };
                match sender.send(config, alert).await {
                    Ok(()) => Some(config.name.clone()),
                    Err(e) => {
                        // Per-channel isolation: log and move on
                        tracing::error!(
                            channel = %config.name,
                            alert = %alert.id,
                            error = %e,
                            "Notification delivery failed"
                        );
                        None
                    }
                }
            }
        });

        let delivered: Vec<String> = futures::future::join_all(sends)
            .await
            .into_iter()
            .flatten()
            .collect();

        if !delivered.is_empty() {
            self.record_sent(alert);
        }
        delivered
    }

    /// Hourly cap + critical cooldown
    fn admit(&self, alert: &Alert) -> bool {
        let key = (alert.organization_id.clone(), alert.alert_type);
        let now = shared::util::now_millis();

        if alert.severity == AlertSeverity::Critical {
            let last = self.last_critical.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(at) = last.get(&key)
                && now - at < self.policy.critical_cooldown.as_millis() as i64
            {
                tracing::debug!(
                    alert_type = alert.alert_type.as_str(),
                    "Critical notification suppressed by cooldown"
                );
                return false;
            }
        }

        let mut history = self.sent_history.lock().unwrap_or_else(|e| e.into_inner());
        let window = history.entry(key).or_default();
        while let Some(front) = window.front() {
            if now - front >= 3_600_000 {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.policy.max_per_type_per_hour as usize {
            tracing::warn!(
                alert_type = alert.alert_type.as_str(),
                organization = %alert.organization_id,
                "Notification rate limit reached for alert type"
            );
            return false;
        }
        true
    }

    fn record_sent(&self, alert: &Alert) {
        let key = (alert.organization_id.clone(), alert.alert_type);
        let now = shared::util::now_millis();
        self.sent_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_default()
            .push_back(now);
        if alert.severity == AlertSeverity::Critical {
            self.last_critical
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSender {
        kind: ChannelKind,
        sent: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSender for CountingSender {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, _config: &ChannelConfig, _alert: &Alert) -> SyncResult<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SyncError::platform_status(500, "endpoint down"))
            } else {
                Ok(())
            }
        }
    }

    fn channel(kind: ChannelKind, name: &str, min_severity: AlertSeverity) -> ChannelConfig {
        ChannelConfig {
            kind,
            name: name.to_string(),
            enabled: true,
            endpoint: Some("http://127.0.0.1:9/hook".into()),
            recipient: Some("ops@example.com".into()),
            alert_types: Vec::new(),
            min_severity,
        }
    }

    fn alert(severity: AlertSeverity) -> Alert {
        Alert::new(
            AlertType::HighErrorRate,
            severity,
            "org-1",
            Some("store-1".into()),
            "error rate 30%",
            serde_json::json!({"rate": 30.0}),
        )
    }

    fn dispatcher_with(
        senders: Vec<Arc<dyn NotificationSender>>,
        channels: Vec<ChannelConfig>,
        policy: NotificationPolicy,
    ) -> NotificationDispatcher {
        let mut dispatcher = NotificationDispatcher::new(policy).unwrap();
        for sender in senders {
            dispatcher.set_sender(sender);
        }
        dispatcher.configure_org("org-1", channels);
        dispatcher
    }

    #[tokio::test]
    async fn test_fan_out_with_failure_isolation() {
        let ok_count = Arc::new(AtomicU32::new(0));
        let fail_count = Arc::new(AtomicU32::new(0));

        let dispatcher = dispatcher_with(
            vec![
                Arc::new(CountingSender {
                    kind: ChannelKind::Slack,
                    sent: ok_count.clone(),
                    fail: false,
                }),
                Arc::new(CountingSender {
                    kind: ChannelKind::Webhook,
                    sent: fail_count.clone(),
                    fail: true,
                }),
            ],
            vec![
                channel(ChannelKind::Slack, "slack-ops", AlertSeverity::Low),
                channel(ChannelKind::Webhook, "hook-ops", AlertSeverity::Low),
            ],
            NotificationPolicy::default(),
        );

        let delivered = dispatcher.dispatch(&alert(AlertSeverity::High)).await;

        assert_eq!(delivered, vec!["slack-ops".to_string()]);
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
        assert_eq!(fail_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_min_severity_filters_channel() {
        let sent = Arc::new(AtomicU32::new(0));
        let dispatcher = dispatcher_with(
            vec![Arc::new(CountingSender {
                kind: ChannelKind::Email,
                sent: sent.clone(),
                fail: false,
            })],
            vec![channel(ChannelKind::Email, "mail", AlertSeverity::Critical)],
            NotificationPolicy::default(),
        );

        let delivered = dispatcher.dispatch(&alert(AlertSeverity::Medium)).await;
        assert!(delivered.is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_alert_type_allow_list() {
        let sent = Arc::new(AtomicU32::new(0));
        let mut config = channel(ChannelKind::Slack, "slack", AlertSeverity::Low);
        config.alert_types = vec![AlertType::SyncFailure];

        let dispatcher = dispatcher_with(
            vec![Arc::new(CountingSender {
                kind: ChannelKind::Slack,
                sent: sent.clone(),
                fail: false,
            })],
            vec![config],
            NotificationPolicy::default(),
        );

        // HighErrorRate is not in the allow-list
        assert!(dispatcher.dispatch(&alert(AlertSeverity::High)).await.is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hourly_rate_limit() {
        let sent = Arc::new(AtomicU32::new(0));
        let dispatcher = dispatcher_with(
            vec![Arc::new(CountingSender {
                kind: ChannelKind::Slack,
                sent: sent.clone(),
                fail: false,
            })],
            vec![channel(ChannelKind::Slack, "slack", AlertSeverity::Low)],
            NotificationPolicy {
                max_per_type_per_hour: 2,
                critical_cooldown: Duration::from_secs(0),
            },
        );

        for _ in 0..5 {
            dispatcher.dispatch(&alert(AlertSeverity::High)).await;
        }
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_critical_cooldown() {
        let sent = Arc::new(AtomicU32::new(0));
        let dispatcher = dispatcher_with(
            vec![Arc::new(CountingSender {
                kind: ChannelKind::Slack,
                sent: sent.clone(),
                fail: false,
            })],
            vec![channel(ChannelKind::Slack, "slack", AlertSeverity::Low)],
            NotificationPolicy {
                max_per_type_per_hour: 100,
                critical_cooldown: Duration::from_secs(600),
            },
        );

        dispatcher.dispatch(&alert(AlertSeverity::Critical)).await;
        dispatcher.dispatch(&alert(AlertSeverity::Critical)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_webhook_payload_contract() {
        let alert = alert(AlertSeverity::High);
        let payload = webhook_payload(&alert);

        assert_eq!(payload["alert_type"], "high_error_rate");
        assert_eq!(payload["severity"], "high");
        assert_eq!(payload["organization_id"], "org-1");
        assert_eq!(payload["store_id"], "store-1");
        assert_eq!(payload["alert_id"], serde_json::json!(alert.id));
        // ISO-8601 timestamp
        assert!(payload["created_at"].as_str().unwrap().contains('T'));
    }
}
