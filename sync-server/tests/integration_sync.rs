//! End-to-end engine tests against a scripted mock adapter
//!
//! Drives pull/push through the real normalizer, stores and monitor with
//! an in-memory platform standing in for the marketplace API.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::models::alert::{AlertSeverity, AlertType};
use shared::models::order::{FinancialStatus, FulfillmentStatus, OrderStatus};
use shared::models::store::StoreConfig;
use shared::platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};

use sync_server::engine::{OrderSyncEngine, SyncDirection, SyncOptions};
use sync_server::monitor::{
    AlertRegistry, MonitorThresholds, NotificationDispatcher, NotificationPolicy, OrderSyncMonitor,
};
use sync_server::normalizer::OrderDataNormalizer;
use sync_server::platforms::{AdapterRegistry, PlatformAdapter};
use sync_server::store::memory::{
    InMemoryCredentialResolver, InMemoryOrderStore, InMemorySyncJobStore,
};
use sync_server::store::{OrderStore, SyncOrigin};
use sync_server::utils::SyncResult;

/// Scripted storefront: serves a fixed order list, records status pushes
struct MockAdapter {
    orders: Mutex<Vec<serde_json::Value>>,
    status_updates: Mutex<Vec<(String, String)>>,
}

impl MockAdapter {
    fn new(orders: Vec<serde_json::Value>) -> Self {
        Self {
            orders: Mutex::new(orders),
            status_updates: Mutex::new(Vec::new()),
        }
    }

    fn set_orders(&self, orders: Vec<serde_json::Value>) {
        *self.orders.lock().unwrap() = orders;
    }

    fn pushed(&self) -> Vec<(String, String)> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        Platform::Storefront
    }

    async fn authenticate(&self, _creds: &PlatformCredentials) -> SyncResult<()> {
        Ok(())
    }

    async fn fetch_orders(
        &self,
        _creds: &PlatformCredentials,
        query: &FetchOrdersQuery,
    ) -> SyncResult<PlatformOrderPage> {
        let orders = self.orders.lock().unwrap();
        let start = ((query.page - 1) * query.limit) as usize;
        let end = (start + query.limit as usize).min(orders.len());
        let page: Vec<serde_json::Value> = if start < orders.len() {
            orders[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(PlatformOrderPage {
            has_more: end < orders.len(),
            next_page: query.page + 1,
            orders: page,
        })
    }

    async fn update_order_status(
        &self,
        _creds: &PlatformCredentials,
        platform_order_id: &str,
        platform_status: &str,
        _fulfillment: Option<&FulfillmentDetails>,
    ) -> SyncResult<()> {
        self.status_updates
            .lock()
            .unwrap()
            .push((platform_order_id.to_string(), platform_status.to_string()));
        Ok(())
    }
}

struct Harness {
    engine: OrderSyncEngine,
    adapter: Arc<MockAdapter>,
    orders: Arc<InMemoryOrderStore>,
    registry: Arc<AlertRegistry>,
    store: StoreConfig,
}

fn harness(raw_orders: Vec<serde_json::Value>) -> Harness {
    let adapter = Arc::new(MockAdapter::new(raw_orders));
    let adapters = Arc::new(AdapterRegistry::new());
    adapters.register(adapter.clone());

    let orders = Arc::new(InMemoryOrderStore::new());
    let jobs = Arc::new(InMemorySyncJobStore::new());

    let credentials = Arc::new(InMemoryCredentialResolver::new());
    credentials.put(
        "store-1",
        PlatformCredentials {
            access_token: "test-token".into(),
            refresh_token: None,
            expires_at: None,
            shop_id: None,
        },
    );

    let registry = Arc::new(AlertRegistry::new());
    let monitor = Arc::new(OrderSyncMonitor::new(
        registry.clone(),
        Arc::new(NotificationDispatcher::new(NotificationPolicy::default()).unwrap()),
        jobs,
        MonitorThresholds::default(),
        Duration::from_secs(600),
    ));

    let engine = OrderSyncEngine::new(
        adapters,
        Arc::new(OrderDataNormalizer::with_defaults()),
        orders.clone(),
        credentials,
        monitor,
    );

    Harness {
        engine,
        adapter,
        orders,
        registry,
        store: StoreConfig::new("store-1", "org-1", Platform::Storefront, "Web Shop"),
    }
}

fn raw_order(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "number": format!("#{id}"),
        "status": status,
        "customer": { "name": "Dana", "city": "Berlin" },
        "items": [ { "product_id": "sku-1", "name": "Lamp", "quantity": 1, "price": 30.0 } ],
        "totals": { "subtotal": 30.0, "tax": 0.0, "shipping": 4.0, "discount": 0.0, "total": 34.0 },
        "currency": "EUR",
        "created_at": "2026-08-01T09:00:00Z"
    })
}

/// Invalid: no items survives decode but fails validation
fn raw_invalid_order(id: &str) -> serde_json::Value {
    let mut order = raw_order(id, "paid");
    order["items"] = json!([]);
    order
}

fn pull_options() -> SyncOptions {
    SyncOptions {
        direction: SyncDirection::Pull,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_pull_isolates_invalid_orders() {
    // 10 platform orders, 8 valid / 2 invalid
    let mut raws: Vec<serde_json::Value> = (0..8).map(|i| raw_order(&format!("ok-{i}"), "paid")).collect();
    raws.push(raw_invalid_order("bad-1"));
    raws.push(raw_invalid_order("bad-2"));

    let h = harness(raws);
    let report = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();

    assert_eq!(report.total_processed, 10);
    assert_eq!(report.imported, 8);
    assert_eq!(report.failed, 2);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(h.orders.order_count(), 8);
}

#[tokio::test]
async fn test_pull_rerun_is_idempotent() {
    let raws: Vec<serde_json::Value> = (0..5).map(|i| raw_order(&format!("o-{i}"), "paid")).collect();
    let h = harness(raws);

    let first = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();
    assert_eq!(first.imported, 5);

    // Unchanged platform state: no additional creates or updates
    let second = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(h.orders.order_count(), 5);
}

#[tokio::test]
async fn test_pull_updates_only_on_status_change() {
    let h = harness(vec![raw_order("o-1", "paid")]);
    h.engine.sync_store(&h.store, &pull_options()).await.unwrap();

    // Platform moved the order to shipped
    h.adapter.set_orders(vec![raw_order("o-1", "shipped")]);
    let report = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.imported, 0);

    let stored = h
        .orders
        .find_by_platform_id("store-1", "o-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.order.status, OrderStatus::Shipped);
    assert_eq!(stored.last_origin, SyncOrigin::Pull);
}

#[tokio::test]
async fn test_pull_pages_through_all_orders() {
    let raws: Vec<serde_json::Value> = (0..120).map(|i| raw_order(&format!("p-{i}"), "paid")).collect();
    let h = harness(raws);

    let report = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();
    assert_eq!(report.total_processed, 120);
    assert_eq!(h.orders.order_count(), 120);
}

#[tokio::test]
async fn test_high_error_rate_raises_high_alert() {
    // 20 orders, 6 invalid → 30% vs max 10% → one high_error_rate, severity high
    let mut raws: Vec<serde_json::Value> = (0..14).map(|i| raw_order(&format!("v-{i}"), "paid")).collect();
    for i in 0..6 {
        raws.push(raw_invalid_order(&format!("x-{i}")));
    }

    let h = harness(raws);
    let report = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();
    assert_eq!(report.failed, 6);

    let alerts = h.registry.unresolved();
    let rate_alerts: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::HighErrorRate)
        .collect();
    assert_eq!(rate_alerts.len(), 1);
    assert_eq!(rate_alerts[0].severity, AlertSeverity::High);
}

#[tokio::test]
async fn test_push_propagates_local_change_and_skips_pull_echo() {
    let h = harness(vec![raw_order("o-1", "paid"), raw_order("o-2", "paid")]);
    h.engine.sync_store(&h.store, &pull_options()).await.unwrap();

    // A local (merchant-side) status change on o-1 only
    let stored = h
        .orders
        .find_by_platform_id("store-1", "o-1")
        .await
        .unwrap()
        .unwrap();
    h.orders
        .update_order_status(
            &stored.id,
            OrderStatus::Shipped,
            FinancialStatus::Paid,
            FulfillmentStatus::Fulfilled,
            SyncOrigin::Local,
        )
        .await
        .unwrap();

    let push = SyncOptions {
        direction: SyncDirection::Push,
        ..Default::default()
    };
    let report = h.engine.sync_store(&h.store, &push).await.unwrap();

    // o-2's last write came from the pull path — it must not echo back
    assert_eq!(report.status_updates, 1);
    assert_eq!(h.adapter.pushed(), vec![("o-1".to_string(), "shipped".to_string())]);

    // A second push pass has nothing left to do
    let again = h.engine.sync_store(&h.store, &push).await.unwrap();
    assert_eq!(again.status_updates, 0);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let h = harness(vec![raw_order("o-1", "paid")]);
    let options = SyncOptions {
        direction: SyncDirection::Bidirectional,
        dry_run: true,
        ..Default::default()
    };

    let report = h.engine.sync_store(&h.store, &options).await.unwrap();

    // Pipeline ran and counted the would-be import...
    assert_eq!(report.imported, 1);
    // ...but nothing was persisted or pushed
    assert_eq!(h.orders.order_count(), 0);
    assert!(h.adapter.pushed().is_empty());
}

#[tokio::test]
async fn test_missing_credentials_aborts_only_that_store() {
    let h = harness(vec![raw_order("o-1", "paid")]);
    let orphan = StoreConfig::new("store-2", "org-1", Platform::Storefront, "No Creds");

    let err = h.engine.sync_store(&orphan, &pull_options()).await.unwrap_err();
    assert!(err.to_string().contains("credentials"));

    // The configured store still syncs fine afterwards
    let report = h.engine.sync_store(&h.store, &pull_options()).await.unwrap();
    assert_eq!(report.imported, 1);
}
