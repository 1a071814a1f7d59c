//! In-memory collaborator implementations
//!
//! Backing store for tests and the default dev wiring. Keys follow the
//! production contract: orders are unique per (store_id,
//! platform_order_id), terminal jobs are immutable.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use shared::models::order::{CanonicalOrder, FinancialStatus, FulfillmentStatus, OrderStatus};
use shared::models::sync_job::{JobStatus, SyncJob};
use shared::platform::PlatformCredentials;

use super::{CredentialResolver, OrderStore, StoredOrder, SyncJobStore, SyncOrigin};
use crate::utils::{SyncError, SyncResult};

fn platform_key(store_id: &str, platform_order_id: &str) -> String {
    format!("{store_id}\u{1}{platform_order_id}")
}

fn mapping_key(store_id: &str, product_id: &str, variant_id: Option<&str>) -> String {
    format!("{store_id}\u{1}{product_id}\u{1}{}", variant_id.unwrap_or(""))
}

/// Order store backed by concurrent maps
#[derive(Default)]
pub struct InMemoryOrderStore {
    // (store_id, platform_order_id) → local order id
    by_platform_id: DashMap<String, String>,
    orders: DashMap<String, StoredOrder>,
    product_mappings: DashMap<String, String>,
    next_id: AtomicU64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product mapping (test/dev support)
    pub fn put_product_mapping(
        &self,
        store_id: &str,
        platform_product_id: &str,
        platform_variant_id: Option<&str>,
        local_variant_id: impl Into<String>,
    ) {
        self.product_mappings.insert(
            mapping_key(store_id, platform_product_id, platform_variant_id),
            local_variant_id.into(),
        );
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn get(&self, order_id: &str) -> Option<StoredOrder> {
        self.orders.get(order_id).map(|o| o.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_platform_id(
        &self,
        store_id: &str,
        platform_order_id: &str,
    ) -> SyncResult<Option<StoredOrder>> {
        let key = platform_key(store_id, platform_order_id);
        Ok(self
            .by_platform_id
            .get(&key)
            .and_then(|id| self.orders.get(id.value()).map(|o| o.clone())))
    }

    async fn create_order(
        &self,
        store_id: &str,
        order: &CanonicalOrder,
        origin: SyncOrigin,
    ) -> SyncResult<String> {
        let key = platform_key(store_id, &order.platform_order_id);
        if self.by_platform_id.contains_key(&key) {
            return Err(SyncError::store(format!(
                "Order {} already exists for store {store_id}",
                order.platform_order_id
            )));
        }

        let id = format!("ord_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.orders.insert(
            id.clone(),
            StoredOrder {
                id: id.clone(),
                store_id: store_id.to_string(),
                order: order.clone(),
                updated_at: shared::util::now_millis(),
                last_origin: origin,
                synced_at: None,
            },
        );
        self.by_platform_id.insert(key, id.clone());
        Ok(id)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        financial_status: FinancialStatus,
        fulfillment_status: FulfillmentStatus,
        origin: SyncOrigin,
    ) -> SyncResult<()> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| SyncError::store(format!("Order {order_id} not found")))?;
        entry.order.status = status;
        entry.order.financial_status = financial_status;
        entry.order.fulfillment_status = fulfillment_status;
        entry.updated_at = shared::util::now_millis();
        entry.last_origin = origin;
        Ok(())
    }

    async fn list_recently_updated(
        &self,
        store_id: &str,
        since_millis: i64,
    ) -> SyncResult<Vec<StoredOrder>> {
        let mut orders: Vec<StoredOrder> = self
            .orders
            .iter()
            .filter(|o| o.store_id == store_id && o.updated_at >= since_millis)
            .map(|o| o.clone())
            .collect();
        orders.sort_by_key(|o| o.updated_at);
        Ok(orders)
    }

    async fn mark_synced(&self, order_id: &str, at_millis: i64) -> SyncResult<()> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| SyncError::store(format!("Order {order_id} not found")))?;
        entry.synced_at = Some(at_millis);
        Ok(())
    }

    async fn resolve_product_mapping(
        &self,
        store_id: &str,
        platform_product_id: &str,
        platform_variant_id: Option<&str>,
    ) -> SyncResult<Option<String>> {
        Ok(self
            .product_mappings
            .get(&mapping_key(store_id, platform_product_id, platform_variant_id))
            .map(|v| v.clone()))
    }
}

/// Job store with terminal-state enforcement
#[derive(Default)]
pub struct InMemorySyncJobStore {
    jobs: DashMap<Uuid, SyncJob>,
}

impl InMemorySyncJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> SyncResult<()>
    where
        F: FnOnce(&mut SyncJob),
    {
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| SyncError::store(format!("Job {id} not found")))?;
        if job.status.is_terminal() {
            return Err(SyncError::store(format!(
                "Job {id} is terminal ({:?}) and cannot change",
                job.status
            )));
        }
        apply(&mut job);
        Ok(())
    }
}

#[async_trait]
impl SyncJobStore for InMemorySyncJobStore {
    async fn insert(&self, job: SyncJob) -> SyncResult<()> {
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SyncResult<Option<SyncJob>> {
        Ok(self.jobs.get(&id).map(|j| j.clone()))
    }

    async fn mark_running(&self, id: Uuid) -> SyncResult<()> {
        self.update(id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(shared::util::now_millis());
        })
    }

    async fn complete(&self, id: Uuid, total: u32, processed: u32, failed: u32) -> SyncResult<()> {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.items_total = total;
            job.items_processed = processed;
            job.items_failed = failed;
            job.completed_at = Some(shared::util::now_millis());
        })
    }

    async fn fail(&self, id: Uuid, error: &str) -> SyncResult<()> {
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.completed_at = Some(shared::util::now_millis());
        })
    }

    async fn record_retry(&self, id: Uuid) -> SyncResult<()> {
        self.update(id, |job| {
            job.retry_count += 1;
        })
    }

    async fn recent_jobs(&self, store_id: &str, limit: usize) -> SyncResult<Vec<SyncJob>> {
        let mut jobs: Vec<SyncJob> = self
            .jobs
            .iter()
            .filter(|j| j.store_id == store_id)
            .map(|j| j.clone())
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn running_jobs(&self) -> SyncResult<Vec<SyncJob>> {
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .map(|j| j.clone())
            .collect())
    }
}

/// Static credential map
#[derive(Default)]
pub struct InMemoryCredentialResolver {
    credentials: DashMap<String, PlatformCredentials>,
}

impl InMemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, store_id: impl Into<String>, creds: PlatformCredentials) {
        self.credentials.insert(store_id.into(), creds);
    }
}

#[async_trait]
impl CredentialResolver for InMemoryCredentialResolver {
    async fn get_credentials(&self, store_id: &str) -> SyncResult<Option<PlatformCredentials>> {
        Ok(self.credentials.get(store_id).map(|c| c.clone()))
    }
}
