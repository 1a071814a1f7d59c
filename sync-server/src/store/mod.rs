//! Collaborator interfaces
//!
//! The engine depends on these traits, never on a concrete backend. The
//! relational store, credential vault and product mapping live outside
//! this core; [`memory`] provides in-memory implementations for tests
//! and the default dev wiring.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use shared::models::order::{CanonicalOrder, FinancialStatus, FulfillmentStatus, OrderStatus};
use shared::models::sync_job::SyncJob;
use shared::platform::PlatformCredentials;

use crate::utils::SyncResult;

pub use memory::{InMemoryCredentialResolver, InMemoryOrderStore, InMemorySyncJobStore};

/// Who last wrote an order's status.
///
/// The push selector skips orders whose last write came from the pull
/// path, so a pull never echoes straight back to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOrigin {
    Pull,
    Local,
}

/// A persisted order plus its sync bookkeeping
#[derive(Debug, Clone)]
pub struct StoredOrder {
    /// Local order id
    pub id: String,
    pub store_id: String,
    pub order: CanonicalOrder,
    /// Unix millis of the last write
    pub updated_at: i64,
    pub last_origin: SyncOrigin,
    /// Unix millis of the last successful push, if any
    pub synced_at: Option<i64>,
}

/// Order persistence collaborator
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_platform_id(
        &self,
        store_id: &str,
        platform_order_id: &str,
    ) -> SyncResult<Option<StoredOrder>>;

    /// Insert a new canonical order; returns the local order id
    async fn create_order(
        &self,
        store_id: &str,
        order: &CanonicalOrder,
        origin: SyncOrigin,
    ) -> SyncResult<String>;

    async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        financial_status: FinancialStatus,
        fulfillment_status: FulfillmentStatus,
        origin: SyncOrigin,
    ) -> SyncResult<()>;

    /// Orders written since `since_millis`, oldest first
    async fn list_recently_updated(
        &self,
        store_id: &str,
        since_millis: i64,
    ) -> SyncResult<Vec<StoredOrder>>;

    async fn mark_synced(&self, order_id: &str, at_millis: i64) -> SyncResult<()>;

    /// Map a platform product/variant to the local variant id
    async fn resolve_product_mapping(
        &self,
        store_id: &str,
        platform_product_id: &str,
        platform_variant_id: Option<&str>,
    ) -> SyncResult<Option<String>>;
}

/// Sync job persistence collaborator
///
/// Terminal jobs (completed/failed) are immutable — implementations
/// reject transitions out of them.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    async fn insert(&self, job: SyncJob) -> SyncResult<()>;
    async fn get(&self, id: Uuid) -> SyncResult<Option<SyncJob>>;
    async fn mark_running(&self, id: Uuid) -> SyncResult<()>;
    async fn complete(&self, id: Uuid, total: u32, processed: u32, failed: u32) -> SyncResult<()>;
    async fn fail(&self, id: Uuid, error: &str) -> SyncResult<()>;
    /// Bump retry_count before another attempt of the same job
    async fn record_retry(&self, id: Uuid) -> SyncResult<()>;
    /// Most recent jobs for a store, newest first
    async fn recent_jobs(&self, store_id: &str, limit: usize) -> SyncResult<Vec<SyncJob>>;
    async fn running_jobs(&self) -> SyncResult<Vec<SyncJob>>;
}

/// Credential vault collaborator — decryption happens behind this trait
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn get_credentials(&self, store_id: &str) -> SyncResult<Option<PlatformCredentials>>;
}
