//! Platform adapters
//!
//! Each marketplace implements the [`PlatformAdapter`] capability; the
//! engine depends only on this trait, never on wire formats. Adapters
//! route every outbound call through the shared resilience stack:
//! per-key FIFO queue + sliding-window rate limit, circuit breaker,
//! then exponential-backoff retry.

pub mod shopee;
pub mod signing;
pub mod storefront;
pub mod tiktok;

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

use shared::platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};

use crate::resilience::{CircuitBreakerRegistry, RequestQueue, RetryManager};
use crate::utils::SyncResult;

pub use shopee::ShopeeAdapter;
pub use signing::RequestSigner;
pub use storefront::StorefrontAdapter;
pub use tiktok::TiktokAdapter;

/// Capability every marketplace adapter implements
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Verify the credentials are usable (cheap API probe)
    async fn authenticate(&self, creds: &PlatformCredentials) -> SyncResult<()>;

    /// Fetch one page of raw orders for the query window
    async fn fetch_orders(
        &self,
        creds: &PlatformCredentials,
        query: &FetchOrdersQuery,
    ) -> SyncResult<PlatformOrderPage>;

    /// Push a status change for one order, in the platform's vocabulary
    async fn update_order_status(
        &self,
        creds: &PlatformCredentials,
        platform_order_id: &str,
        platform_status: &str,
        fulfillment: Option<&FulfillmentDetails>,
    ) -> SyncResult<()>;
}

/// Shared resilience stack threaded through every adapter call
///
/// Layering (outermost first): retry → circuit breaker → queue/limiter →
/// HTTP. A `CircuitOpen` fails fast before queueing and is not retried.
#[derive(Clone)]
pub struct AdapterStack {
    queue: Arc<RequestQueue>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryManager,
}

impl AdapterStack {
    pub fn new(
        queue: Arc<RequestQueue>,
        breakers: Arc<CircuitBreakerRegistry>,
        retry: RetryManager,
    ) -> Self {
        Self {
            queue,
            breakers,
            retry,
        }
    }

    /// Run one platform call under the full stack, keyed per target
    /// (`"{platform}:{shop}"`).
    pub async fn call<T, F, Fut>(&self, key: &str, op: F) -> SyncResult<T>
    where
        F: Fn() -> Fut + Sync,
        Fut: Future<Output = SyncResult<T>>,
    {
        let breaker = self.breakers.get_or_create(key);
        let op = &op;
        self.retry
            .execute(move || {
                let breaker = breaker.clone();
                async move { breaker.call(self.queue.execute(key, move || op())).await }
            })
            .await
    }
}

/// Platform → adapter lookup
///
/// Adding a marketplace means registering an implementation here; the
/// engine never changes.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).map(|a| a.clone())
    }

    pub fn registered(&self) -> Vec<Platform> {
        self.adapters.iter().map(|e| *e.key()).collect()
    }
}

/// Breaker/limiter key for one store on one platform
pub(crate) fn target_key(platform: Platform, creds: &PlatformCredentials) -> String {
    match &creds.shop_id {
        Some(shop) => format!("{platform}:{shop}"),
        None => format!("{platform}:global"),
    }
}
