//! Application state wiring
//!
//! Builds every component explicitly at startup and injects it where
//! needed — no ambient singletons, so tests can assemble the same graph
//! from parts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shared::models::store::StoreConfig;
use shared::platform::PlatformCredentials;

use super::config::Config;
use crate::engine::OrderSyncEngine;
use crate::monitor::{
    AlertRegistry, NotificationDispatcher, NotificationPolicy, OrderSyncMonitor,
};
use crate::normalizer::OrderDataNormalizer;
use crate::platforms::{
    AdapterRegistry, AdapterStack, ShopeeAdapter, StorefrontAdapter, TiktokAdapter,
};
use crate::resilience::{CircuitBreakerRegistry, RateLimiter, RequestQueue, RequestQueueConfig, RetryManager};
use crate::store::memory::{InMemoryCredentialResolver, InMemoryOrderStore, InMemorySyncJobStore};
use crate::store::{CredentialResolver, OrderStore, SyncJobStore};
use crate::utils::{SyncError, SyncResult};

pub struct AppState {
    pub config: Config,
    pub stores: Vec<StoreConfig>,
    pub engine: Arc<OrderSyncEngine>,
    pub monitor: Arc<OrderSyncMonitor>,
    pub orders: Arc<dyn OrderStore>,
    pub jobs: Arc<dyn SyncJobStore>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

impl AppState {
    /// Assemble the full component graph from configuration
    pub fn build(config: Config) -> SyncResult<Self> {
        // Resilience stack shared by all adapters
        let limiter = Arc::new(RateLimiter::new(config.rate_limiter_config()));
        let queue = Arc::new(RequestQueue::new(
            limiter,
            RequestQueueConfig {
                rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
                ..Default::default()
            },
        ));
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker_config()));
        let retry = RetryManager::new(config.retry_config());
        let stack = AdapterStack::new(queue, breakers.clone(), retry);

        // Adapters
        let adapters = Arc::new(AdapterRegistry::new());
        adapters.register(Arc::new(ShopeeAdapter::new(
            config.shopee_base_url.clone(),
            config.shopee_partner_id.clone(),
            &config.shopee_partner_key,
            stack.clone(),
        )?));
        adapters.register(Arc::new(TiktokAdapter::new(
            config.tiktok_base_url.clone(),
            config.tiktok_app_key.clone(),
            &config.tiktok_app_secret,
            stack.clone(),
        )?));
        adapters.register(Arc::new(StorefrontAdapter::new(
            config.storefront_base_url.clone(),
            stack,
        )?));

        // Collaborators — in-memory wiring; production swaps these for the
        // real store/vault behind the same traits
        let orders: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let jobs: Arc<dyn SyncJobStore> = Arc::new(InMemorySyncJobStore::new());

        let resolver = InMemoryCredentialResolver::new();
        if let Some(path) = &config.credentials_file {
            for (store_id, creds) in load_credentials(Path::new(path))? {
                resolver.put(store_id, creds);
            }
        }
        let credentials: Arc<dyn CredentialResolver> = Arc::new(resolver);

        let stores = match &config.stores_file {
            Some(path) => load_stores(Path::new(path))?,
            None => {
                tracing::warn!("STORES_FILE not set, no stores will sync");
                Vec::new()
            }
        };

        // Monitoring
        let dispatcher = Arc::new(NotificationDispatcher::new(NotificationPolicy {
            max_per_type_per_hour: config.notifications_per_type_per_hour,
            critical_cooldown: Duration::from_secs(config.critical_cooldown_secs),
        })?);
        let monitor = Arc::new(OrderSyncMonitor::new(
            Arc::new(AlertRegistry::new()),
            dispatcher.clone(),
            jobs.clone(),
            config.monitor_thresholds(),
            Duration::from_secs(config.escalation_delay_secs),
        ));

        let engine = Arc::new(OrderSyncEngine::new(
            adapters,
            Arc::new(OrderDataNormalizer::with_defaults()),
            orders.clone(),
            credentials.clone(),
            monitor.clone(),
        ));

        Ok(Self {
            config,
            stores,
            engine,
            monitor,
            orders,
            jobs,
            credentials,
            breakers,
            dispatcher,
        })
    }
}

/// Store list from a JSON file: `[{"id": ..., "organization_id": ...,
/// "platform": ..., "name": ..., "sync_enabled": ...}]`
fn load_stores(path: &Path) -> SyncResult<Vec<StoreConfig>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SyncError::config(format!("Failed to read stores file: {e}")))?;
    let stores: Vec<StoreConfig> = serde_json::from_str(&raw)?;
    tracing::info!(count = stores.len(), file = %path.display(), "Loaded store configs");
    Ok(stores)
}

/// Credential map from a JSON file: `{"store-id": {"access_token": ...}}`.
/// Decryption-at-rest belongs to the external vault, not this loader.
fn load_credentials(path: &Path) -> SyncResult<HashMap<String, PlatformCredentials>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SyncError::config(format!("Failed to read credentials file: {e}")))?;
    let creds: HashMap<String, PlatformCredentials> = serde_json::from_str(&raw)?;
    tracing::info!(count = creds.len(), "Loaded store credentials");
    Ok(creds)
}
