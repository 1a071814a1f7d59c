//! Order synchronization engine
//!
//! Orchestrates pull (import/update from platform) and push (status
//! propagation to platform) per store. Every order is processed in
//! isolation — one bad payload never aborts the batch — and each run ends
//! by invoking the monitor's completion hook, the only coupling between
//! execution and alerting policy.

pub mod report;

use std::sync::Arc;

use shared::models::order::CanonicalOrder;
use shared::models::store::StoreConfig;
use shared::platform::{FetchOrdersQuery, PlatformCredentials};

use crate::monitor::OrderSyncMonitor;
use crate::normalizer::OrderDataNormalizer;
use crate::platforms::{AdapterRegistry, PlatformAdapter};
use crate::store::{CredentialResolver, OrderStore, SyncOrigin};
use crate::utils::time::{pull_window_millis, push_window_start_millis};
use crate::utils::{SyncError, SyncErrorDetail, SyncResult};

pub use report::SyncReport;

/// Which direction(s) a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Pull,
    Push,
    Bidirectional,
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub direction: SyncDirection,
    /// Pull window, trailing days
    pub pull_window_days: i64,
    /// Push window, trailing hours
    pub push_window_hours: i64,
    /// Page size for platform fetches
    pub batch_size: u32,
    /// Run the full pipeline without persistence or outbound writes
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            direction: SyncDirection::Bidirectional,
            pull_window_days: 7,
            push_window_hours: 24,
            batch_size: 50,
            dry_run: false,
        }
    }
}

pub struct OrderSyncEngine {
    adapters: Arc<AdapterRegistry>,
    normalizer: Arc<OrderDataNormalizer>,
    orders: Arc<dyn OrderStore>,
    credentials: Arc<dyn CredentialResolver>,
    monitor: Arc<OrderSyncMonitor>,
}

impl OrderSyncEngine {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        normalizer: Arc<OrderDataNormalizer>,
        orders: Arc<dyn OrderStore>,
        credentials: Arc<dyn CredentialResolver>,
        monitor: Arc<OrderSyncMonitor>,
    ) -> Self {
        Self {
            adapters,
            normalizer,
            orders,
            credentials,
            monitor,
        }
    }

    /// Run one sync for one store.
    ///
    /// Missing adapter or credentials abort only this store's sync (the
    /// caller's organization loop continues). Per-order failures are
    /// folded into the report, never raised.
    pub async fn sync_store(
        &self,
        store: &StoreConfig,
        options: &SyncOptions,
    ) -> SyncResult<SyncReport> {
        let adapter = self.adapters.get(store.platform).ok_or_else(|| {
            SyncError::config(format!("No adapter registered for {}", store.platform))
        })?;

        let creds = self
            .credentials
            .get_credentials(&store.id)
            .await?
            .ok_or_else(|| {
                SyncError::config(format!("No credentials configured for store {}", store.id))
            })?;
        if creds.is_expired(shared::util::now_millis()) {
            return Err(SyncError::config(format!(
                "Credentials expired for store {}",
                store.id
            )));
        }

        tracing::info!(
            store = %store.id,
            platform = %store.platform,
            direction = ?options.direction,
            dry_run = options.dry_run,
            "Starting sync"
        );

        let mut report = SyncReport::default();
        match options.direction {
            SyncDirection::Pull => {
                report.merge(self.pull(store, adapter.as_ref(), &creds, options).await);
            }
            SyncDirection::Push => {
                report.merge(self.push(store, adapter.as_ref(), &creds, options).await);
            }
            SyncDirection::Bidirectional => {
                report.merge(self.pull(store, adapter.as_ref(), &creds, options).await);
                report.merge(self.push(store, adapter.as_ref(), &creds, options).await);
            }
        }

        tracing::info!(
            store = %store.id,
            total = report.total_processed,
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            status_updates = report.status_updates,
            "Sync finished"
        );

        // Sole integration point between execution and alerting policy
        self.monitor.on_sync_complete(store, &report).await;

        Ok(report)
    }

    // ========================================================================
    // Pull: platform → local store
    // ========================================================================

    async fn pull(
        &self,
        store: &StoreConfig,
        adapter: &dyn PlatformAdapter,
        creds: &PlatformCredentials,
        options: &SyncOptions,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let (start, end) = pull_window_millis(options.pull_window_days);
        let mut page = 1u32;

        loop {
            let query = FetchOrdersQuery {
                start,
                end,
                limit: options.batch_size,
                page,
                status: None,
            };

            let fetched = match adapter.fetch_orders(creds, &query).await {
                Ok(page) => page,
                Err(e) => {
                    // Page-level failure: keep what already processed
                    tracing::error!(store = %store.id, page, error = %e, "Order fetch failed");
                    report.errors.push(SyncErrorDetail::from_error(None, &e));
                    break;
                }
            };

            // Empty page ends the walk regardless of has_more
            if fetched.orders.is_empty() {
                if page == 1 {
                    tracing::debug!(store = %store.id, "No orders in pull window");
                }
                break;
            }

            // Strictly in platform-returned order
            for raw in &fetched.orders {
                self.process_pull_order(store, raw, options.dry_run, &mut report)
                    .await;
            }

            if !fetched.has_more {
                break;
            }
            page = fetched.next_page;
        }

        report
    }

    /// One order, isolated: a failure is recorded and the batch moves on
    async fn process_pull_order(
        &self,
        store: &StoreConfig,
        raw: &serde_json::Value,
        dry_run: bool,
        report: &mut SyncReport,
    ) {
        report.total_processed += 1;

        let mut order = match self.normalizer.normalize_order(store.platform, raw) {
            Ok(order) => order,
            Err(e) => {
                let order_id = raw_order_id(raw);
                tracing::warn!(
                    store = %store.id,
                    order = order_id.as_deref().unwrap_or("<unknown>"),
                    error = %e,
                    "Order rejected during normalization"
                );
                report.failed += 1;
                report.errors.push(SyncErrorDetail::from_error(order_id, &e));
                return;
            }
        };

        if let Err(e) = self.resolve_item_mappings(store, &mut order).await {
            report.failed += 1;
            report
                .errors
                .push(SyncErrorDetail::from_error(Some(order.platform_order_id.clone()), &e));
            return;
        }

        let existing = match self
            .orders
            .find_by_platform_id(&store.id, &order.platform_order_id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                report.failed += 1;
                report
                    .errors
                    .push(SyncErrorDetail::from_error(Some(order.platform_order_id.clone()), &e));
                return;
            }
        };

        let result = match existing {
            None => {
                let write = if dry_run {
                    Ok(String::new())
                } else {
                    self.orders
                        .create_order(&store.id, &order, SyncOrigin::Pull)
                        .await
                };
                write.map(|_| report.imported += 1)
            }
            Some(stored) if stored.order.status_differs(&order) => {
                let write = if dry_run {
                    Ok(())
                } else {
                    self.orders
                        .update_order_status(
                            &stored.id,
                            order.status,
                            order.financial_status,
                            order.fulfillment_status,
                            SyncOrigin::Pull,
                        )
                        .await
                };
                write.map(|()| report.updated += 1)
            }
            Some(_) => {
                // No redundant writes
                report.skipped += 1;
                Ok(())
            }
        };

        if let Err(e) = result {
            report.failed += 1;
            report
                .errors
                .push(SyncErrorDetail::from_error(Some(order.platform_order_id.clone()), &e));
        }
    }

    /// Fill local_variant_id from the product mapping where one exists
    async fn resolve_item_mappings(
        &self,
        store: &StoreConfig,
        order: &mut CanonicalOrder,
    ) -> SyncResult<()> {
        for item in &mut order.items {
            item.local_variant_id = self
                .orders
                .resolve_product_mapping(&store.id, &item.product_id, item.variant_id.as_deref())
                .await?;
        }
        Ok(())
    }

    // ========================================================================
    // Push: local store → platform
    // ========================================================================

    async fn push(
        &self,
        store: &StoreConfig,
        adapter: &dyn PlatformAdapter,
        creds: &PlatformCredentials,
        options: &SyncOptions,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let since = push_window_start_millis(options.push_window_hours);

        let candidates = match self.orders.list_recently_updated(&store.id, since).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(store = %store.id, error = %e, "Failed to load push candidates");
                report.errors.push(SyncErrorDetail::from_error(None, &e));
                return report;
            }
        };

        for stored in candidates {
            // Provenance: a write the pull path just applied must not echo
            // straight back to the platform
            if stored.last_origin == SyncOrigin::Pull {
                continue;
            }
            // Already propagated since its last local change
            if stored.synced_at.is_some_and(|at| at >= stored.updated_at) {
                continue;
            }

            report.total_processed += 1;

            let platform_status = match self
                .normalizer
                .reverse_transform_status(store.platform, stored.order.status)
            {
                Ok(status) => status,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(SyncErrorDetail::from_error(
                        Some(stored.order.platform_order_id.clone()),
                        &e,
                    ));
                    continue;
                }
            };

            if options.dry_run {
                report.status_updates += 1;
                continue;
            }

            match adapter
                .update_order_status(creds, &stored.order.platform_order_id, &platform_status, None)
                .await
            {
                Ok(()) => {
                    report.status_updates += 1;
                    if let Err(e) = self
                        .orders
                        .mark_synced(&stored.id, shared::util::now_millis())
                        .await
                    {
                        tracing::error!(order = %stored.id, error = %e, "Failed to mark order synced");
                    }
                }
                Err(e) => {
                    // No inline retry — the next scheduled pass owns it
                    tracing::warn!(
                        store = %store.id,
                        order = %stored.order.platform_order_id,
                        error = %e,
                        "Status push failed"
                    );
                    report.failed += 1;
                    report.errors.push(SyncErrorDetail::from_error(
                        Some(stored.order.platform_order_id.clone()),
                        &e,
                    ));
                }
            }
        }

        report
    }
}

/// Best-effort order id from a raw payload, for error labelling
fn raw_order_id(raw: &serde_json::Value) -> Option<String> {
    raw.get("order_sn")
        .or_else(|| raw.get("order_id"))
        .or_else(|| raw.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
