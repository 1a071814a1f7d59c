//! Order data normalization
//!
//! Transforms raw platform payloads into the canonical order model and
//! translates status vocabularies in both directions. Transformers are
//! registered per platform — adding a marketplace never touches the
//! engine.

pub mod status_map;
pub mod transform;

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

use shared::models::order::{CanonicalOrder, OrderStatus, StatusTriple};
use shared::platform::Platform;

use crate::utils::{SyncError, SyncErrorDetail, SyncResult};

pub use status_map::StatusMapping;
pub use transform::{ShopeeOrderTransformer, StorefrontOrderTransformer, TiktokOrderTransformer};

/// Per-platform transform capability
pub trait PlatformOrderTransformer: Send + Sync {
    fn platform(&self) -> Platform;

    /// Decode one raw payload into a canonical order (pre-validation)
    fn transform_order(&self, raw: &serde_json::Value) -> SyncResult<CanonicalOrder>;

    /// Total status translation — unknown statuses fall back, never error
    fn transform_status(&self, platform_status: &str) -> StatusTriple;

    /// Local → platform vocabulary; unmapped statuses pass through as-is
    fn reverse_transform_status(&self, local: OrderStatus) -> String;
}

/// Outcome of a batch normalization: valid orders plus per-item errors
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub orders: Vec<CanonicalOrder>,
    pub errors: Vec<SyncErrorDetail>,
}

/// Transformer registry + post-transform validation
pub struct OrderDataNormalizer {
    transformers: DashMap<Platform, Arc<dyn PlatformOrderTransformer>>,
}

impl OrderDataNormalizer {
    pub fn new() -> Self {
        Self {
            transformers: DashMap::new(),
        }
    }

    /// Registry preloaded with the built-in marketplaces
    pub fn with_defaults() -> Self {
        let normalizer = Self::new();
        normalizer.register(Arc::new(ShopeeOrderTransformer::default()));
        normalizer.register(Arc::new(TiktokOrderTransformer::default()));
        normalizer.register(Arc::new(StorefrontOrderTransformer::default()));
        normalizer
    }

    pub fn register(&self, transformer: Arc<dyn PlatformOrderTransformer>) {
        self.transformers.insert(transformer.platform(), transformer);
    }

    fn transformer(&self, platform: Platform) -> SyncResult<Arc<dyn PlatformOrderTransformer>> {
        self.transformers
            .get(&platform)
            .map(|t| t.clone())
            .ok_or_else(|| SyncError::config(format!("No transformer registered for {platform}")))
    }

    /// Transform + validate one raw order
    pub fn normalize_order(
        &self,
        platform: Platform,
        raw: &serde_json::Value,
    ) -> SyncResult<CanonicalOrder> {
        let order = self.transformer(platform)?.transform_order(raw)?;
        validate_order(&order)?;
        Ok(order)
    }

    /// Normalize a batch independently; one bad order never aborts the rest
    pub fn normalize_batch(&self, platform: Platform, raws: &[serde_json::Value]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for raw in raws {
            match self.normalize_order(platform, raw) {
                Ok(order) => outcome.orders.push(order),
                Err(err) => {
                    let order_id = raw
                        .get("order_sn")
                        .or_else(|| raw.get("order_id"))
                        .or_else(|| raw.get("id"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    tracing::warn!(
                        platform = %platform,
                        order = order_id.as_deref().unwrap_or("<unknown>"),
                        error = %err,
                        "Order failed normalization"
                    );
                    outcome.errors.push(SyncErrorDetail::from_error(order_id, &err));
                }
            }
        }
        outcome
    }

    pub fn transform_status(&self, platform: Platform, platform_status: &str) -> SyncResult<StatusTriple> {
        Ok(self.transformer(platform)?.transform_status(platform_status))
    }

    pub fn reverse_transform_status(
        &self,
        platform: Platform,
        local: OrderStatus,
    ) -> SyncResult<String> {
        Ok(self.transformer(platform)?.reverse_transform_status(local))
    }
}

impl Default for OrderDataNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ── Post-transform validation ───────────────────────────────────────

/// Validate that a required string is non-empty.
fn validate_required_text(value: &str, field: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Canonical-order invariants checked after every transform
pub fn validate_order(order: &CanonicalOrder) -> SyncResult<()> {
    validate_required_text(&order.platform_order_id, "platform_order_id")?;
    validate_required_text(&order.customer.name, "customer.name")?;
    validate_required_text(&order.customer.city, "customer.city")?;
    validate_required_text(&order.currency, "currency")?;

    if order.items.is_empty() {
        return Err(SyncError::validation("order has no items"));
    }
    for (idx, item) in order.items.iter().enumerate() {
        validate_required_text(&item.product_id, &format!("items[{idx}].product_id"))?;
        validate_required_text(&item.name, &format!("items[{idx}].name"))?;
        if item.quantity == 0 {
            return Err(SyncError::validation(format!(
                "items[{idx}].quantity must be positive"
            )));
        }
        if item.price < Decimal::ZERO {
            return Err(SyncError::validation(format!(
                "items[{idx}].price must not be negative"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_storefront_raw(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "status": "paid",
            "customer": { "name": "Leo", "city": "Lyon" },
            "items": [ { "product_id": "sku-1", "name": "Pen", "quantity": 1, "price": 2.0 } ],
            "totals": { "subtotal": 2.0, "tax": 0.0, "shipping": 0.0, "discount": 0.0, "total": 2.0 },
            "currency": "EUR",
            "created_at": "2026-08-01T08:00:00Z"
        })
    }

    #[test]
    fn test_normalize_valid_order() {
        let normalizer = OrderDataNormalizer::with_defaults();
        let order = normalizer
            .normalize_order(Platform::Storefront, &valid_storefront_raw("o-1"))
            .unwrap();
        assert_eq!(order.platform_order_id, "o-1");
    }

    #[test]
    fn test_normalize_rejects_missing_customer() {
        let normalizer = OrderDataNormalizer::with_defaults();
        let mut raw = valid_storefront_raw("o-2");
        raw["customer"]["name"] = json!("");
        let err = normalizer
            .normalize_order(Platform::Storefront, &raw)
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_normalize_rejects_zero_quantity() {
        let normalizer = OrderDataNormalizer::with_defaults();
        let mut raw = valid_storefront_raw("o-3");
        raw["items"][0]["quantity"] = json!(0);
        assert!(normalizer.normalize_order(Platform::Storefront, &raw).is_err());
    }

    #[test]
    fn test_batch_collects_errors_without_aborting() {
        let normalizer = OrderDataNormalizer::with_defaults();
        let mut bad = valid_storefront_raw("o-bad");
        bad["items"] = json!([]);

        let raws = vec![
            valid_storefront_raw("o-a"),
            bad,
            valid_storefront_raw("o-b"),
        ];
        let outcome = normalizer.normalize_batch(Platform::Storefront, &raws);

        assert_eq!(outcome.orders.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].platform_order_id.as_deref(), Some("o-bad"));
    }

    #[test]
    fn test_status_wrappers_route_to_platform_table() {
        let normalizer = OrderDataNormalizer::with_defaults();

        let triple = normalizer
            .transform_status(Platform::Shopee, "COMPLETED")
            .unwrap();
        assert_eq!(triple.status, shared::models::order::OrderStatus::Delivered);

        // Unknown status is total: falls back, never errors
        let fallback = normalizer
            .transform_status(Platform::Shopee, "NOT_A_STATUS")
            .unwrap();
        assert_eq!(fallback, StatusTriple::default());

        let reverse = normalizer
            .reverse_transform_status(Platform::Shopee, shared::models::order::OrderStatus::Delivered)
            .unwrap();
        assert_eq!(reverse, "COMPLETED");
    }

    #[test]
    fn test_unregistered_platform_is_config_error() {
        let normalizer = OrderDataNormalizer::new();
        let err = normalizer
            .normalize_order(Platform::Shopee, &json!({}))
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
