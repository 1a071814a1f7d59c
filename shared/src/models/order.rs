//! Canonical Order Model
//!
//! Platform-agnostic representation of a marketplace order after
//! normalization. Every platform payload is transformed into this shape
//! before it touches the order store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// Payment state, tracked independently of the lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
}

/// Fulfillment progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    Partial,
    Fulfilled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinancialStatus::Pending => "pending",
            FinancialStatus::Paid => "paid",
            FinancialStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FulfillmentStatus::Unfulfilled => "unfulfilled",
            FulfillmentStatus::Partial => "partial",
            FulfillmentStatus::Fulfilled => "fulfilled",
        };
        write!(f, "{s}")
    }
}

/// The (status, financial, fulfillment) tuple a platform status maps to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusTriple {
    pub status: OrderStatus,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
}

impl StatusTriple {
    pub const fn new(
        status: OrderStatus,
        financial_status: FinancialStatus,
        fulfillment_status: FulfillmentStatus,
    ) -> Self {
        Self {
            status,
            financial_status,
            fulfillment_status,
        }
    }
}

/// Buyer details carried on a canonical order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: String,
    pub address: Option<String>,
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Platform product reference
    pub product_id: String,
    /// Platform variant reference, if the platform distinguishes variants
    pub variant_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    /// Unit price in order currency
    pub price: Decimal,
    /// Local variant resolved through the product mapping, if any
    pub local_variant_id: Option<String>,
}

/// Monetary totals, all in the order currency
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Canonical order — unique per (store_id, platform_order_id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalOrder {
    /// Platform-side order ID, unique within a store
    pub platform_order_id: String,
    /// Human-facing order number
    pub order_number: String,
    pub customer: CustomerInfo,
    pub status: OrderStatus,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    /// ISO 4217 currency code
    pub currency: String,
    pub ordered_at: chrono::DateTime<chrono::Utc>,
    /// Raw platform payload, kept opaque for audits and re-normalization
    #[serde(default)]
    pub platform_data: serde_json::Value,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CanonicalOrder {
    /// Whether any of the three status dimensions differs from `other`.
    ///
    /// The pull path uses this to skip redundant store writes.
    pub fn status_differs(&self, other: &CanonicalOrder) -> bool {
        self.status != other.status
            || self.financial_status != other.financial_status
            || self.fulfillment_status != other.fulfillment_status
    }

    pub fn status_triple(&self) -> StatusTriple {
        StatusTriple::new(self.status, self.financial_status, self.fulfillment_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Shipped).unwrap(),
            "\"shipped\""
        );
        assert_eq!(
            serde_json::from_str::<FulfillmentStatus>("\"unfulfilled\"").unwrap(),
            FulfillmentStatus::Unfulfilled
        );
    }

    #[test]
    fn test_default_triple_is_fallback() {
        let triple = StatusTriple::default();
        assert_eq!(triple.status, OrderStatus::Pending);
        assert_eq!(triple.financial_status, FinancialStatus::Pending);
        assert_eq!(triple.fulfillment_status, FulfillmentStatus::Unfulfilled);
    }

    #[test]
    fn test_status_differs() {
        let base = CanonicalOrder {
            platform_order_id: "SO-1".into(),
            order_number: "1001".into(),
            customer: CustomerInfo {
                name: "Ana".into(),
                city: "Madrid".into(),
                ..Default::default()
            },
            status: OrderStatus::Pending,
            financial_status: FinancialStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            items: vec![],
            totals: OrderTotals::default(),
            currency: "EUR".into(),
            ordered_at: chrono::Utc::now(),
            platform_data: serde_json::Value::Null,
            notes: None,
            tags: vec![],
        };

        let mut shipped = base.clone();
        shipped.status = OrderStatus::Shipped;
        assert!(base.status_differs(&shipped));
        assert!(!base.status_differs(&base.clone()));
    }
}
