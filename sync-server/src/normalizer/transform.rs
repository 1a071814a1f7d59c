//! Per-platform order transformers
//!
//! Decode each marketplace's raw order payload into the canonical model.
//! Malformed payloads become `Validation` errors (never retried); status
//! translation delegates to the platform's [`StatusMapping`].

use rust_decimal::Decimal;
use serde::Deserialize;

use shared::models::order::{
    CanonicalOrder, CustomerInfo, OrderItem, OrderStatus, OrderTotals, StatusTriple,
};
use shared::platform::Platform;
use shared::util::millis_to_datetime;

use super::PlatformOrderTransformer;
use super::status_map::StatusMapping;
use crate::utils::{SyncError, SyncResult};

fn decode_error(platform: Platform, e: serde_json::Error) -> SyncError {
    SyncError::validation(format!("Malformed {platform} order payload: {e}"))
}

fn ordered_at(platform: Platform, create_time_secs: Option<i64>) -> SyncResult<chrono::DateTime<chrono::Utc>> {
    let secs = create_time_secs
        .ok_or_else(|| SyncError::validation(format!("{platform} order missing create_time")))?;
    Ok(millis_to_datetime(secs * 1000))
}

// ============================================================================
// Shopee
// ============================================================================

#[derive(Debug, Deserialize)]
struct ShopeeAddress {
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    full_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShopeeItem {
    item_id: i64,
    #[serde(default)]
    item_name: String,
    #[serde(default)]
    model_id: Option<i64>,
    #[serde(default)]
    model_quantity_purchased: u32,
    #[serde(default, with = "rust_decimal::serde::float")]
    model_discounted_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ShopeeRawOrder {
    order_sn: String,
    #[serde(default)]
    order_status: String,
    create_time: Option<i64>,
    #[serde(default)]
    currency: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    estimated_shipping_fee: Decimal,
    recipient_address: Option<ShopeeAddress>,
    #[serde(default)]
    item_list: Vec<ShopeeItem>,
    #[serde(default)]
    message_to_seller: Option<String>,
}

pub struct ShopeeOrderTransformer {
    mapping: StatusMapping,
}

impl Default for ShopeeOrderTransformer {
    fn default() -> Self {
        Self {
            mapping: StatusMapping::shopee(),
        }
    }
}

impl PlatformOrderTransformer for ShopeeOrderTransformer {
    fn platform(&self) -> Platform {
        Platform::Shopee
    }

    fn transform_order(&self, raw: &serde_json::Value) -> SyncResult<CanonicalOrder> {
        let order: ShopeeRawOrder = serde_json::from_value(raw.clone())
            .map_err(|e| decode_error(self.platform(), e))?;

        let triple = self.transform_status(&order.order_status);
        let address = order.recipient_address.unwrap_or(ShopeeAddress {
            name: String::new(),
            phone: None,
            city: String::new(),
            full_address: None,
        });

        let items: Vec<OrderItem> = order
            .item_list
            .iter()
            .map(|item| OrderItem {
                product_id: item.item_id.to_string(),
                variant_id: item.model_id.map(|id| id.to_string()),
                name: item.item_name.clone(),
                quantity: item.model_quantity_purchased,
                price: item.model_discounted_price,
                local_variant_id: None,
            })
            .collect();

        let subtotal: Decimal = items
            .iter()
            .map(|i| i.price * Decimal::from(i.quantity))
            .sum();

        Ok(CanonicalOrder {
            platform_order_id: order.order_sn.clone(),
            order_number: order.order_sn,
            customer: CustomerInfo {
                name: address.name,
                email: None,
                phone: address.phone,
                city: address.city,
                address: address.full_address,
            },
            status: triple.status,
            financial_status: triple.financial_status,
            fulfillment_status: triple.fulfillment_status,
            items,
            totals: OrderTotals {
                subtotal,
                tax: Decimal::ZERO,
                shipping: order.estimated_shipping_fee,
                discount: Decimal::ZERO,
                total: order.total_amount,
            },
            currency: order.currency,
            ordered_at: ordered_at(self.platform(), order.create_time)?,
            platform_data: raw.clone(),
            notes: order.message_to_seller,
            tags: Vec::new(),
        })
    }

    fn transform_status(&self, platform_status: &str) -> StatusTriple {
        self.mapping.transform(platform_status)
    }

    fn reverse_transform_status(&self, local: OrderStatus) -> String {
        reverse_or_passthrough(&self.mapping, local)
    }
}

// ============================================================================
// TikTok Shop
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TiktokPayment {
    #[serde(default)]
    currency: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    sub_total: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    shipping_fee: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    taxes: Decimal,
}

#[derive(Debug, Deserialize)]
struct TiktokAddress {
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    full_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TiktokItem {
    product_id: String,
    #[serde(default)]
    product_name: String,
    #[serde(default)]
    sku_id: Option<String>,
    #[serde(default)]
    quantity: u32,
    #[serde(default, with = "rust_decimal::serde::float")]
    sale_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct TiktokRawOrder {
    order_id: String,
    #[serde(default)]
    order_status: String,
    create_time: Option<i64>,
    #[serde(default)]
    payment: Option<TiktokPayment>,
    recipient_address: Option<TiktokAddress>,
    #[serde(default)]
    item_list: Vec<TiktokItem>,
    #[serde(default)]
    buyer_message: Option<String>,
}

pub struct TiktokOrderTransformer {
    mapping: StatusMapping,
}

impl Default for TiktokOrderTransformer {
    fn default() -> Self {
        Self {
            mapping: StatusMapping::tiktok(),
        }
    }
}

impl PlatformOrderTransformer for TiktokOrderTransformer {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    fn transform_order(&self, raw: &serde_json::Value) -> SyncResult<CanonicalOrder> {
        let order: TiktokRawOrder = serde_json::from_value(raw.clone())
            .map_err(|e| decode_error(self.platform(), e))?;

        let triple = self.transform_status(&order.order_status);
        let payment = order.payment.unwrap_or_default();
        let address = order.recipient_address.unwrap_or(TiktokAddress {
            name: String::new(),
            phone_number: None,
            city: String::new(),
            full_address: None,
        });

        let items: Vec<OrderItem> = order
            .item_list
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id.clone(),
                variant_id: item.sku_id.clone(),
                name: item.product_name.clone(),
                quantity: item.quantity,
                price: item.sale_price,
                local_variant_id: None,
            })
            .collect();

        Ok(CanonicalOrder {
            platform_order_id: order.order_id.clone(),
            order_number: order.order_id,
            customer: CustomerInfo {
                name: address.name,
                email: None,
                phone: address.phone_number,
                city: address.city,
                address: address.full_address,
            },
            status: triple.status,
            financial_status: triple.financial_status,
            fulfillment_status: triple.fulfillment_status,
            items,
            totals: OrderTotals {
                subtotal: payment.sub_total,
                tax: payment.taxes,
                shipping: payment.shipping_fee,
                discount: Decimal::ZERO,
                total: payment.total_amount,
            },
            currency: payment.currency,
            ordered_at: ordered_at(self.platform(), order.create_time)?,
            platform_data: raw.clone(),
            notes: order.buyer_message,
            tags: Vec::new(),
        })
    }

    fn transform_status(&self, platform_status: &str) -> StatusTriple {
        self.mapping.transform(platform_status)
    }

    fn reverse_transform_status(&self, local: OrderStatus) -> String {
        reverse_or_passthrough(&self.mapping, local)
    }
}

// ============================================================================
// Storefront
// ============================================================================

#[derive(Debug, Deserialize)]
struct StorefrontCustomer {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StorefrontItem {
    product_id: String,
    #[serde(default)]
    variant_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    quantity: u32,
    #[serde(default, with = "rust_decimal::serde::float")]
    price: Decimal,
}

#[derive(Debug, Deserialize, Default)]
struct StorefrontTotals {
    #[serde(default, with = "rust_decimal::serde::float")]
    subtotal: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    tax: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    shipping: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    discount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    total: Decimal,
}

#[derive(Debug, Deserialize)]
struct StorefrontRawOrder {
    id: String,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    status: String,
    customer: Option<StorefrontCustomer>,
    #[serde(default)]
    items: Vec<StorefrontItem>,
    #[serde(default)]
    totals: Option<StorefrontTotals>,
    #[serde(default)]
    currency: String,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct StorefrontOrderTransformer {
    mapping: StatusMapping,
}

impl Default for StorefrontOrderTransformer {
    fn default() -> Self {
        Self {
            mapping: StatusMapping::storefront(),
        }
    }
}

impl PlatformOrderTransformer for StorefrontOrderTransformer {
    fn platform(&self) -> Platform {
        Platform::Storefront
    }

    fn transform_order(&self, raw: &serde_json::Value) -> SyncResult<CanonicalOrder> {
        let order: StorefrontRawOrder = serde_json::from_value(raw.clone())
            .map_err(|e| decode_error(self.platform(), e))?;

        let triple = self.transform_status(&order.status);
        let customer = order.customer.unwrap_or(StorefrontCustomer {
            name: String::new(),
            email: None,
            phone: None,
            city: String::new(),
            address: None,
        });
        let totals = order.totals.unwrap_or_default();

        let ordered_at = order.created_at.ok_or_else(|| {
            SyncError::validation("storefront order missing created_at")
        })?;

        Ok(CanonicalOrder {
            platform_order_id: order.id.clone(),
            order_number: order.number.unwrap_or(order.id),
            customer: CustomerInfo {
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                city: customer.city,
                address: customer.address,
            },
            status: triple.status,
            financial_status: triple.financial_status,
            fulfillment_status: triple.fulfillment_status,
            items: order
                .items
                .iter()
                .map(|item| OrderItem {
                    product_id: item.product_id.clone(),
                    variant_id: item.variant_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price: item.price,
                    local_variant_id: None,
                })
                .collect(),
            totals: OrderTotals {
                subtotal: totals.subtotal,
                tax: totals.tax,
                shipping: totals.shipping,
                discount: totals.discount,
                total: totals.total,
            },
            currency: order.currency,
            ordered_at,
            platform_data: raw.clone(),
            notes: order.notes,
            tags: order.tags,
        })
    }

    fn transform_status(&self, platform_status: &str) -> StatusTriple {
        self.mapping.transform(platform_status)
    }

    fn reverse_transform_status(&self, local: OrderStatus) -> String {
        reverse_or_passthrough(&self.mapping, local)
    }
}

/// Lossy fallback: an unmapped local status is sent as its own token.
/// The platform may reject it; the push path records that per order.
fn reverse_or_passthrough(mapping: &StatusMapping, local: OrderStatus) -> String {
    match mapping.reverse(local) {
        Some(token) => token.to_string(),
        None => {
            tracing::warn!(status = %local, "No reverse status mapping, passing local token through");
            local.to_string()
        }
    }
}
