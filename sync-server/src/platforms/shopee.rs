//! Shopee Open Platform adapter
//!
//! Partner-signed v2 API: every call carries `partner_id`, a fresh UNIX
//! timestamp and an HMAC-SHA256 signature; shop-scoped endpoints add the
//! access token and shop id to the signature base.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use shared::platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};

use super::{AdapterStack, PlatformAdapter, RequestSigner, target_key};
use crate::utils::{SyncError, SyncResult};

const ORDER_LIST_PATH: &str = "/api/v2/order/get_order_list";
const SHOP_INFO_PATH: &str = "/api/v2/shop/get_shop_info";
const UPDATE_STATUS_PATH: &str = "/api/v2/order/update_status";

/// Shopee API envelope: a non-empty `error` field means failure even on 200
#[derive(Debug, Deserialize)]
struct ShopeeEnvelope<T> {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OrderListResponse {
    #[serde(default)]
    order_list: Vec<serde_json::Value>,
    #[serde(default)]
    more: bool,
}

pub struct ShopeeAdapter {
    client: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
    stack: AdapterStack,
}

impl ShopeeAdapter {
    pub fn new(
        base_url: impl Into<String>,
        partner_id: impl Into<String>,
        partner_secret: &str,
        stack: AdapterStack,
    ) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SyncError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            signer: RequestSigner::new(partner_id, partner_secret),
            stack,
        })
    }

    /// Signed URL for a shop-scoped path
    fn signed_url(&self, path: &str, creds: &PlatformCredentials) -> String {
        let shop_id = creds.shop_id.as_deref();
        let (timestamp, sign) = self
            .signer
            .sign_now(path, Some(&creds.access_token), shop_id);
        let mut url = format!(
            "{}{}?partner_id={}&timestamp={}&sign={}&access_token={}",
            self.base_url,
            path,
            self.signer.partner_id(),
            timestamp,
            sign,
            creds.access_token,
        );
        if let Some(shop) = shop_id {
            url.push_str(&format!("&shop_id={shop}"));
        }
        url
    }

    /// Decode the Shopee envelope, folding API-level errors into `SyncError`
    fn unwrap_envelope<T>(envelope: ShopeeEnvelope<T>) -> SyncResult<T> {
        if !envelope.error.is_empty() {
            return Err(SyncError::platform(
                format!("Shopee API error {}: {}", envelope.error, envelope.message),
                // error.* codes starting with "error_server" are transient
                envelope.error.starts_with("error_server"),
            ));
        }
        envelope
            .response
            .ok_or_else(|| SyncError::platform("Shopee response missing body", false))
    }

    async fn check_status(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(SyncError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::platform_status(
                status.as_u16(),
                format!("Shopee request failed: {body}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl PlatformAdapter for ShopeeAdapter {
    fn platform(&self) -> Platform {
        Platform::Shopee
    }

    async fn authenticate(&self, creds: &PlatformCredentials) -> SyncResult<()> {
        let key = target_key(self.platform(), creds);

        self.stack
            .call(&key, || async move {
                // Re-sign per attempt: timestamps must be fresh
                let url = self.signed_url(SHOP_INFO_PATH, creds);
                let response = self.client.get(&url).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: ShopeeEnvelope<serde_json::Value> = response.json().await?;
                Self::unwrap_envelope(envelope)?;
                Ok(())
            })
            .await
    }

    async fn fetch_orders(
        &self,
        creds: &PlatformCredentials,
        query: &FetchOrdersQuery,
    ) -> SyncResult<PlatformOrderPage> {
        let key = target_key(self.platform(), creds);

        self.stack
            .call(&key, || async move {
                // Shopee windows are in UNIX seconds; re-sign per attempt
                let mut url = format!(
                    "{}&time_range_field=create_time&time_from={}&time_to={}&page_size={}&page_no={}",
                    self.signed_url(ORDER_LIST_PATH, creds),
                    query.start / 1000,
                    query.end / 1000,
                    query.limit,
                    query.page,
                );
                if let Some(status) = &query.status {
                    url.push_str(&format!("&order_status={status}"));
                }
                let response = self.client.get(&url).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: ShopeeEnvelope<OrderListResponse> = response.json().await?;
                let body = Self::unwrap_envelope(envelope)?;
                Ok(PlatformOrderPage {
                    has_more: body.more,
                    next_page: query.page + 1,
                    orders: body.order_list,
                })
            })
            .await
    }

    async fn update_order_status(
        &self,
        creds: &PlatformCredentials,
        platform_order_id: &str,
        platform_status: &str,
        fulfillment: Option<&FulfillmentDetails>,
    ) -> SyncResult<()> {
        let key = target_key(self.platform(), creds);
        let mut payload = serde_json::json!({
            "order_sn": platform_order_id,
            "order_status": platform_status,
        });
        if let Some(details) = fulfillment {
            payload["tracking_number"] = serde_json::json!(details.tracking_number);
            payload["shipping_carrier"] = serde_json::json!(details.carrier);
        }
        let payload = &payload;

        self.stack
            .call(&key, || async move {
                let url = self.signed_url(UPDATE_STATUS_PATH, creds);
                let response = self.client.post(&url).json(payload).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: ShopeeEnvelope<serde_json::Value> = response.json().await?;
                Self::unwrap_envelope(envelope)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_maps_to_platform_error() {
        let envelope: ShopeeEnvelope<OrderListResponse> = serde_json::from_str(
            r#"{"error":"error_param","message":"bad page size","response":null}"#,
        )
        .unwrap();
        let err = ShopeeAdapter::unwrap_envelope(envelope).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("error_param"));
    }

    #[test]
    fn test_envelope_server_error_is_retryable() {
        let envelope: ShopeeEnvelope<OrderListResponse> = serde_json::from_str(
            r#"{"error":"error_server_busy","message":"try later","response":null}"#,
        )
        .unwrap();
        let err = ShopeeAdapter::unwrap_envelope(envelope).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_envelope_success_unwraps() {
        let envelope: ShopeeEnvelope<OrderListResponse> = serde_json::from_str(
            r#"{"error":"","message":"","response":{"order_list":[{"order_sn":"X1"}],"more":true}}"#,
        )
        .unwrap();
        let body = ShopeeAdapter::unwrap_envelope(envelope).unwrap();
        assert_eq!(body.order_list.len(), 1);
        assert!(body.more);
    }
}
