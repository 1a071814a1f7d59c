//! TikTok Shop adapter
//!
//! App-signed REST API. TikTok reports failures through a numeric `code`
//! (0 = success) and paginates with an opaque page token folded into our
//! numeric paging.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use shared::platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};

use super::{AdapterStack, PlatformAdapter, RequestSigner, target_key};
use crate::utils::{SyncError, SyncResult};

const ORDER_SEARCH_PATH: &str = "/api/orders/search";
const SHOP_AUTH_PATH: &str = "/api/shop/get_authorized_shop";
const STATUS_UPDATE_PATH: &str = "/api/orders/status";

/// TikTok envelope: `code` 0 = success; 5xxxx codes are transient
#[derive(Debug, Deserialize)]
struct TiktokEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OrderSearchData {
    #[serde(default)]
    order_list: Vec<serde_json::Value>,
    #[serde(default)]
    more: bool,
}

pub struct TiktokAdapter {
    client: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
    stack: AdapterStack,
}

impl TiktokAdapter {
    pub fn new(
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: &str,
        stack: AdapterStack,
    ) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SyncError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            signer: RequestSigner::new(app_key, app_secret),
            stack,
        })
    }

    fn signed_url(&self, path: &str, creds: &PlatformCredentials) -> String {
        let (timestamp, sign) =
            self.signer
                .sign_now(path, Some(&creds.access_token), creds.shop_id.as_deref());
        let mut url = format!(
            "{}{}?app_key={}&timestamp={}&sign={}&access_token={}",
            self.base_url,
            path,
            self.signer.partner_id(),
            timestamp,
            sign,
            creds.access_token,
        );
        if let Some(shop) = &creds.shop_id {
            url.push_str(&format!("&shop_id={shop}"));
        }
        url
    }

    fn unwrap_envelope<T>(envelope: TiktokEnvelope<T>) -> SyncResult<T> {
        if envelope.code != 0 {
            return Err(SyncError::platform(
                format!("TikTok API error {}: {}", envelope.code, envelope.message),
                (50_000..60_000).contains(&envelope.code),
            ));
        }
        envelope
            .data
            .ok_or_else(|| SyncError::platform("TikTok response missing data", false))
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
                format!("TikTok request failed: {body}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl PlatformAdapter for TiktokAdapter {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn authenticate(&self, creds: &PlatformCredentials) -> SyncResult<()> {
        let key = target_key(self.platform(), creds);

        self.stack
            .call(&key, || async move {
                let url = self.signed_url(SHOP_AUTH_PATH, creds);
                let response = self.client.get(&url).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: TiktokEnvelope<serde_json::Value> = response.json().await?;
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
        let mut body = serde_json::json!({
            "create_time_from": query.start / 1000,
            "create_time_to": query.end / 1000,
            "page_size": query.limit,
            "page_number": query.page,
        });
        if let Some(status) = &query.status {
            body["order_status"] = serde_json::json!(status);
        }
        let body = &body;

        self.stack
            .call(&key, || async move {
                let url = self.signed_url(ORDER_SEARCH_PATH, creds);
                let response = self.client.post(&url).json(body).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: TiktokEnvelope<OrderSearchData> = response.json().await?;
                let data = Self::unwrap_envelope(envelope)?;
                Ok(PlatformOrderPage {
                    has_more: data.more,
                    next_page: query.page + 1,
                    orders: data.order_list,
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
        let mut body = serde_json::json!({
            "order_id": platform_order_id,
            "order_status": platform_status,
        });
        if let Some(details) = fulfillment {
            body["tracking_number"] = serde_json::json!(details.tracking_number);
            body["shipping_provider"] = serde_json::json!(details.carrier);
        }
        let body = &body;

        self.stack
            .call(&key, || async move {
                let url = self.signed_url(STATUS_UPDATE_PATH, creds);
                let response = self.client.post(&url).json(body).send().await?;
                let response = Self::check_status(response).await?;
                let envelope: TiktokEnvelope<serde_json::Value> = response.json().await?;
                Self::unwrap_envelope(envelope)?;
                Ok(())
            })
            .await
    }
}
