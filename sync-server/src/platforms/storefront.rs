//! Custom storefront adapter
//!
//! Plain bearer-token REST against the merchant's own storefront. No
//! partner signature — the storefront trusts its own issued tokens.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use shared::platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};

use super::{AdapterStack, PlatformAdapter, target_key};
use crate::utils::{SyncError, SyncResult};

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<serde_json::Value>,
    #[serde(default)]
    has_more: bool,
}

pub struct StorefrontAdapter {
    client: reqwest::Client,
    base_url: String,
    stack: AdapterStack,
}

impl StorefrontAdapter {
    pub fn new(base_url: impl Into<String>, stack: AdapterStack) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SyncError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            stack,
        })
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
                format!("Storefront request failed: {body}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl PlatformAdapter for StorefrontAdapter {
    fn platform(&self) -> Platform {
        Platform::Storefront
    }

    async fn authenticate(&self, creds: &PlatformCredentials) -> SyncResult<()> {
        let key = target_key(self.platform(), creds);
        let url = format!("{}/api/me", self.base_url);
        let url = &url;

        self.stack
            .call(&key, || async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&creds.access_token)
                    .send()
                    .await?;
                Self::check_status(response).await?;
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
        let mut url = format!(
            "{}/api/orders?created_from={}&created_to={}&limit={}&page={}",
            self.base_url, query.start, query.end, query.limit, query.page,
        );
        if let Some(status) = &query.status {
            url.push_str(&format!("&status={status}"));
        }
        let url = &url;

        self.stack
            .call(&key, || async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&creds.access_token)
                    .send()
                    .await?;
                let response = Self::check_status(response).await?;
                let page: OrdersPage = response.json().await?;
                Ok(PlatformOrderPage {
                    has_more: page.has_more,
                    next_page: query.page + 1,
                    orders: page.orders,
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
        let url = format!("{}/api/orders/{}/status", self.base_url, platform_order_id);
        let mut body = serde_json::json!({ "status": platform_status });
        if let Some(details) = fulfillment {
            body["tracking_number"] = serde_json::json!(details.tracking_number);
            body["carrier"] = serde_json::json!(details.carrier);
        }
        let url = &url;
        let body = &body;

        self.stack
            .call(&key, || async move {
                let response = self
                    .client
                    .put(url)
                    .bearer_auth(&creds.access_token)
                    .json(body)
                    .send()
                    .await?;
                Self::check_status(response).await?;
                Ok(())
            })
            .await
    }
}
