//! Platform wire types
//!
//! Request/response shapes the adapters speak. Raw order payloads stay
//! `serde_json::Value` — each platform's transformer owns the decoding.

use serde::{Deserialize, Serialize};

/// Marketplace identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopee,
    Tiktok,
    Storefront,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopee => "shopee",
            Platform::Tiktok => "tiktok",
            Platform::Storefront => "storefront",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credentials resolved for one store
///
/// Encryption-at-rest is the resolver's concern; adapters only see the
/// decrypted view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix millis
    pub expires_at: Option<i64>,
    /// Platform-side shop identifier, where the API requires one
    pub shop_id: Option<String>,
}

impl PlatformCredentials {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_millis)
    }
}

/// Query window for fetching orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOrdersQuery {
    /// Unix millis, inclusive
    pub start: i64,
    /// Unix millis, exclusive
    pub end: i64,
    /// Page size
    pub limit: u32,
    /// 1-based page cursor
    pub page: u32,
    /// Optional platform-side status filter
    pub status: Option<String>,
}

/// One page of raw platform orders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformOrderPage {
    pub orders: Vec<serde_json::Value>,
    pub has_more: bool,
    pub next_page: u32,
}

/// Optional shipment info attached to a status update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentDetails {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_expiry() {
        let creds = PlatformCredentials {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Some(1_000),
            shop_id: None,
        };
        assert!(creds.is_expired(1_000));
        assert!(!creds.is_expired(999));

        let no_expiry = PlatformCredentials {
            expires_at: None,
            ..creds
        };
        assert!(!no_expiry.is_expired(i64::MAX));
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::Shopee.to_string(), "shopee");
        assert_eq!(
            serde_json::from_str::<Platform>("\"tiktok\"").unwrap(),
            Platform::Tiktok
        );
    }
}
