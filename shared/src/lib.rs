//! Shared types for the order-sync workspace
//!
//! Platform-agnostic domain types used by the sync engine and its
//! collaborators: the canonical order model, sync job tracking, alert
//! records, and the platform wire types adapters speak.

pub mod models;
pub mod platform;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Model re-exports (for convenient access)
pub use models::alert::{Alert, AlertSeverity, AlertType};
pub use models::order::{
    CanonicalOrder, CustomerInfo, FinancialStatus, FulfillmentStatus, OrderItem, OrderStatus,
    OrderTotals, StatusTriple,
};
pub use models::store::StoreConfig;
pub use models::sync_job::{JobStatus, JobType, SyncJob};
pub use platform::{
    FetchOrdersQuery, FulfillmentDetails, Platform, PlatformCredentials, PlatformOrderPage,
};
