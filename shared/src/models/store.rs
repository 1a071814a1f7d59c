//! Store Model
//!
//! One connected marketplace shop for an organization. The engine syncs
//! per store; the monitor aggregates alerts per (organization, store).

use serde::{Deserialize, Serialize};

use crate::platform::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub id: String,
    pub organization_id: String,
    pub platform: Platform,
    pub name: String,
    /// Disabled stores are skipped by the scheduler
    pub sync_enabled: bool,
}

impl StoreConfig {
    pub fn new(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        platform: Platform,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            platform,
            name: name.into(),
            sync_enabled: true,
        }
    }
}
