//! Sync Job Model
//!
//! A scheduled unit of synchronization, tracked pending → running →
//! completed/failed. Terminal states are immutable — the job store
//! rejects transitions out of them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a sync job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Import/update from platform to local store
    Pull,
    /// Propagate local status changes to the platform
    Push,
    /// Pull followed by push
    Full,
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A tracked synchronization run for one store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub store_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub items_total: u32,
    pub items_processed: u32,
    pub items_failed: u32,
    /// Unix millis
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl SyncJob {
    /// Create a new pending job (scheduler entry point)
    pub fn pending(store_id: impl Into<String>, job_type: JobType) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id: store_id.into(),
            job_type,
            status: JobStatus::Pending,
            items_total: 0,
            items_processed: 0,
            items_failed: 0,
            created_at: crate::util::now_millis(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            error_message: None,
        }
    }
}
