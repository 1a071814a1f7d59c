//! Sync run aggregates

use serde::Serialize;

use crate::utils::SyncErrorDetail;

/// Aggregate result of one sync run for one store
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub total_processed: u32,
    pub imported: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Status changes pushed to the platform
    pub status_updates: u32,
    pub errors: Vec<SyncErrorDetail>,
}

impl SyncReport {
    /// Percentage of processed items that failed; 0 when nothing ran
    pub fn error_rate(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            self.failed as f64 / self.total_processed as f64 * 100.0
        }
    }

    /// Orders that produced a write (import or update)
    pub fn written(&self) -> u32 {
        self.imported + self.updated
    }

    /// Fold a second direction's results into this report
    pub fn merge(&mut self, other: SyncReport) {
        self.total_processed += other.total_processed;
        self.imported += other.imported;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.status_updates += other.status_updates;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate() {
        let report = SyncReport {
            total_processed: 20,
            failed: 6,
            ..Default::default()
        };
        assert!((report.error_rate() - 30.0).abs() < f64::EPSILON);

        assert_eq!(SyncReport::default().error_rate(), 0.0);
    }

    #[test]
    fn test_merge() {
        let mut pull = SyncReport {
            total_processed: 10,
            imported: 4,
            updated: 2,
            skipped: 3,
            failed: 1,
            ..Default::default()
        };
        let push = SyncReport {
            total_processed: 5,
            status_updates: 4,
            failed: 1,
            ..Default::default()
        };
        pull.merge(push);

        assert_eq!(pull.total_processed, 15);
        assert_eq!(pull.status_updates, 4);
        assert_eq!(pull.failed, 2);
        assert_eq!(pull.written(), 6);
    }
}
