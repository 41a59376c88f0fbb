use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Counts from one sweep over a storage root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub checked: u32,
    pub removed: u32,
    pub failed: u32,
    /// Sessions left alone because another request held their lock
    pub skipped: u32,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.checked += other.checked;
        self.removed += other.removed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Result of a full cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub expired: SweepReport,
    pub temp: SweepReport,
}
