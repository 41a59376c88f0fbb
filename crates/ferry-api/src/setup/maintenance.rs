use std::sync::Arc;

use async_trait::async_trait;
use ferry_core::CleanupSummary;
use ferry_services::Sweeper;

use crate::state::AppState;

/// Scheduled work: both retention sweeps, then pruning of reset
/// access-code failure windows.
pub(crate) struct MaintenanceSweep {
    state: Arc<AppState>,
}

impl MaintenanceSweep {
    pub(crate) fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Sweeper for MaintenanceSweep {
    async fn sweep(&self) -> CleanupSummary {
        let summary = self.state.retention.run().await;
        let pruned = self.state.gate.limiter().prune().await;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned access-code failure windows");
        }
        summary
    }
}
