use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Sweeper;

/// Calls a [`Sweeper`] on a fixed interval, starting immediately.
pub struct RetentionScheduler {
    sweeper: Arc<dyn Sweeper>,
    period: Duration,
}

impl RetentionScheduler {
    pub fn new(sweeper: Arc<dyn Sweeper>, period: Duration) -> Self {
        Self { sweeper, period }
    }

    /// Start the background cleanup task.
    /// Returns a JoinHandle that finishes once `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Retention scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::info!("Starting scheduled cleanup");
                        let summary = self.sweeper.sweep().await;
                        tracing::info!(
                            expired_removed = summary.expired.removed,
                            temp_removed = summary.temp.removed,
                            failed = summary.expired.failed + summary.temp.failed,
                            "Scheduled cleanup completed"
                        );
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferry_core::CleanupSummary;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingSweeper {
        runs: AtomicU32,
    }

    #[async_trait]
    impl Sweeper for CountingSweeper {
        async fn sweep(&self) -> CleanupSummary {
            self.runs.fetch_add(1, Ordering::SeqCst);
            CleanupSummary::default()
        }
    }

    #[tokio::test]
    async fn test_runs_at_start_and_stops_on_cancel() {
        let sweeper = Arc::new(CountingSweeper::default());
        let cancel = CancellationToken::new();
        let handle = RetentionScheduler::new(sweeper.clone(), Duration::from_secs(3600))
            .start(cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sweeper.runs.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_runs_on_interval() {
        let sweeper = Arc::new(CountingSweeper::default());
        let cancel = CancellationToken::new();
        let handle = RetentionScheduler::new(sweeper.clone(), Duration::from_millis(20))
            .start(cancel.clone());

        tokio::time::sleep(Duration::from_millis(110)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(sweeper.runs.load(Ordering::SeqCst) >= 3);
    }
}
