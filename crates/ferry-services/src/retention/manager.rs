use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use ferry_core::{CleanupSummary, FileId, SessionStatus, SharedClock, SweepReport, UploadSession};
use ferry_storage::{ArtifactStore, ChunkStore, StorageError, StorageResult};

use crate::locking::SessionLocks;

/// Something that can run a full cleanup pass on demand.
#[async_trait]
pub trait Sweeper: Send + Sync {
    async fn sweep(&self) -> CleanupSummary;
}

/// Deletes expired artifacts and abandoned temporary uploads.
///
/// Sessions whose lock is held by a request in flight are skipped and picked
/// up by a later run.
pub struct RetentionManager {
    chunks: Arc<dyn ChunkStore>,
    artifacts: Arc<dyn ArtifactStore>,
    locks: SessionLocks,
    clock: SharedClock,
    orphan_stale_after: Duration,
}

enum Verdict {
    Keep,
    Remove(&'static str),
}

impl RetentionManager {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        artifacts: Arc<dyn ArtifactStore>,
        locks: SessionLocks,
        clock: SharedClock,
        orphan_stale_after: Duration,
    ) -> Self {
        Self {
            chunks,
            artifacts,
            locks,
            clock,
            orphan_stale_after,
        }
    }

    /// Removes every final directory whose session has expired or whose
    /// metadata is missing or unreadable.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expired"))]
    pub async fn sweep_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let entries = match self.artifacts.list().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list final upload directory");
                report.failed += 1;
                return report;
            }
        };
        let now = self.clock.now();

        for entry in entries {
            report.checked += 1;
            let file_id = entry.file_id;

            let guard = match self.locks.try_acquire(&file_id).await {
                Ok(Some(guard)) => guard,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(file_id = %file_id, error = %e, "Failed to lock session for cleanup");
                    report.failed += 1;
                    continue;
                }
            };

            let verdict = match self.artifacts.load_metadata(&file_id).await {
                Ok(Some(session)) if session.is_expired(now) => Verdict::Remove("expired"),
                Ok(Some(_)) => Verdict::Keep,
                Ok(None) => Verdict::Remove("missing metadata"),
                Err(StorageError::Corrupt(reason)) => {
                    tracing::warn!(file_id = %file_id, reason = %reason, "Corrupt final metadata");
                    Verdict::Remove("corrupt metadata")
                }
                Err(e) => {
                    tracing::error!(file_id = %file_id, error = %e, "Failed to read final metadata");
                    report.failed += 1;
                    continue;
                }
            };

            if let Verdict::Remove(reason) = verdict {
                self.remove(&file_id, reason, self.artifacts.remove(&file_id).await, &mut report);
            }
            drop(guard);
        }

        tracing::info!(
            checked = report.checked,
            removed = report.removed,
            failed = report.failed,
            skipped = report.skipped,
            "Expired sweep finished"
        );
        report
    }

    /// Removes temporary session directories that are abandoned: no or corrupt
    /// metadata, a leftover completed record, or no activity within the
    /// staleness window. Stale assembly staging directories go too.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "orphans"))]
    pub async fn sweep_orphans(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.now();
        let cutoff = now - self.orphan_stale_after;

        match self.chunks.list_sessions().await {
            Ok(entries) => {
                for entry in entries {
                    report.checked += 1;
                    let file_id = entry.file_id;

                    let guard = match self.locks.try_acquire(&file_id).await {
                        Ok(Some(guard)) => guard,
                        Ok(None) => {
                            report.skipped += 1;
                            continue;
                        }
                        Err(e) => {
                            tracing::error!(file_id = %file_id, error = %e, "Failed to lock session for cleanup");
                            report.failed += 1;
                            continue;
                        }
                    };

                    let verdict = match self.chunks.load_metadata(&file_id).await {
                        Ok(Some(session)) => orphan_verdict(&session, cutoff),
                        Ok(None) => Verdict::Remove("missing metadata"),
                        Err(StorageError::Corrupt(reason)) => {
                            tracing::warn!(file_id = %file_id, reason = %reason, "Corrupt temporary metadata");
                            Verdict::Remove("corrupt metadata")
                        }
                        Err(e) => {
                            tracing::error!(file_id = %file_id, error = %e, "Failed to read temporary metadata");
                            report.failed += 1;
                            continue;
                        }
                    };

                    if let Verdict::Remove(reason) = verdict {
                        self.remove(&file_id, reason, self.chunks.purge(&file_id).await, &mut report);
                    }
                    drop(guard);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list temporary upload directory");
                report.failed += 1;
            }
        }

        match self.artifacts.list_staging().await {
            Ok(staging) => {
                for entry in staging.into_iter().filter(|e| e.modified < cutoff) {
                    report.checked += 1;
                    match self.artifacts.remove_staging(&entry.name).await {
                        Ok(()) => {
                            tracing::info!(staging = %entry.name, "Removed stale assembly staging directory");
                            report.removed += 1;
                        }
                        Err(e) => {
                            tracing::error!(staging = %entry.name, error = %e, "Failed to remove staging directory");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list staging directory");
                report.failed += 1;
            }
        }

        tracing::info!(
            checked = report.checked,
            removed = report.removed,
            failed = report.failed,
            skipped = report.skipped,
            "Orphan sweep finished"
        );
        report
    }

    pub async fn run(&self) -> CleanupSummary {
        CleanupSummary {
            expired: self.sweep_expired().await,
            temp: self.sweep_orphans().await,
        }
    }

    fn remove(
        &self,
        file_id: &FileId,
        reason: &str,
        result: StorageResult<()>,
        report: &mut SweepReport,
    ) {
        match result {
            Ok(()) => {
                tracing::info!(file_id = %file_id, reason = %reason, "Removed upload");
                report.removed += 1;
            }
            Err(e) => {
                tracing::error!(file_id = %file_id, reason = %reason, error = %e, "Failed to remove upload");
                report.failed += 1;
            }
        }
    }
}

fn orphan_verdict(session: &UploadSession, cutoff: chrono::DateTime<chrono::Utc>) -> Verdict {
    match session.status {
        SessionStatus::Completed => Verdict::Remove("completed leftover"),
        _ if session.updated_at < cutoff => Verdict::Remove("stale"),
        _ => Verdict::Keep,
    }
}

#[async_trait]
impl Sweeper for RetentionManager {
    async fn sweep(&self) -> CleanupSummary {
        self.run().await
    }
}
