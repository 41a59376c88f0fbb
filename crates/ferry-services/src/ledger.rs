//! Serialized read-modify-write of session metadata.
//!
//! Every chunk commit runs under the session lock: load or create the record,
//! deduplicate by index, commit the staged bytes, count, persist. The caller
//! whose chunk brings the count to `total_chunks` moves the record to
//! `assembling` before releasing the lock, so exactly one caller assembles.
//! Assembly itself runs outside the lock; the lock is taken again to record
//! `completed` or `failed`.

use std::sync::Arc;
use std::time::Duration;

use ferry_core::{
    AppError, ChunkDeclaration, ChunkReceipt, FileId, SessionStatus, SharedClock, UploadSession,
};
use ferry_storage::keys::artifact_key;
use ferry_storage::{ArtifactStore, ChunkStore, StagedChunk, StorageError};

use crate::assembly::AssemblyEngine;
use crate::locking::{SessionLockGuard, SessionLocks};

/// Rounds of the lock backoff budget spent to record an assembly outcome.
const FINALIZE_LOCK_ROUNDS: u32 = 5;

pub struct MetadataLedger {
    chunks: Arc<dyn ChunkStore>,
    artifacts: Arc<dyn ArtifactStore>,
    locks: SessionLocks,
    engine: Arc<AssemblyEngine>,
    clock: SharedClock,
}

enum Outcome {
    Receipt(ChunkReceipt),
    Assemble(UploadSession),
}

impl MetadataLedger {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        artifacts: Arc<dyn ArtifactStore>,
        locks: SessionLocks,
        engine: Arc<AssemblyEngine>,
        clock: SharedClock,
    ) -> Self {
        Self {
            chunks,
            artifacts,
            locks,
            engine,
            clock,
        }
    }

    pub fn engine(&self) -> &Arc<AssemblyEngine> {
        &self.engine
    }

    /// Records one verified, staged chunk.
    ///
    /// `credential_digest` is used only if this chunk creates the session.
    #[tracing::instrument(
        skip(self, decl, staged, digest, credential_digest),
        fields(file_id = %decl.file_id, chunk_index = decl.chunk_index)
    )]
    pub async fn record_chunk(
        &self,
        decl: &ChunkDeclaration,
        staged: StagedChunk,
        digest: String,
        credential_digest: Option<String>,
    ) -> Result<ChunkReceipt, AppError> {
        let mut staged = Some(staged);
        let locked = self
            .record_locked(decl, &mut staged, digest, credential_digest)
            .await;

        if let Some(unused) = staged.take() {
            if let Err(e) = self.chunks.discard_staged(unused).await {
                tracing::warn!(error = %e, "Failed to discard staged chunk");
            }
        }

        let index = decl.chunk_index;
        match locked.map_err(|e| e.at_chunk(index))? {
            Outcome::Receipt(receipt) => Ok(receipt),
            Outcome::Assemble(session) => self
                .finish_assembly(session, index)
                .await
                .map_err(|e| e.at_chunk(index)),
        }
    }

    async fn record_locked(
        &self,
        decl: &ChunkDeclaration,
        staged: &mut Option<StagedChunk>,
        digest: String,
        credential_digest: Option<String>,
    ) -> Result<Outcome, AppError> {
        let file_id = &decl.file_id;
        let index = decl.chunk_index;
        let _guard = self.locks.acquire(file_id).await?;
        let now = self.clock.now();

        let mut session = match self.chunks.load_metadata(file_id).await? {
            Some(existing) => {
                existing.check_declaration(decl)?;
                if existing.status != SessionStatus::Pending {
                    return closed_or_duplicate(&existing, index);
                }
                existing
            }
            None => {
                if let Some(published) = self.published_session(file_id).await? {
                    // The temporary area was purged after completion; the directory
                    // this chunk was staged into is a leftover of that.
                    self.purge_leftover(file_id).await;
                    if published.check_declaration(decl).is_ok() {
                        return closed_or_duplicate(&published, index);
                    }
                    return Err(AppError::SessionClosed {
                        file_id: file_id.to_string(),
                        chunk_index: index,
                        status: published.status.to_string(),
                    });
                }
                if decl.is_protected && credential_digest.is_none() {
                    // Credential was skipped because a record existed a moment ago.
                    return Err(AppError::StaleSession {
                        file_id: file_id.to_string(),
                        chunk_index: index,
                    });
                }
                tracing::info!(
                    total = decl.total_chunks,
                    duration_hours = decl.duration_hours,
                    is_protected = decl.is_protected,
                    "Upload session created"
                );
                UploadSession::new(decl, credential_digest, now)
            }
        };

        // First accepted copy of an index wins; a retransmission is only acknowledged.
        let duplicate = session.has_chunk(index);
        let mut complete = false;

        if !duplicate {
            if let Some(chunk) = staged.take() {
                self.chunks
                    .commit_chunk(chunk)
                    .await
                    .map_err(|e| stale_or_storage(e, file_id, index))?;
            }

            session.record_chunk(index, digest, now)?;

            complete = session.is_complete();
            if complete {
                session.transition(SessionStatus::Assembling, now)?;
            }

            self.chunks
                .save_metadata(&session)
                .await
                .map_err(|e| stale_or_storage(e, file_id, index))?;
        }

        tracing::debug!(
            received = session.received_chunks,
            total = session.total_chunks,
            duplicate,
            "Chunk recorded"
        );

        if complete {
            return Ok(Outcome::Assemble(session));
        }

        Ok(Outcome::Receipt(ChunkReceipt {
            accepted: true,
            file_id: session.file_id.clone(),
            chunk_index: index,
            received_chunks: session.received_chunks,
            total_chunks: session.total_chunks,
            status: session.status,
            duplicate,
            final_reference: None,
        }))
    }

    /// Assembles outside the lock, then records the outcome under the lock.
    async fn finish_assembly(
        &self,
        session: UploadSession,
        chunk_index: u32,
    ) -> Result<ChunkReceipt, AppError> {
        let file_id = session.file_id.clone();
        tracing::info!(file_id = %file_id, total = session.total_chunks, "All chunks received, assembling");

        let assembled = self.engine.assemble(&session).await;

        let guard = match self.acquire_for_finalize(&file_id).await {
            Ok(guard) => guard,
            Err(e) => {
                if let Ok(prepared) = assembled {
                    self.engine.abandon(prepared).await;
                }
                tracing::error!(
                    file_id = %file_id,
                    error = %e,
                    "Could not re-acquire session lock to record assembly outcome"
                );
                let failure = AppError::Assembly {
                    file_id: file_id.to_string(),
                    chunk_index: Some(chunk_index),
                    reason: format!("could not record assembly outcome: {}", e),
                };
                // Nothing else rewrites a record in `assembling`, so writing
                // `failed` without the lock cannot lose an update.
                self.mark_failed(session, &failure, None).await;
                return Err(failure);
            }
        };
        let now = self.clock.now();

        let prepared = match assembled {
            Ok(prepared) => prepared,
            Err(e) => {
                self.mark_failed(session, &e, Some(guard)).await;
                return Err(e);
            }
        };

        let mut completed = session.clone();
        completed.transition(SessionStatus::Completed, now)?;
        completed.final_path = Some(artifact_key(&file_id));

        if let Err(e) = self.engine.publish(prepared, &completed).await {
            self.mark_failed(session, &e, Some(guard)).await;
            return Err(e);
        }

        // A leftover completed temp record is reclaimed by the orphan sweep if
        // the purge below does not happen.
        if let Err(e) = self.chunks.save_metadata(&completed).await {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to mark temporary record completed");
        }
        drop(guard);

        if let Err(e) = self.chunks.purge(&file_id).await {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to purge temporary upload state");
        }

        tracing::info!(
            file_id = %file_id,
            size_bytes = completed.original_file_size,
            expires_at = %completed.expires_at,
            "Upload completed"
        );

        Ok(ChunkReceipt {
            accepted: true,
            file_id: file_id.clone(),
            chunk_index,
            received_chunks: completed.received_chunks,
            total_chunks: completed.total_chunks,
            status: SessionStatus::Completed,
            duplicate: false,
            final_reference: Some(file_id),
        })
    }

    async fn acquire_for_finalize(&self, file_id: &FileId) -> Result<SessionLockGuard, AppError> {
        let mut last = None;
        for round in 0..FINALIZE_LOCK_ROUNDS {
            match self.locks.acquire(file_id).await {
                Ok(guard) => return Ok(guard),
                Err(e @ AppError::ServerBusy { .. }) => {
                    last = Some(e);
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(round + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| AppError::ServerBusy {
            file_id: file_id.to_string(),
            chunk_index: None,
            attempts: 0,
        }))
    }

    /// Temporary state is kept for diagnosis.
    async fn mark_failed(
        &self,
        mut session: UploadSession,
        error: &AppError,
        guard: Option<SessionLockGuard>,
    ) {
        let now = self.clock.now();
        if let Err(e) = session.transition(SessionStatus::Failed, now) {
            tracing::error!(file_id = %session.file_id, error = %e, "Cannot mark session failed");
            return;
        }
        session.failure_reason = Some(error.to_string());
        if let Err(e) = self.chunks.save_metadata(&session).await {
            tracing::error!(file_id = %session.file_id, error = %e, "Failed to persist failed status");
        }
        drop(guard);
        tracing::error!(file_id = %session.file_id, error = %error, "Upload failed during assembly");
    }

    async fn published_session(&self, file_id: &FileId) -> Result<Option<UploadSession>, AppError> {
        if !self.artifacts.exists(file_id).await? {
            return Ok(None);
        }
        match self.artifacts.load_metadata(file_id).await {
            Ok(Some(session)) => Ok(Some(session)),
            // A final directory without a readable record still owns the ID.
            Ok(None) | Err(StorageError::Corrupt(_)) => Err(AppError::SessionClosed {
                file_id: file_id.to_string(),
                chunk_index: 0,
                status: "unavailable".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_leftover(&self, file_id: &FileId) {
        if let Err(e) = self.chunks.purge(file_id).await {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to purge leftover temporary directory");
        }
    }
}

/// A retransmission of an already recorded chunk is acknowledged; anything
/// else for a closed session is refused.
fn closed_or_duplicate(session: &UploadSession, index: u32) -> Result<Outcome, AppError> {
    if session.has_chunk(index) && session.status != SessionStatus::Failed {
        let final_reference =
            (session.status == SessionStatus::Completed).then(|| session.file_id.clone());
        return Ok(Outcome::Receipt(ChunkReceipt {
            accepted: true,
            file_id: session.file_id.clone(),
            chunk_index: index,
            received_chunks: session.received_chunks,
            total_chunks: session.total_chunks,
            status: session.status,
            duplicate: true,
            final_reference,
        }));
    }
    Err(AppError::SessionClosed {
        file_id: session.file_id.to_string(),
        chunk_index: index,
        status: session.status.to_string(),
    })
}

fn stale_or_storage(err: StorageError, file_id: &FileId, chunk_index: u32) -> AppError {
    if err.is_not_found() {
        tracing::warn!(file_id = %file_id, chunk_index, "Temporary area vanished under a chunk");
        AppError::StaleSession {
            file_id: file_id.to_string(),
            chunk_index,
        }
    } else {
        AppError::Storage(err.to_string())
    }
}
