//! Concatenates a session's chunks into the final artifact.
//!
//! Chunks are streamed in index order into a private staging directory and
//! hashed again on the way through. Nothing becomes visible under the final
//! root until [`AssemblyEngine::publish`] renames the staging directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ferry_core::{AppError, UploadSession};
use ferry_storage::{ArtifactStore, ChunkStore, StagingArea};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::integrity::StreamingDigest;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Assembled bytes waiting to be published.
#[derive(Debug)]
pub struct PreparedArtifact {
    pub staging: StagingArea,
    pub size: u64,
}

pub struct AssemblyEngine {
    chunks: Arc<dyn ChunkStore>,
    artifacts: Arc<dyn ArtifactStore>,
    invocations: AtomicU64,
}

impl AssemblyEngine {
    pub fn new(chunks: Arc<dyn ChunkStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            chunks,
            artifacts,
            invocations: AtomicU64::new(0),
        }
    }

    /// Number of times [`assemble`](Self::assemble) has started.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Streams chunks `0..total_chunks` into a staging area.
    ///
    /// Any missing chunk, digest mismatch or size mismatch aborts the whole
    /// assembly and removes the staging area.
    #[tracing::instrument(skip(self, session), fields(file_id = %session.file_id, total = session.total_chunks))]
    pub async fn assemble(&self, session: &UploadSession) -> Result<PreparedArtifact, AppError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let start = std::time::Instant::now();

        if !session.is_complete() {
            return Err(AppError::Assembly {
                file_id: session.file_id.to_string(),
                chunk_index: None,
                reason: format!(
                    "only {} of {} chunks recorded",
                    session.received_chunks, session.total_chunks
                ),
            });
        }

        let staging = self
            .artifacts
            .create_staging(&session.file_id)
            .await
            .map_err(|e| AppError::Assembly {
                file_id: session.file_id.to_string(),
                chunk_index: None,
                reason: e.to_string(),
            })?;

        match self.stream_chunks(session, &staging).await {
            Ok(size) => {
                tracing::info!(
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Chunks assembled"
                );
                Ok(PreparedArtifact { staging, size })
            }
            Err(reason) => {
                tracing::error!(reason = %reason, "Assembly aborted");
                if let Err(e) = self.artifacts.discard(staging).await {
                    tracing::warn!(error = %e, "Failed to discard staging directory");
                }
                Err(AppError::Assembly {
                    file_id: session.file_id.to_string(),
                    chunk_index: None,
                    reason,
                })
            }
        }
    }

    async fn stream_chunks(
        &self,
        session: &UploadSession,
        staging: &StagingArea,
    ) -> Result<u64, String> {
        let mut writer = self
            .artifacts
            .open_blob_writer(staging)
            .await
            .map_err(|e| e.to_string())?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total: u64 = 0;

        for index in 0..session.total_chunks {
            let expected = session
                .chunks
                .get(&index)
                .ok_or_else(|| format!("chunk {} was never recorded", index))?;

            let mut reader = self
                .chunks
                .get_chunk(&session.file_id, index)
                .await
                .map_err(|e| format!("chunk {} unreadable: {}", index, e))?;

            let mut digest = StreamingDigest::new();
            loop {
                let n = reader
                    .read(&mut buffer)
                    .await
                    .map_err(|e| format!("chunk {} read failed: {}", index, e))?;
                if n == 0 {
                    break;
                }
                digest.update(&buffer[..n]);
                writer
                    .write_all(&buffer[..n])
                    .await
                    .map_err(|e| format!("write failed at chunk {}: {}", index, e))?;
                total += n as u64;
            }

            let actual = digest.finalize_hex();
            if &actual != expected {
                return Err(format!(
                    "chunk {} digest changed on disk: expected {}, got {}",
                    index, expected, actual
                ));
            }
        }

        writer
            .shutdown()
            .await
            .map_err(|e| format!("failed to flush artifact: {}", e))?;

        if total != session.original_file_size {
            return Err(format!(
                "assembled {} bytes but {} were declared",
                total, session.original_file_size
            ));
        }

        Ok(total)
    }

    /// Publishes a prepared artifact with its completed metadata record.
    pub async fn publish(
        &self,
        prepared: PreparedArtifact,
        completed: &UploadSession,
    ) -> Result<PathBuf, AppError> {
        self.artifacts
            .publish(prepared.staging, completed)
            .await
            .map_err(|e| AppError::Assembly {
                file_id: completed.file_id.to_string(),
                chunk_index: None,
                reason: e.to_string(),
            })
    }

    pub async fn abandon(&self, prepared: PreparedArtifact) {
        let file_id = prepared.staging.file_id.clone();
        if let Err(e) = self.artifacts.discard(prepared.staging).await {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to discard staging directory");
        }
    }
}
