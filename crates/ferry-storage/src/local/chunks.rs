use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::{FileId, UploadSession};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::fs_util::{list_session_dirs, read_session, remove_dir_if_exists, write_session_atomic};
use crate::keys::{chunk_path, metadata_path, session_dir, staged_chunk_path};
use crate::traits::{ChunkReader, ChunkStore, StagedChunk, StorageError, StorageResult, StoredEntry};

/// Temporary chunk storage on the local filesystem
#[derive(Clone, Debug)]
pub struct LocalChunkStore {
    root: PathBuf,
}

impl LocalChunkStore {
    /// Create a new LocalChunkStore rooted at `root`, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create temporary upload directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn stage_chunk(
        &self,
        file_id: &FileId,
        chunk_index: u32,
        data: Bytes,
    ) -> StorageResult<StagedChunk> {
        let dir = session_dir(&self.root, file_id);
        fs::create_dir_all(&dir).await?;

        let path = staged_chunk_path(&dir, chunk_index);
        let start = std::time::Instant::now();

        let write = async {
            let mut file = fs::File::create(&path).await?;
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = write {
            let _ = fs::remove_file(&path).await;
            return Err(match e.kind() {
                ErrorKind::NotFound => StorageError::NotFound(format!(
                    "Temporary directory of {} vanished",
                    file_id
                )),
                _ => StorageError::WriteFailed(format!(
                    "Failed to write chunk {} of {}: {}",
                    chunk_index, file_id, e
                )),
            });
        }

        tracing::debug!(
            file_id = %file_id,
            chunk_index = chunk_index,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunk staged"
        );

        Ok(StagedChunk {
            file_id: file_id.clone(),
            chunk_index,
            path,
            size: data.len() as u64,
        })
    }

    async fn commit_chunk(&self, staged: StagedChunk) -> StorageResult<()> {
        let dir = session_dir(&self.root, &staged.file_id);
        let target = chunk_path(&dir, staged.chunk_index);

        match fs::rename(&staged.path, &target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(format!(
                "Chunk {} of {} vanished before commit",
                staged.chunk_index, staged.file_id
            ))),
            Err(e) => {
                let _ = fs::remove_file(&staged.path).await;
                Err(StorageError::WriteFailed(format!(
                    "Failed to commit chunk {} of {}: {}",
                    staged.chunk_index, staged.file_id, e
                )))
            }
        }
    }

    async fn discard_staged(&self, staged: StagedChunk) -> StorageResult<()> {
        match fs::remove_file(&staged.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to discard staged chunk {}: {}",
                staged.path.display(),
                e
            ))),
        }
    }

    async fn get_chunk(&self, file_id: &FileId, chunk_index: u32) -> StorageResult<ChunkReader> {
        let path = chunk_path(&session_dir(&self.root, file_id), chunk_index);
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(format!(
                "Chunk {} of {} is missing",
                chunk_index, file_id
            ))),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to open chunk {} of {}: {}",
                chunk_index, file_id, e
            ))),
        }
    }

    async fn purge(&self, file_id: &FileId) -> StorageResult<()> {
        let dir = session_dir(&self.root, file_id);
        if remove_dir_if_exists(&dir).await? {
            tracing::info!(file_id = %file_id, "Temporary upload state purged");
        }
        Ok(())
    }

    async fn load_metadata(&self, file_id: &FileId) -> StorageResult<Option<UploadSession>> {
        read_session(&metadata_path(&session_dir(&self.root, file_id))).await
    }

    async fn save_metadata(&self, session: &UploadSession) -> StorageResult<()> {
        let dir = session_dir(&self.root, &session.file_id);
        write_session_atomic(&metadata_path(&dir), session).await
    }

    async fn session_exists(&self, file_id: &FileId) -> StorageResult<bool> {
        Ok(fs::try_exists(session_dir(&self.root, file_id))
            .await
            .unwrap_or(false))
    }

    async fn list_sessions(&self) -> StorageResult<Vec<StoredEntry>> {
        list_session_dirs(&self.root).await
    }
}
