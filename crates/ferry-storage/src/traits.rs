//! Storage abstraction traits
//!
//! [`ChunkStore`] owns the temporary area (one directory of indexed chunks per
//! upload). [`ArtifactStore`] owns the final area (one directory holding the
//! assembled file and its metadata per upload).

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ferry_core::{AppError, FileId, UploadSession};
use futures::Stream;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Corrupt metadata: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;
pub type ChunkReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;
pub type BlobWriter = Pin<Box<dyn AsyncWrite + Send + Unpin>>;

/// Chunk bytes written next to their final name but not yet visible as a chunk.
#[derive(Debug)]
pub struct StagedChunk {
    pub file_id: FileId,
    pub chunk_index: u32,
    pub path: PathBuf,
    pub size: u64,
}

/// One session directory found while listing a storage root.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub file_id: FileId,
    pub modified: DateTime<Utc>,
}

/// Private directory under the final root an artifact is assembled in.
#[derive(Debug)]
pub struct StagingArea {
    pub file_id: FileId,
    pub dir: PathBuf,
}

/// A leftover staging directory.
#[derive(Debug, Clone)]
pub struct StagingEntry {
    pub name: String,
    pub modified: DateTime<Utc>,
}

/// An artifact opened for streaming.
pub struct ArtifactStream {
    pub size: u64,
    pub stream: ByteStream,
}

/// Temporary chunk storage.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Writes chunk bytes to a unique staging file in the session directory,
    /// creating the directory if needed. Safe to call concurrently for any index.
    async fn stage_chunk(
        &self,
        file_id: &FileId,
        chunk_index: u32,
        data: Bytes,
    ) -> StorageResult<StagedChunk>;

    /// Atomically makes a staged chunk the stored chunk for its index,
    /// replacing any earlier copy. Fails with `NotFound` if the session
    /// directory vanished.
    async fn commit_chunk(&self, staged: StagedChunk) -> StorageResult<()>;

    /// Drops a staged chunk that will not be committed.
    async fn discard_staged(&self, staged: StagedChunk) -> StorageResult<()>;

    /// Stores a chunk in one step.
    async fn put_chunk(&self, file_id: &FileId, chunk_index: u32, data: Bytes) -> StorageResult<()> {
        let staged = self.stage_chunk(file_id, chunk_index, data).await?;
        self.commit_chunk(staged).await
    }

    /// Opens a stored chunk for reading. A missing chunk is `NotFound`.
    async fn get_chunk(&self, file_id: &FileId, chunk_index: u32) -> StorageResult<ChunkReader>;

    /// Recursively deletes the session's temporary area. Missing is fine.
    async fn purge(&self, file_id: &FileId) -> StorageResult<()>;

    async fn load_metadata(&self, file_id: &FileId) -> StorageResult<Option<UploadSession>>;

    /// Atomically replaces the session's metadata record. Fails with
    /// `NotFound` if the session directory vanished.
    async fn save_metadata(&self, session: &UploadSession) -> StorageResult<()>;

    async fn session_exists(&self, file_id: &FileId) -> StorageResult<bool>;

    async fn list_sessions(&self) -> StorageResult<Vec<StoredEntry>>;
}

/// Final artifact storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Creates a fresh staging directory for assembling `file_id`.
    async fn create_staging(&self, file_id: &FileId) -> StorageResult<StagingArea>;

    async fn open_blob_writer(&self, staging: &StagingArea) -> StorageResult<BlobWriter>;

    /// Writes the metadata into the staging directory, makes everything durable
    /// and renames the directory into place. Returns the artifact path.
    async fn publish(&self, staging: StagingArea, session: &UploadSession)
        -> StorageResult<PathBuf>;

    /// Removes a staging directory and everything in it.
    async fn discard(&self, staging: StagingArea) -> StorageResult<()>;

    async fn exists(&self, file_id: &FileId) -> StorageResult<bool>;

    async fn load_metadata(&self, file_id: &FileId) -> StorageResult<Option<UploadSession>>;

    async fn open_artifact(&self, file_id: &FileId) -> StorageResult<ArtifactStream>;

    /// Deletes the final directory (artifact and metadata) as one unit.
    async fn remove(&self, file_id: &FileId) -> StorageResult<()>;

    async fn list(&self) -> StorageResult<Vec<StoredEntry>>;

    async fn list_staging(&self) -> StorageResult<Vec<StagingEntry>>;

    async fn remove_staging(&self, name: &str) -> StorageResult<()>;
}
