use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use ferry_core::{FileId, UploadSession};
use futures::StreamExt;
use tokio::fs;

use crate::fs_util::{
    list_session_dirs, modified_at, read_session, remove_dir_if_exists, write_session_atomic,
};
use crate::keys::{metadata_path, session_dir, staging_dir, staging_root, BLOB_FILE};
use crate::traits::{
    ArtifactStore, ArtifactStream, BlobWriter, StagingArea, StagingEntry, StorageError,
    StorageResult, StoredEntry,
};

/// Final artifact storage on the local filesystem
#[derive(Clone, Debug)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a new LocalArtifactStore rooted at `root`, creating it (and its
    /// staging area) if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(staging_root(&root)).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    async fn publish_staged(
        &self,
        staging: &StagingArea,
        session: &UploadSession,
    ) -> StorageResult<PathBuf> {
        let start = std::time::Instant::now();
        let blob = staging.dir.join(BLOB_FILE);
        let file = fs::File::open(&blob).await.map_err(|e| {
            StorageError::WriteFailed(format!("Assembled file {} missing: {}", blob.display(), e))
        })?;
        file.sync_all().await?;
        drop(file);

        write_session_atomic(&metadata_path(&staging.dir), session).await?;

        let target = session_dir(&self.root, &staging.file_id);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists(format!(
                "Final directory for {} already exists",
                staging.file_id
            )));
        }

        fs::rename(&staging.dir, &target).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty => {
                StorageError::AlreadyExists(format!(
                    "Final directory for {} already exists",
                    staging.file_id
                ))
            }
            _ => StorageError::WriteFailed(format!(
                "Failed to publish {}: {}",
                staging.file_id, e
            )),
        })?;

        // Make the rename itself durable.
        if let Ok(root) = fs::File::open(&self.root).await {
            let _ = root.sync_all().await;
        }

        tracing::info!(
            file_id = %staging.file_id,
            path = %target.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Artifact published"
        );

        Ok(target.join(BLOB_FILE))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn create_staging(&self, file_id: &FileId) -> StorageResult<StagingArea> {
        let dir = staging_dir(&self.root, file_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create staging directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(StagingArea {
            file_id: file_id.clone(),
            dir,
        })
    }

    async fn open_blob_writer(&self, staging: &StagingArea) -> StorageResult<BlobWriter> {
        let path = staging.dir.join(BLOB_FILE);
        let file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        Ok(Box::pin(file))
    }

    async fn publish(
        &self,
        staging: StagingArea,
        session: &UploadSession,
    ) -> StorageResult<PathBuf> {
        match self.publish_staged(&staging, session).await {
            Ok(path) => Ok(path),
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&staging.dir).await {
                    tracing::warn!(
                        file_id = %staging.file_id,
                        error = %cleanup,
                        "Failed to remove staging directory after publish error"
                    );
                }
                Err(e)
            }
        }
    }

    async fn discard(&self, staging: StagingArea) -> StorageResult<()> {
        remove_dir_if_exists(&staging.dir).await?;
        Ok(())
    }

    async fn exists(&self, file_id: &FileId) -> StorageResult<bool> {
        Ok(fs::try_exists(session_dir(&self.root, file_id))
            .await
            .unwrap_or(false))
    }

    async fn load_metadata(&self, file_id: &FileId) -> StorageResult<Option<UploadSession>> {
        read_session(&metadata_path(&session_dir(&self.root, file_id))).await
    }

    async fn open_artifact(&self, file_id: &FileId) -> StorageResult<ArtifactStream> {
        let path = session_dir(&self.root, file_id).join(BLOB_FILE);
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(file_id.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let size = file.metadata().await?.len();

        let reader = tokio_util::io::ReaderStream::new(file);
        let id = file_id.to_string();
        let stream = reader.map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    file_id = %id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    error = %e,
                    "Artifact stream read error"
                );
                StorageError::ReadFailed(format!("Failed to read artifact: {}", e))
            })
        });

        Ok(ArtifactStream {
            size,
            stream: Box::pin(stream),
        })
    }

    async fn remove(&self, file_id: &FileId) -> StorageResult<()> {
        let dir = session_dir(&self.root, file_id);
        if remove_dir_if_exists(&dir).await? {
            tracing::info!(file_id = %file_id, "Final upload directory removed");
        }
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<StoredEntry>> {
        list_session_dirs(&self.root).await
    }

    async fn list_staging(&self) -> StorageResult<Vec<StagingEntry>> {
        let root = staging_root(&self.root);
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = match modified_at(&entry.path()).await {
                Ok(modified) => modified,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            entries.push(StagingEntry { name, modified });
        }
        Ok(entries)
    }

    async fn remove_staging(&self, name: &str) -> StorageResult<()> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(StorageError::NotFound(name.to_string()));
        }
        remove_dir_if_exists(&staging_root(&self.root).join(name)).await?;
        Ok(())
    }
}
