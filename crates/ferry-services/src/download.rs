//! Access gate for published artifacts.

use std::sync::Arc;

use ferry_core::{AppError, FileId, FileInfo, SharedClock, UploadSession};
use ferry_storage::{ArtifactStore, ArtifactStream, ChunkStore, StorageError};

use crate::credential::{AttemptLimiter, CredentialHasher};

/// Proof that a caller passed the expiry and credential checks for a file.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    pub session: UploadSession,
}

impl DownloadGrant {
    pub fn file_id(&self) -> &FileId {
        &self.session.file_id
    }

    pub fn file_name(&self) -> &str {
        &self.session.file_name
    }

    pub fn size(&self) -> u64 {
        self.session.original_file_size
    }
}

pub struct DownloadGate {
    artifacts: Arc<dyn ArtifactStore>,
    chunks: Arc<dyn ChunkStore>,
    hasher: Arc<dyn CredentialHasher>,
    limiter: AttemptLimiter,
    clock: SharedClock,
}

impl DownloadGate {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        chunks: Arc<dyn ChunkStore>,
        hasher: Arc<dyn CredentialHasher>,
        limiter: AttemptLimiter,
        clock: SharedClock,
    ) -> Self {
        Self {
            artifacts,
            chunks,
            hasher,
            limiter,
            clock,
        }
    }

    pub fn limiter(&self) -> &AttemptLimiter {
        &self.limiter
    }

    /// Checks existence, then expiry, then the access code.
    ///
    /// An expired artifact is refused even if its bytes are still on disk.
    #[tracing::instrument(skip_all, fields(file_id = %file_id))]
    pub async fn authorize(
        &self,
        file_id: &FileId,
        credential: Option<&str>,
    ) -> Result<DownloadGrant, AppError> {
        let session = self.published(file_id).await?;

        if session.is_expired(self.clock.now()) {
            tracing::debug!(expires_at = %session.expires_at, "Download refused: expired");
            return Err(AppError::Expired(format!("File {} has expired", file_id)));
        }

        if session.is_protected {
            self.check_credential(&session, credential).await?;
        }

        Ok(DownloadGrant { session })
    }

    /// Opens the artifact behind a grant.
    pub async fn open(&self, grant: &DownloadGrant) -> Result<ArtifactStream, AppError> {
        let artifact = self.artifacts.open_artifact(grant.file_id()).await?;
        tracing::info!(
            file_id = %grant.file_id(),
            size_bytes = artifact.size,
            "Serving download"
        );
        Ok(artifact)
    }

    /// Public information about a file. Expiry is reported, not refused.
    /// An upload still in progress reports its chunk counts.
    pub async fn file_info(&self, file_id: &FileId) -> Result<FileInfo, AppError> {
        let now = self.clock.now();
        match self.artifacts.load_metadata(file_id).await {
            Ok(Some(session)) => return Ok(FileInfo::from_session(&session, now)),
            Ok(None) => {}
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(file_id = %file_id, reason = %reason, "Corrupt final metadata");
                return Err(not_found(file_id));
            }
            Err(e) => return Err(e.into()),
        }

        match self.chunks.load_metadata(file_id).await {
            Ok(Some(session)) => Ok(FileInfo::from_session(&session, now)),
            Ok(None) | Err(StorageError::Corrupt(_)) => Err(not_found(file_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn published(&self, file_id: &FileId) -> Result<UploadSession, AppError> {
        match self.artifacts.load_metadata(file_id).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(not_found(file_id)),
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(file_id = %file_id, reason = %reason, "Corrupt final metadata");
                Err(not_found(file_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn check_credential(
        &self,
        session: &UploadSession,
        credential: Option<&str>,
    ) -> Result<(), AppError> {
        let key = session.file_id.as_str();

        if let Some(remaining) = self.limiter.blocked_for(key).await {
            return Err(AppError::TooManyAttempts {
                file_id: key.to_string(),
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        let code = match credential.filter(|c| !c.is_empty()) {
            Some(code) => code.to_string(),
            None => {
                return Err(AppError::AuthRequired(format!(
                    "File {} requires an access code",
                    key
                )))
            }
        };

        let digest = session.credential_digest.clone().ok_or_else(|| {
            AppError::Internal(format!("Protected session {} has no credential digest", key))
        })?;

        let hasher = Arc::clone(&self.hasher);
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&code, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("Credential check task failed: {}", e)))??;

        if matches {
            self.limiter.clear(key).await;
            return Ok(());
        }

        let blocked = self.limiter.record_failure(key).await;
        tracing::warn!(file_id = %key, blocked, "Invalid access code");
        if blocked {
            let retry_after_secs = self
                .limiter
                .blocked_for(key)
                .await
                .map(|d| d.as_secs().max(1))
                .unwrap_or(1);
            return Err(AppError::TooManyAttempts {
                file_id: key.to_string(),
                retry_after_secs,
            });
        }
        Err(AppError::InvalidCredential(format!(
            "Invalid access code for file {}",
            key
        )))
    }
}

fn not_found(file_id: &FileId) -> AppError {
    AppError::NotFound(format!("File {} not found", file_id))
}
