//! Per-chunk pipeline: validate, verify, stage, record.

use std::sync::Arc;

use bytes::Bytes;
use ferry_core::validation::{validate_chunk, validate_credential_format};
use ferry_core::{AppError, ChunkDeclaration, ChunkReceipt, ErrorMetadata, UploadLimits};
use ferry_storage::ChunkStore;

use crate::credential::CredentialHasher;
use crate::integrity::IntegrityVerifier;
use crate::ledger::MetadataLedger;

/// One chunk as received from the transport.
#[derive(Clone)]
pub struct ChunkUpload {
    pub declaration: ChunkDeclaration,
    /// Raw access code; required on the chunk that creates a protected session
    pub credential: Option<String>,
    pub data: Bytes,
}

impl std::fmt::Debug for ChunkUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkUpload")
            .field("declaration", &self.declaration)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("data_len", &self.data.len())
            .finish()
    }
}

pub struct UploadService {
    chunks: Arc<dyn ChunkStore>,
    verifier: IntegrityVerifier,
    hasher: Arc<dyn CredentialHasher>,
    ledger: Arc<MetadataLedger>,
    limits: UploadLimits,
}

impl UploadService {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        hasher: Arc<dyn CredentialHasher>,
        ledger: Arc<MetadataLedger>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            chunks,
            verifier: IntegrityVerifier::new(),
            hasher,
            ledger,
            limits,
        }
    }

    pub fn ledger(&self) -> &Arc<MetadataLedger> {
        &self.ledger
    }

    /// Accepts one chunk. Validation and integrity failures are returned
    /// before anything touches storage.
    #[tracing::instrument(
        skip(self, upload),
        fields(
            file_id = %upload.declaration.file_id,
            chunk_index = upload.declaration.chunk_index,
            size_bytes = upload.data.len()
        )
    )]
    pub async fn receive_chunk(&self, upload: ChunkUpload) -> Result<ChunkReceipt, AppError> {
        let ChunkUpload {
            declaration: decl,
            credential,
            data,
        } = upload;

        validate_chunk(&decl, data.len() as u64, &self.limits)?;

        let credential = if decl.is_protected {
            let credential = credential.filter(|c| !c.is_empty());
            if let Some(ref code) = credential {
                validate_credential_format(code, self.limits.credential_length).map_err(|e| {
                    AppError::InvalidChunk {
                        chunk_index: decl.chunk_index,
                        message: e.client_message(),
                    }
                })?;
            }
            credential
        } else {
            None
        };

        let digest =
            self.verifier
                .verify(&decl.file_id, decl.chunk_index, &data, &decl.chunk_digest)?;

        // Unlocked peek: hash the access code only when this chunk may create the session.
        let credential_digest = if decl.is_protected {
            let exists = matches!(self.chunks.load_metadata(&decl.file_id).await, Ok(Some(_)));
            match (exists, credential) {
                (true, _) => None,
                (false, Some(code)) => Some(self.digest_credential(code).await?),
                (false, None) => {
                    return Err(AppError::InvalidChunk {
                        chunk_index: decl.chunk_index,
                        message: "an access code is required for a protected upload".to_string(),
                    })
                }
            }
        } else {
            None
        };

        let staged = self
            .chunks
            .stage_chunk(&decl.file_id, decl.chunk_index, data)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::StaleSession {
                        file_id: decl.file_id.to_string(),
                        chunk_index: decl.chunk_index,
                    }
                } else {
                    AppError::Storage(e.to_string())
                }
            })?;

        self.ledger
            .record_chunk(&decl, staged, digest, credential_digest)
            .await
    }

    async fn digest_credential(&self, code: String) -> Result<String, AppError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.digest(&code))
            .await
            .map_err(|e| AppError::Internal(format!("Credential hashing task failed: {}", e)))?
    }
}
