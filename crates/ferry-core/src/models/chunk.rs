use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::file_id::FileId;
use super::session::SessionStatus;

/// Fields a client declares with every chunk.
///
/// The session-level fields must match the ones declared by the chunk that
/// created the session.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ChunkDeclaration {
    pub file_id: FileId,
    /// Original filename, preserved verbatim
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub original_file_size: u64,
    #[validate(range(min = 1, message = "Total chunks must be at least 1"))]
    pub total_chunks: u32,
    pub chunk_index: u32,
    /// Retention window in hours
    #[validate(range(min = 1, message = "Duration must be at least 1 hour"))]
    pub duration_hours: u32,
    pub is_protected: bool,
    /// Client-computed SHA-256 of the chunk bytes, hex encoded
    #[validate(length(equal = 64, message = "Chunk digest must be 64 hex characters"))]
    pub chunk_digest: String,
}

/// Outcome of one accepted chunk.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    pub accepted: bool,
    pub file_id: FileId,
    pub chunk_index: u32,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub status: SessionStatus,
    /// True when this index had already been recorded
    pub duplicate: bool,
    /// Set on the chunk that completed the upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_reference: Option<FileId>,
}
