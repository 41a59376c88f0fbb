//! Chunk declaration and credential checks that run before any storage access.

use validator::Validate;

use crate::config::UploadLimits;
use crate::error::AppError;
use crate::models::ChunkDeclaration;

/// Validates a chunk's declared fields and byte length against the limits.
pub fn validate_chunk(
    decl: &ChunkDeclaration,
    chunk_len: u64,
    limits: &UploadLimits,
) -> Result<(), AppError> {
    decl.validate().map_err(|e| AppError::InvalidChunk {
        chunk_index: decl.chunk_index,
        message: e.to_string(),
    })?;

    let reject = |message: String| AppError::InvalidChunk {
        chunk_index: decl.chunk_index,
        message,
    };

    if !decl.chunk_digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(reject("chunk digest must be hex encoded".to_string()));
    }
    if decl.chunk_index >= decl.total_chunks {
        return Err(reject(format!(
            "index must be below totalChunks ({})",
            decl.total_chunks
        )));
    }
    if decl.total_chunks > limits.max_total_chunks {
        return Err(reject(format!(
            "totalChunks exceeds the limit of {}",
            limits.max_total_chunks
        )));
    }
    if u64::from(decl.total_chunks) > decl.original_file_size {
        return Err(reject("totalChunks exceeds the file size".to_string()));
    }
    if decl.original_file_size > limits.max_file_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds the limit of {} bytes",
            limits.max_file_bytes
        )));
    }
    if decl.duration_hours > limits.max_retention_hours {
        return Err(reject(format!(
            "duration must be between 1 and {} hours",
            limits.max_retention_hours
        )));
    }
    if chunk_len == 0 {
        return Err(reject("chunk is empty".to_string()));
    }
    if chunk_len > limits.max_chunk_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Chunk {} exceeds the limit of {} bytes",
            decl.chunk_index, limits.max_chunk_bytes
        )));
    }
    if chunk_len > decl.original_file_size {
        return Err(reject("chunk is larger than the declared file".to_string()));
    }

    Ok(())
}

/// Access codes are fixed-length numeric strings.
pub fn validate_credential_format(credential: &str, length: usize) -> Result<(), AppError> {
    if credential.len() != length || !credential.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidInput(format!(
            "Access code must be exactly {} digits",
            length
        )));
    }
    Ok(())
}
