//! Multipart chunk intake.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use ferry_core::{AppError, ChunkDeclaration, ChunkReceipt, FileId, SessionStatus};
use ferry_services::ChunkUpload;
use serde::Serialize;
use utoipa::ToSchema;

use crate::constants::fields;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub receipt: ChunkReceipt,
    /// File ID to share, present once the upload is complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_link: Option<String>,
}

impl From<ChunkReceipt> for UploadChunkResponse {
    fn from(receipt: ChunkReceipt) -> Self {
        let (message, share_link) = match (&receipt.final_reference, receipt.status) {
            (Some(reference), _) => (
                "All chunks received and file assembled".to_string(),
                Some(reference.to_string()),
            ),
            (None, SessionStatus::Completed) => (
                "Upload already complete".to_string(),
                Some(receipt.file_id.to_string()),
            ),
            (None, _) if receipt.duplicate => (
                format!(
                    "Chunk {}/{} already received",
                    receipt.chunk_index + 1,
                    receipt.total_chunks
                ),
                None,
            ),
            (None, _) => (
                format!(
                    "Chunk {}/{} uploaded",
                    receipt.chunk_index + 1,
                    receipt.total_chunks
                ),
                None,
            ),
        };
        Self {
            success: true,
            message,
            receipt,
            share_link,
        }
    }
}

/// Upload one chunk of a file
///
/// Chunks may arrive in any order and in parallel. The chunk that completes
/// the set triggers assembly and its response carries the share link.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data",
        description = "Fields: fileId, fileName, fileSize, chunkIndex, totalChunks, duration, isProtected (or isEncrypted), password, chunkHash, chunk"),
    responses(
        (status = 200, description = "Chunk accepted", body = UploadChunkResponse),
        (status = 400, description = "Invalid chunk or declaration", body = ErrorResponse),
        (status = 409, description = "Session closed or vanished", body = ErrorResponse),
        (status = 413, description = "Chunk too large", body = ErrorResponse),
        (status = 422, description = "Chunk digest mismatch", body = ErrorResponse),
        (status = 503, description = "Session busy, retry", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_chunk"))]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadChunkResponse>, HttpAppError> {
    let upload = read_chunk_form(multipart).await?;
    let receipt = state.upload.receive_chunk(upload).await?;
    Ok(Json(receipt.into()))
}

#[derive(Default)]
struct ChunkForm {
    file_id: Option<String>,
    file_name: Option<String>,
    file_size: Option<String>,
    chunk_index: Option<String>,
    total_chunks: Option<String>,
    duration: Option<String>,
    is_protected: Option<String>,
    password: Option<String>,
    chunk_hash: Option<String>,
    chunk: Option<Bytes>,
}

async fn read_chunk_form(mut multipart: Multipart) -> Result<ChunkUpload, AppError> {
    let mut form = ChunkForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string).unwrap_or_default();

        if name == fields::CHUNK {
            if form.chunk.is_some() {
                return Err(AppError::InvalidInput(
                    "Send exactly one field named 'chunk'".to_string(),
                ));
            }
            form.chunk = Some(field.bytes().await.map_err(multipart_error)?);
            continue;
        }

        let slot = match name.as_str() {
            fields::FILE_ID => &mut form.file_id,
            fields::FILE_NAME => &mut form.file_name,
            fields::FILE_SIZE => &mut form.file_size,
            fields::CHUNK_INDEX => &mut form.chunk_index,
            fields::TOTAL_CHUNKS => &mut form.total_chunks,
            fields::DURATION => &mut form.duration,
            fields::IS_PROTECTED | fields::IS_ENCRYPTED => &mut form.is_protected,
            fields::PASSWORD => &mut form.password,
            fields::CHUNK_HASH => &mut form.chunk_hash,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(multipart_error)?);
    }

    form.into_upload()
}

impl ChunkForm {
    fn into_upload(self) -> Result<ChunkUpload, AppError> {
        let chunk_index: u32 = parse_number(fields::CHUNK_INDEX, self.chunk_index.as_deref())?;
        let in_chunk = |e: AppError| AppError::InvalidChunk {
            chunk_index,
            message: match e {
                AppError::InvalidInput(message) => message,
                other => other.to_string(),
            },
        };

        let file_id = FileId::parse(required(fields::FILE_ID, self.file_id.as_deref())?)?;
        // Stored exactly as sent; only a blank name is rejected.
        let file_name = self
            .file_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("Missing field '{}'", fields::FILE_NAME)))
            .map_err(in_chunk)?;
        let original_file_size =
            parse_number(fields::FILE_SIZE, self.file_size.as_deref()).map_err(in_chunk)?;
        let total_chunks =
            parse_number(fields::TOTAL_CHUNKS, self.total_chunks.as_deref()).map_err(in_chunk)?;
        let duration_hours =
            parse_number(fields::DURATION, self.duration.as_deref()).map_err(in_chunk)?;
        let chunk_digest = required(fields::CHUNK_HASH, self.chunk_hash.as_deref())
            .map_err(in_chunk)?
            .to_string();
        let data = self.chunk.ok_or_else(|| AppError::InvalidChunk {
            chunk_index,
            message: format!("Missing field '{}'", fields::CHUNK),
        })?;

        Ok(ChunkUpload {
            declaration: ChunkDeclaration {
                file_id,
                file_name,
                original_file_size,
                total_chunks,
                chunk_index,
                duration_hours,
                is_protected: parse_flag(self.is_protected.as_deref()),
                chunk_digest,
            },
            credential: self.password,
            data,
        })
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Missing field '{}'", name)))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<&str>) -> Result<T, AppError> {
    required(name, value)?
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Field '{}' must be a non-negative integer", name)))
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Chunk exceeds the request size limit".to_string())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart body: {}", err.body_text()))
    }
}
