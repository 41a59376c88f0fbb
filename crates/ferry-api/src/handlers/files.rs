//! Access-code check and public file information.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use ferry_core::FileInfo;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::path_file_id;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub file_name: String,
    pub is_protected: bool,
}

/// Check an access code without downloading
#[utoipa::path(
    post,
    path = "/api/files/{file_id}/verify",
    tag = "files",
    params(("file_id" = String, Path, description = "8-digit file ID")),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "File is available to this caller", body = VerifyResponse),
        (status = 401, description = "Access code missing or wrong", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 410, description = "File expired", body = ErrorResponse),
        (status = 429, description = "Too many wrong access codes", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id, operation = "verify"))]
pub async fn verify_access(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, HttpAppError> {
    let file_id = path_file_id(&file_id)?;
    let grant = state
        .gate
        .authorize(&file_id, request.password.as_deref())
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        file_name: grant.file_name().to_string(),
        is_protected: grant.session.is_protected,
    }))
}

/// Public information about a file
///
/// Expired files answer with `expired: true`; uploads in progress report
/// their chunk counts.
#[utoipa::path(
    get,
    path = "/api/file-info/{file_id}",
    tag = "files",
    params(("file_id" = String, Path, description = "8-digit file ID")),
    responses(
        (status = 200, description = "File information", body = FileInfo),
        (status = 400, description = "Malformed file ID", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id, operation = "file_info"))]
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileInfo>, HttpAppError> {
    let file_id = path_file_id(&file_id)?;
    Ok(Json(state.gate.file_info(&file_id).await?))
}
