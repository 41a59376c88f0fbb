//! Admin-triggered retention sweeps.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use ferry_core::{AppError, SweepReport};
use ferry_services::secure_compare;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenQuery {
    /// Admin token; `Authorization: Bearer` is accepted too
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<SweepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<SweepReport>,
}

fn authorize(state: &AppState, query: &TokenQuery, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state.cleanup_token().ok_or_else(|| {
        AppError::Unauthorized("Cleanup endpoints are disabled: no admin token configured".to_string())
    })?;

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let provided = query.token.as_deref().or(bearer).ok_or_else(|| {
        AppError::Unauthorized("Admin token required".to_string())
    })?;

    if !secure_compare(provided, expected) {
        tracing::warn!("Cleanup request with an invalid admin token");
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }
    Ok(())
}

fn summary_message(removed: u32, failed: u32) -> String {
    if failed == 0 {
        format!("Cleanup finished: {} removed", removed)
    } else {
        format!("Cleanup finished: {} removed, {} failed", removed, failed)
    }
}

/// Run both sweeps
#[utoipa::path(
    post,
    path = "/api/cleanup",
    tag = "cleanup",
    params(TokenQuery),
    responses(
        (status = 200, description = "Sweep reports", body = CleanupResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "cleanup_all"))]
pub async fn cleanup_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, HttpAppError> {
    authorize(&state, &query, &headers)?;
    let summary = state.retention.run().await;
    Ok(Json(CleanupResponse {
        success: true,
        message: summary_message(
            summary.expired.removed + summary.temp.removed,
            summary.expired.failed + summary.temp.failed,
        ),
        expired: Some(summary.expired),
        temp: Some(summary.temp),
    }))
}

/// Remove expired files
#[utoipa::path(
    post,
    path = "/api/cleanup/expired",
    tag = "cleanup",
    params(TokenQuery),
    responses(
        (status = 200, description = "Expired sweep report", body = CleanupResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "cleanup_expired"))]
pub async fn cleanup_expired(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, HttpAppError> {
    authorize(&state, &query, &headers)?;
    let report = state.retention.sweep_expired().await;
    Ok(Json(CleanupResponse {
        success: true,
        message: summary_message(report.removed, report.failed),
        expired: Some(report),
        temp: None,
    }))
}

/// Remove abandoned partial uploads
#[utoipa::path(
    post,
    path = "/api/cleanup/temp",
    tag = "cleanup",
    params(TokenQuery),
    responses(
        (status = 200, description = "Orphan sweep report", body = CleanupResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(operation = "cleanup_temp"))]
pub async fn cleanup_temp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, HttpAppError> {
    authorize(&state, &query, &headers)?;
    let report = state.retention.sweep_orphans().await;
    Ok(Json(CleanupResponse {
        success: true,
        message: summary_message(report.removed, report.failed),
        expired: None,
        temp: Some(report),
    }))
}
