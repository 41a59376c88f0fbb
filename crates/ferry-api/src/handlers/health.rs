use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub temp_storage: String,
    pub final_storage: String,
}

/// Run a storage check with timeout; "healthy", "timeout" or the error text.
async fn check_dir(path: &Path) -> String {
    match tokio::time::timeout(CHECK_TIMEOUT, tokio::fs::metadata(path)).await {
        Ok(Ok(meta)) if meta.is_dir() => "healthy".to_string(),
        Ok(Ok(_)) => "not a directory".to_string(),
        Ok(Err(e)) => format!("unavailable: {}", e),
        Err(_) => "timeout".to_string(),
    }
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Both storage roots reachable", body = HealthResponse),
        (status = 503, description = "A storage root is unavailable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let temp_storage = check_dir(&state.config.temp_root).await;
    let final_storage = check_dir(&state.config.final_root).await;
    let healthy = temp_storage == "healthy" && final_storage == "healthy";

    let status = if healthy {
        StatusCode::OK
    } else {
        tracing::warn!(temp_storage = %temp_storage, final_storage = %final_storage, "Health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            temp_storage,
            final_storage,
        }),
    )
}
