//! HTTP error body
//!
//! The `IntoResponse` conversion for `AppError` lives in the binary crate
//! (ferry-api) because of the orphan rule; both types it joins are foreign here.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable code, e.g. `INTEGRITY_ERROR`
    pub code: String,
    /// The same request may succeed if retried
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Chunk the error concerns, for per-chunk failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}
