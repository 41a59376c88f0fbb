//! Error types module
//!
//! Every failure a chunk upload, download or cleanup request can hit is a variant
//! of [`AppError`]. Variants self-describe how they are presented to clients
//! through [`ErrorMetadata`].

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like lock contention
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INTEGRITY_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid chunk {chunk_index}: {message}")]
    InvalidChunk { chunk_index: u32, message: String },

    #[error("Integrity check failed for chunk {chunk_index} of {file_id}: expected {expected}, got {actual}")]
    Integrity {
        file_id: String,
        chunk_index: u32,
        expected: String,
        actual: String,
    },

    #[error("Session {file_id} is busy after {attempts} lock attempts")]
    ServerBusy {
        file_id: String,
        chunk_index: Option<u32>,
        attempts: u32,
    },

    #[error("Assembly of {file_id} failed: {reason}")]
    Assembly {
        file_id: String,
        chunk_index: Option<u32>,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Authorization required: {0}")]
    AuthRequired(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Too many failed attempts for {file_id}")]
    TooManyAttempts { file_id: String, retry_after_secs: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session {file_id} no longer accepts chunks (chunk {chunk_index}, status {status})")]
    SessionClosed {
        file_id: String,
        chunk_index: u32,
        status: String,
    },

    #[error("Temporary state of {file_id} vanished while storing chunk {chunk_index}")]
    StaleSession { file_id: String, chunk_index: u32 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidChunk { .. } => (
            400,
            "INVALID_CHUNK",
            false,
            Some("Fix the chunk fields and resend the chunk"),
            false,
            LogLevel::Debug,
        ),
        AppError::Integrity { .. } => (
            422,
            "INTEGRITY_ERROR",
            true,
            Some("Recompute the chunk digest and resend the chunk"),
            false,
            LogLevel::Warn,
        ),
        AppError::ServerBusy { .. } => (
            503,
            "SERVER_BUSY",
            true,
            Some("Wait briefly and resend the same chunk"),
            false,
            LogLevel::Warn,
        ),
        AppError::Assembly { .. } => (
            500,
            "ASSEMBLY_ERROR",
            false,
            Some("Start a new upload"),
            true,
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Expired(_) => (
            410,
            "EXPIRED",
            false,
            Some("Ask the sender to upload the file again"),
            false,
            LogLevel::Debug,
        ),
        AppError::AuthRequired(_) => (
            401,
            "AUTH_REQUIRED",
            false,
            Some("Provide the access code for this file"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidCredential(_) => (
            401,
            "INVALID_CREDENTIAL",
            false,
            Some("Check the access code and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooManyAttempts { .. } => (
            429,
            "TOO_MANY_ATTEMPTS",
            true,
            Some("Wait before trying another access code"),
            false,
            LogLevel::Warn,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            false,
            Some("Contact the operator if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::SessionClosed { .. } => (
            409,
            "SESSION_CLOSED",
            false,
            Some("Start a new upload with a fresh file ID"),
            false,
            LogLevel::Debug,
        ),
        AppError::StaleSession { .. } => (
            409,
            "STALE_SESSION",
            false,
            Some("Start a new upload with a fresh file ID"),
            false,
            LogLevel::Warn,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the admin token"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Send smaller chunks"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::InvalidChunk { .. } => "InvalidChunk",
            AppError::Integrity { .. } => "Integrity",
            AppError::ServerBusy { .. } => "ServerBusy",
            AppError::Assembly { .. } => "Assembly",
            AppError::NotFound(_) => "NotFound",
            AppError::Expired(_) => "Expired",
            AppError::AuthRequired(_) => "AuthRequired",
            AppError::InvalidCredential(_) => "InvalidCredential",
            AppError::TooManyAttempts { .. } => "TooManyAttempts",
            AppError::Storage(_) => "Storage",
            AppError::SessionClosed { .. } => "SessionClosed",
            AppError::StaleSession { .. } => "StaleSession",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Chunk index the error is about, when it concerns one chunk.
    pub fn chunk_index(&self) -> Option<u32> {
        match self {
            AppError::InvalidChunk { chunk_index, .. }
            | AppError::Integrity { chunk_index, .. }
            | AppError::SessionClosed { chunk_index, .. }
            | AppError::StaleSession { chunk_index, .. } => Some(*chunk_index),
            AppError::ServerBusy { chunk_index, .. } | AppError::Assembly { chunk_index, .. } => {
                *chunk_index
            }
            _ => None,
        }
    }

    /// Attaches the chunk being processed to errors raised below the chunk
    /// pipeline. Errors that already name a chunk are left alone.
    pub fn at_chunk(self, index: u32) -> Self {
        match self {
            AppError::ServerBusy {
                file_id,
                chunk_index: None,
                attempts,
            } => AppError::ServerBusy {
                file_id,
                chunk_index: Some(index),
                attempts,
            },
            AppError::Assembly {
                file_id,
                chunk_index: None,
                reason,
            } => AppError::Assembly {
                file_id,
                chunk_index: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Seconds a client should wait before retrying, if the error says so.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::ServerBusy { .. } => Some(1),
            AppError::TooManyAttempts {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::InvalidChunk {
                chunk_index,
                message,
            } => format!("Chunk {} rejected: {}", chunk_index, message),
            AppError::Integrity { chunk_index, .. } => {
                format!("Chunk {} failed the integrity check", chunk_index)
            }
            AppError::ServerBusy { .. } => {
                "Upload session is busy, retry the chunk shortly".to_string()
            }
            AppError::Assembly { .. } => "Failed to assemble the uploaded file".to_string(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Expired(ref msg) => msg.clone(),
            AppError::AuthRequired(ref msg) => msg.clone(),
            AppError::InvalidCredential(ref msg) => msg.clone(),
            AppError::TooManyAttempts {
                retry_after_secs, ..
            } => format!(
                "Too many invalid access codes, retry in {} seconds",
                retry_after_secs
            ),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::SessionClosed {
                chunk_index,
                status,
                ..
            } => format!(
                "Chunk {} rejected: upload is already {}",
                chunk_index, status
            ),
            AppError::StaleSession { chunk_index, .. } => format!(
                "Chunk {} rejected: upload session no longer exists",
                chunk_index
            ),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_integrity() {
        let err = AppError::Integrity {
            file_id: "12345678".to_string(),
            chunk_index: 2,
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(err.error_code(), "INTEGRITY_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.chunk_index(), Some(2));
        assert!(err.client_message().contains("Chunk 2"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_server_busy_is_retryable() {
        let err = AppError::ServerBusy {
            file_id: "12345678".to_string(),
            chunk_index: None,
            attempts: 10,
        };
        assert_eq!(err.http_status_code(), 503);
        assert!(err.is_recoverable());
        assert_eq!(err.retry_after_secs(), Some(1));
        assert_eq!(err.chunk_index(), None);
    }

    #[test]
    fn test_at_chunk_fills_missing_index_only() {
        let busy = AppError::ServerBusy {
            file_id: "12345678".to_string(),
            chunk_index: None,
            attempts: 10,
        }
        .at_chunk(3);
        assert_eq!(busy.chunk_index(), Some(3));

        let assembly = AppError::Assembly {
            file_id: "12345678".to_string(),
            chunk_index: Some(1),
            reason: "size mismatch".to_string(),
        }
        .at_chunk(4);
        assert_eq!(assembly.chunk_index(), Some(1));

        let storage = AppError::Storage("disk full".to_string()).at_chunk(2);
        assert_eq!(storage.chunk_index(), None);
    }

    #[test]
    fn test_download_errors_are_distinguishable() {
        let expired = AppError::Expired("gone".to_string());
        let missing = AppError::NotFound("missing".to_string());
        let required = AppError::AuthRequired("code".to_string());
        let invalid = AppError::InvalidCredential("wrong".to_string());

        assert_eq!(expired.http_status_code(), 410);
        assert_eq!(missing.http_status_code(), 404);
        assert_eq!(required.http_status_code(), 401);
        assert_eq!(invalid.http_status_code(), 401);
        assert_ne!(required.error_code(), invalid.error_code());
    }

    #[test]
    fn test_sensitive_errors_hide_internals() {
        let err = AppError::Storage("disk full at /var/uploads".to_string());
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access storage");
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("outer"));
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err = AppError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}
