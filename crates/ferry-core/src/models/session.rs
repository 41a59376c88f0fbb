use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chunk::ChunkDeclaration;
use super::file_id::FileId;
use crate::constants::SCHEMA_VERSION;
use crate::error::AppError;

/// Upload lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Assembling,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Assembling => "assembling",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Assembling)
                | (SessionStatus::Assembling, SessionStatus::Completed)
                | (SessionStatus::Assembling, SessionStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record of one upload, persisted as JSON.
///
/// `chunks` maps each received index to its verified digest; `received_chunks`
/// always equals its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub schema_version: u32,
    pub file_id: FileId,
    pub file_name: String,
    pub original_file_size: u64,
    pub total_chunks: u32,
    pub received_chunks: u32,
    #[serde(default)]
    pub chunks: BTreeMap<u32, String>,
    pub duration_hours: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_digest: Option<String>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_path: Option<String>,
}

impl UploadSession {
    /// New pending session from the first chunk's declaration.
    ///
    /// `expires_at` is fixed here and never recalculated.
    pub fn new(
        decl: &ChunkDeclaration,
        credential_digest: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            file_id: decl.file_id.clone(),
            file_name: decl.file_name.clone(),
            original_file_size: decl.original_file_size,
            total_chunks: decl.total_chunks,
            received_chunks: 0,
            chunks: BTreeMap::new(),
            duration_hours: decl.duration_hours,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(i64::from(decl.duration_hours)),
            is_protected: decl.is_protected,
            credential_digest,
            status: SessionStatus::Pending,
            failure_reason: None,
            final_path: None,
        }
    }

    /// Checks that a later chunk declares the same session as the first one.
    pub fn check_declaration(&self, decl: &ChunkDeclaration) -> Result<(), AppError> {
        let mut mismatched = Vec::new();
        if decl.file_name != self.file_name {
            mismatched.push("fileName");
        }
        if decl.original_file_size != self.original_file_size {
            mismatched.push("fileSize");
        }
        if decl.total_chunks != self.total_chunks {
            mismatched.push("totalChunks");
        }
        if decl.duration_hours != self.duration_hours {
            mismatched.push("duration");
        }
        if decl.is_protected != self.is_protected {
            mismatched.push("isProtected");
        }

        if mismatched.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidChunk {
                chunk_index: decl.chunk_index,
                message: format!(
                    "declared {} differ from the existing upload",
                    mismatched.join(", ")
                ),
            })
        }
    }

    pub fn has_chunk(&self, chunk_index: u32) -> bool {
        self.chunks.contains_key(&chunk_index)
    }

    /// Records a verified chunk. Returns `false` when the index was already recorded.
    pub fn record_chunk(
        &mut self,
        chunk_index: u32,
        digest: String,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        if self.status != SessionStatus::Pending {
            return Err(AppError::SessionClosed {
                file_id: self.file_id.to_string(),
                chunk_index,
                status: self.status.to_string(),
            });
        }
        if chunk_index >= self.total_chunks {
            return Err(AppError::InvalidChunk {
                chunk_index,
                message: format!("index must be below totalChunks ({})", self.total_chunks),
            });
        }

        let fresh = !self.chunks.contains_key(&chunk_index);
        self.chunks.insert(chunk_index, digest);
        self.received_chunks = self.chunks.len() as u32;
        self.updated_at = now;
        Ok(fresh)
    }

    pub fn is_complete(&self) -> bool {
        self.received_chunks == self.total_chunks
    }

    pub fn transition(&mut self, next: SessionStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "Illegal status transition for {}: {} -> {}",
                self.file_id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Internal consistency of a record read back from disk.
    pub fn check_integrity(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {}",
                self.schema_version
            ));
        }
        if self.received_chunks as usize != self.chunks.len() {
            return Err("receivedChunks does not match recorded chunks".to_string());
        }
        if self.received_chunks > self.total_chunks {
            return Err("receivedChunks exceeds totalChunks".to_string());
        }
        if self.chunks.keys().any(|&i| i >= self.total_chunks) {
            return Err("recorded chunk index out of range".to_string());
        }
        if self.is_protected && self.credential_digest.is_none() {
            return Err("protected session without credential digest".to_string());
        }
        Ok(())
    }
}

/// Public view of a session. Never exposes the credential digest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub file_size_display: String,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub is_protected: bool,
    pub expired: bool,
}

impl FileInfo {
    pub fn from_session(session: &UploadSession, now: DateTime<Utc>) -> Self {
        Self {
            file_id: session.file_id.clone(),
            file_name: session.file_name.clone(),
            file_size: session.original_file_size,
            file_size_display: format_file_size(session.original_file_size),
            expires_at: session.expires_at,
            status: session.status,
            received_chunks: session.received_chunks,
            total_chunks: session.total_chunks,
            is_protected: session.is_protected,
            expired: session.is_expired(now),
        }
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
