//! HTTP request handlers

pub mod cleanup;
pub mod download;
pub mod files;
pub mod health;
pub mod upload;

use ferry_core::{AppError, FileId};

/// Parses a file ID taken from the request path.
pub(crate) fn path_file_id(raw: &str) -> Result<FileId, AppError> {
    FileId::parse(raw)
}
