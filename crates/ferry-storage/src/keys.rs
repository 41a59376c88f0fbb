//! On-disk layout shared by the local backends.
//!
//! ```text
//! {temp_root}/{file_id}/meta.json
//! {temp_root}/{file_id}/chunk-{index}
//! {temp_root}/{file_id}/chunk-{index}.{nonce}.part
//! {final_root}/{file_id}/meta.json
//! {final_root}/{file_id}/content
//! {final_root}/.staging/{file_id}.{nonce}/
//! ```
//!
//! File IDs are digits only, so joining them onto a root cannot escape it.

use std::path::{Path, PathBuf};

use ferry_core::FileId;
use uuid::Uuid;

pub const METADATA_FILE: &str = "meta.json";
pub const BLOB_FILE: &str = "content";
pub const STAGING_DIR: &str = ".staging";
const CHUNK_PREFIX: &str = "chunk-";
const PART_SUFFIX: &str = ".part";

pub fn session_dir(root: &Path, file_id: &FileId) -> PathBuf {
    root.join(file_id.as_str())
}

pub fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
}

pub fn chunk_path(dir: &Path, chunk_index: u32) -> PathBuf {
    dir.join(format!("{}{}", CHUNK_PREFIX, chunk_index))
}

pub fn staged_chunk_path(dir: &Path, chunk_index: u32) -> PathBuf {
    dir.join(format!(
        "{}{}.{}{}",
        CHUNK_PREFIX,
        chunk_index,
        Uuid::new_v4().simple(),
        PART_SUFFIX
    ))
}

/// Location of the artifact relative to the final root.
pub fn artifact_key(file_id: &FileId) -> String {
    format!("{}/{}", file_id, BLOB_FILE)
}

pub fn staging_root(final_root: &Path) -> PathBuf {
    final_root.join(STAGING_DIR)
}

pub fn staging_dir(final_root: &Path, file_id: &FileId) -> PathBuf {
    staging_root(final_root).join(format!("{}.{}", file_id, Uuid::new_v4().simple()))
}

/// Temporary sibling used for atomic replace-by-rename.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Session directory names are file IDs; anything else is not ours.
pub fn parse_session_dir_name(name: &str) -> Option<FileId> {
    FileId::parse(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let id = FileId::parse("12345678").unwrap();
        let dir = session_dir(Path::new("/data/tmp"), &id);
        assert_eq!(dir, PathBuf::from("/data/tmp/12345678"));
        assert_eq!(chunk_path(&dir, 3), PathBuf::from("/data/tmp/12345678/chunk-3"));

        let staged = staged_chunk_path(&dir, 3);
        let name = staged.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("chunk-3."));
        assert!(name.ends_with(".part"));
        assert_ne!(staged, staged_chunk_path(&dir, 3));
    }

    #[test]
    fn test_parse_session_dir_name() {
        assert!(parse_session_dir_name("12345678").is_some());
        assert!(parse_session_dir_name(".locks").is_none());
        assert!(parse_session_dir_name(".staging").is_none());
        assert!(parse_session_dir_name("12345679").is_none());
    }
}
