//! Filesystem helpers shared by the local backends: atomic JSON records,
//! idempotent directory removal and root listing.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use ferry_core::UploadSession;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::keys::{parse_session_dir_name, temp_sibling};
use crate::traits::{StorageError, StorageResult, StoredEntry};

/// Reads a session record. `None` if the file does not exist.
pub async fn read_session(path: &Path) -> StorageResult<Option<UploadSession>> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::ReadFailed(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let session: UploadSession = serde_json::from_slice(&raw)
        .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?;
    session
        .check_integrity()
        .map_err(|reason| StorageError::Corrupt(format!("{}: {}", path.display(), reason)))?;
    Ok(Some(session))
}

/// Writes a session record through a temporary sibling and a rename, so a
/// reader sees either the old or the new record.
pub async fn write_session_atomic(path: &Path, session: &UploadSession) -> StorageResult<()> {
    let body = serde_json::to_vec_pretty(session)
        .map_err(|e| StorageError::WriteFailed(format!("Failed to encode metadata: {}", e)))?;
    let tmp = temp_sibling(path);

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!(
                "Directory of {} no longer exists",
                path.display()
            )),
            _ => StorageError::WriteFailed(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )),
        });
    }
    Ok(())
}

/// Removes a directory tree; a missing directory is not an error.
pub async fn remove_dir_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::DeleteFailed(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

pub async fn modified_at(path: &Path) -> StorageResult<DateTime<Utc>> {
    let meta = fs::metadata(path).await?;
    let modified = meta.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Lists directories directly under `root` whose names are file IDs.
pub async fn list_session_dirs(root: &Path) -> StorageResult<Vec<StoredEntry>> {
    let mut entries = Vec::new();
    let mut dir = match fs::read_dir(root).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(file_id) = parse_session_dir_name(&name) else {
            continue;
        };
        // The entry may be removed by a concurrent sweep between listing and stat.
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            continue;
        }
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        entries.push(StoredEntry { file_id, modified });
    }

    entries.sort_by(|a, b| a.file_id.cmp(&b.file_id));
    Ok(entries)
}
