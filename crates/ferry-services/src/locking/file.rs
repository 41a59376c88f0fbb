use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use ferry_core::AppError;
use uuid::Uuid;

use super::{LockRelease, NamedLock};

/// Named locks as `{dir}/{name}.lock` files created with `O_EXCL`.
///
/// Works across processes sharing a filesystem. A lock file whose mtime is
/// older than `stale_after` belongs to a crashed holder and is reclaimed.
#[derive(Clone, Debug)]
pub struct FileLock {
    dir: PathBuf,
    stale_after: Duration,
}

impl FileLock {
    pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!(
                "Failed to create lock directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir, stale_after })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", name))
    }

    fn create(path: &Path, token: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(token.as_bytes())?;
        Ok(())
    }

    fn is_stale(&self, path: &Path) -> bool {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        matches!(age, Some(age) if age >= self.stale_after)
    }
}

struct FileRelease {
    path: PathBuf,
    token: String,
}

impl LockRelease for FileRelease {
    fn release(self: Box<Self>) {
        match fs::read_to_string(&self.path) {
            Ok(current) if current == self.token => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
                }
            }
            // Reclaimed by another holder, or already gone.
            _ => {}
        }
    }
}

impl NamedLock for FileLock {
    fn try_lock(&self, name: &str) -> Result<Option<Box<dyn LockRelease>>, AppError> {
        let path = self.path_for(name);
        let token = Uuid::new_v4().to_string();

        match Self::create(&path, &token) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !self.is_stale(&path) {
                    return Ok(None);
                }
                tracing::warn!(lock = %name, path = %path.display(), "Reclaiming stale lock file");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(AppError::Storage(format!(
                            "Failed to reclaim lock {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
                // Someone else may reclaim it first; that is contention, not failure.
                match Self::create(&path, &token) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
                    Err(e) => {
                        return Err(AppError::Storage(format!(
                            "Failed to create lock {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to create lock {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        Ok(Some(Box::new(FileRelease { path, token })))
    }

    fn blocks(&self) -> bool {
        true
    }
}
