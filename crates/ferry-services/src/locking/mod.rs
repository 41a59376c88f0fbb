//! Session-scoped mutual exclusion.
//!
//! [`NamedLock`] is the primitive: a non-blocking try-lock by name with
//! staleness reclaim. [`SessionLocks`] adds bounded exponential backoff on top
//! and hands out guards that release on every exit path.

mod backoff;
mod file;
mod memory;

pub use backoff::Backoff;
pub use file::FileLock;
pub use memory::InMemoryLock;

use std::sync::Arc;

use ferry_core::{AppError, FileId, LockBackend, LockSettings};

/// Releases one acquisition of a named lock.
pub trait LockRelease: Send {
    fn release(self: Box<Self>);
}

/// Non-blocking named lock with staleness-based reclaim.
pub trait NamedLock: Send + Sync {
    /// `Ok(None)` when another live holder has the lock.
    fn try_lock(&self, name: &str) -> Result<Option<Box<dyn LockRelease>>, AppError>;

    /// True when `try_lock` does filesystem or other blocking I/O; such calls
    /// are moved off the async workers.
    fn blocks(&self) -> bool {
        false
    }
}

/// Held session lock. Dropping it releases the lock.
pub struct SessionLockGuard {
    file_id: FileId,
    release: Option<Box<dyn LockRelease>>,
}

impl SessionLockGuard {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release.release();
        }
    }
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release.release();
        }
    }
}

#[derive(Clone)]
pub struct SessionLocks {
    lock: Arc<dyn NamedLock>,
    backoff: Backoff,
}

impl SessionLocks {
    pub fn new(lock: Arc<dyn NamedLock>, backoff: Backoff) -> Self {
        Self { lock, backoff }
    }

    pub fn from_settings(settings: &LockSettings) -> Result<Self, AppError> {
        let lock: Arc<dyn NamedLock> = match settings.backend {
            LockBackend::Memory => Arc::new(InMemoryLock::new(settings.stale_after)),
            LockBackend::File => Arc::new(FileLock::new(&settings.dir, settings.stale_after)?),
        };
        Ok(Self::new(lock, Backoff::from(settings)))
    }

    /// Acquires the session lock, retrying with backoff. Exhausting the
    /// attempts is a retryable `ServerBusy`.
    pub async fn acquire(&self, file_id: &FileId) -> Result<SessionLockGuard, AppError> {
        for attempt in 0..self.backoff.max_attempts {
            if let Some(guard) = self.try_acquire(file_id).await? {
                if attempt > 0 {
                    tracing::debug!(file_id = %file_id, attempts = attempt + 1, "Session lock acquired after contention");
                }
                return Ok(guard);
            }
            if attempt + 1 < self.backoff.max_attempts {
                tokio::time::sleep(self.backoff.delay(attempt)).await;
            }
        }

        tracing::warn!(
            file_id = %file_id,
            attempts = self.backoff.max_attempts,
            "Session lock contention exceeded retry budget"
        );
        Err(AppError::ServerBusy {
            file_id: file_id.to_string(),
            chunk_index: None,
            attempts: self.backoff.max_attempts,
        })
    }

    /// Single attempt, no waiting.
    pub async fn try_acquire(&self, file_id: &FileId) -> Result<Option<SessionLockGuard>, AppError> {
        let release = if self.lock.blocks() {
            let lock = Arc::clone(&self.lock);
            let name = file_id.as_str().to_string();
            tokio::task::spawn_blocking(move || lock.try_lock(&name))
                .await
                .map_err(|e| AppError::Internal(format!("Lock task failed: {}", e)))??
        } else {
            self.lock.try_lock(file_id.as_str())?
        };

        Ok(release.map(|release| SessionLockGuard {
            file_id: file_id.clone(),
            release: Some(release),
        }))
    }
}
