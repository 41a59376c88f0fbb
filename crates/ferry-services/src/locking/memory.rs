use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ferry_core::AppError;
use uuid::Uuid;

use super::{LockRelease, NamedLock};

type Held = Arc<Mutex<HashMap<String, (Uuid, Instant)>>>;

/// Named locks held in this process only.
#[derive(Clone)]
pub struct InMemoryLock {
    held: Held,
    stale_after: Duration,
}

impl InMemoryLock {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            held: Arc::new(Mutex::new(HashMap::new())),
            stale_after,
        }
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().map(|h| h.len()).unwrap_or(0)
    }
}

struct MemoryRelease {
    held: Held,
    name: String,
    token: Uuid,
}

impl LockRelease for MemoryRelease {
    fn release(self: Box<Self>) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        // A reclaimed lock belongs to its new holder.
        if matches!(held.get(&self.name), Some((token, _)) if *token == self.token) {
            held.remove(&self.name);
        }
    }
}

impl NamedLock for InMemoryLock {
    fn try_lock(&self, name: &str) -> Result<Option<Box<dyn LockRelease>>, AppError> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if let Some((_, since)) = held.get(name) {
            if now.duration_since(*since) < self.stale_after {
                return Ok(None);
            }
            tracing::warn!(
                lock = %name,
                held_ms = now.duration_since(*since).as_millis() as u64,
                "Reclaiming stale session lock"
            );
        }

        let token = Uuid::new_v4();
        held.insert(name.to_string(), (token, now));
        Ok(Some(Box::new(MemoryRelease {
            held: Arc::clone(&self.held),
            name: name.to_string(),
            token,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_then_released() {
        let lock = InMemoryLock::new(Duration::from_secs(30));
        let first = lock.try_lock("a").unwrap().unwrap();
        assert!(lock.try_lock("a").unwrap().is_none());
        assert!(lock.try_lock("b").unwrap().is_some());

        first.release();
        assert!(lock.try_lock("a").unwrap().is_some());
    }

    #[test]
    fn test_stale_lock_reclaimed_and_old_release_is_noop() {
        let lock = InMemoryLock::new(Duration::from_millis(200));
        let stale = lock.try_lock("a").unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(250));

        let _fresh = lock.try_lock("a").unwrap().unwrap();
        stale.release();
        assert_eq!(lock.held_count(), 1);
        assert!(lock.try_lock("a").unwrap().is_none());
    }
}
