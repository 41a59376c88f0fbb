use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Counts invalid access codes per file ID inside a fixed window.
#[derive(Clone)]
pub struct AttemptLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window,
        }
    }

    /// Records a failure; returns true once the key is blocked.
    pub async fn record_failure(&self, key: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let (count, reset_at) = guard
            .entry(key.to_string())
            .or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    /// Remaining block time, or `None` if the key may try again.
    pub async fn blocked_for(&self, key: &str) -> Option<Duration> {
        let mut guard = self.inner.lock().await;
        let (count, reset_at) = *guard.get(key)?;
        let now = Instant::now();
        if now >= reset_at {
            guard.remove(key);
            return None;
        }
        (count >= self.max_failures).then(|| reset_at - now)
    }

    pub async fn clear(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }

    /// Drops windows that have already reset.
    pub async fn prune(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, (_, reset_at)| now < *reset_at);
        before - guard.len()
    }
}
