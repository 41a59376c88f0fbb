use std::time::Duration;

use ferry_core::LockSettings;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay after failed attempt `attempt` (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl From<&LockSettings> for Backoff {
    fn from(settings: &LockSettings) -> Self {
        Self::new(
            settings.retry_base,
            settings.retry_max,
            settings.max_attempts,
        )
    }
}
