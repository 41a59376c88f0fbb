//! Expiry and orphan cleanup.

mod manager;
#[cfg(feature = "cleanup")]
mod scheduler;

pub use manager::{RetentionManager, Sweeper};
#[cfg(feature = "cleanup")]
pub use scheduler::RetentionScheduler;
