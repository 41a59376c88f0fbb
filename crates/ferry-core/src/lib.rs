//! Ferry Core Library
//!
//! Domain models, the unified error taxonomy, configuration, validation and the
//! injectable clock shared by every ferry crate.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, LockBackend, LockSettings, RetentionSettings, UploadLimits};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ChunkDeclaration, ChunkReceipt, CleanupSummary, FileId, FileInfo, SessionStatus, SweepReport,
    UploadSession, SCHEMA_VERSION,
};
