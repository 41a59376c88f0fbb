//! Data models shared by storage, services and the API.

mod chunk;
mod file_id;
mod retention;
mod session;

pub use chunk::{ChunkDeclaration, ChunkReceipt};
pub use file_id::FileId;
pub use retention::{CleanupSummary, SweepReport};
pub use session::{format_file_size, FileInfo, SessionStatus, UploadSession};

pub use crate::constants::SCHEMA_VERSION;
