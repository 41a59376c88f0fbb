//! Upload assembly, access control and retention for ferry.

pub mod assembly;
pub mod credential;
pub mod download;
pub mod integrity;
pub mod ledger;
pub mod locking;
pub mod retention;
pub mod upload;

pub use assembly::{AssemblyEngine, PreparedArtifact};
pub use credential::{secure_compare, Argon2Hasher, AttemptLimiter, CredentialHasher};
pub use download::{DownloadGate, DownloadGrant};
pub use integrity::{IntegrityVerifier, StreamingDigest};
pub use ledger::MetadataLedger;
pub use locking::{SessionLockGuard, SessionLocks};
#[cfg(feature = "cleanup")]
pub use retention::RetentionScheduler;
pub use retention::{RetentionManager, Sweeper};
pub use upload::{ChunkUpload, UploadService};
