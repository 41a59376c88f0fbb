//! Ferry Storage Library
//!
//! Storage for uploads in flight and for finished artifacts.
//!
//! # Layout
//!
//! - **Temporary root**: `{file_id}/meta.json` plus `chunk-{index}` files
//! - **Final root**: `{file_id}/meta.json` plus the assembled `content`
//!
//! Artifacts are assembled under `{final_root}/.staging/` and published with a
//! single directory rename, so a final directory is either complete or absent.

pub mod factory;
pub(crate) mod fs_util;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_stores, Stores};
#[cfg(feature = "storage-local")]
pub use local::{LocalArtifactStore, LocalChunkStore};
pub use traits::{
    ArtifactStore, ArtifactStream, BlobWriter, ByteStream, ChunkReader, ChunkStore, StagedChunk,
    StagingArea, StagingEntry, StorageError, StorageResult, StoredEntry,
};
