//! Local filesystem backends.

mod artifacts;
mod chunks;

pub use artifacts::LocalArtifactStore;
pub use chunks::LocalChunkStore;
