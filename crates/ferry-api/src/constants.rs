//! Route paths and protocol field names.

/// API base path prefix
pub const API_PREFIX: &str = "/api";

/// Multipart field names sent by the upload client
pub mod fields {
    pub const FILE_ID: &str = "fileId";
    pub const FILE_NAME: &str = "fileName";
    pub const FILE_SIZE: &str = "fileSize";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const DURATION: &str = "duration";
    pub const IS_PROTECTED: &str = "isProtected";
    /// Older clients send this instead of `isProtected`
    pub const IS_ENCRYPTED: &str = "isEncrypted";
    pub const PASSWORD: &str = "password";
    pub const CHUNK_HASH: &str = "chunkHash";
    pub const CHUNK: &str = "chunk";
}

/// Multipart overhead allowed on top of the chunk ceiling
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
