//! Fixed protocol values.

/// Number of digits in a file ID, checksum digit included.
pub const FILE_ID_LEN: usize = 8;

/// Hex length of a SHA-256 chunk digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Version written into every persisted session record.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum length of a preserved file name.
pub const MAX_FILE_NAME_LEN: usize = 255;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
