//! Chunk digests.
//!
//! Every chunk is hashed with SHA-256 and compared with the digest the client
//! declared before it is stored. The assembler hashes again while streaming.

use ferry_core::{AppError, FileId};
use sha2::{Digest, Sha256};

#[derive(Debug, Default, Clone, Copy)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Lowercase hex SHA-256 of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Checks `bytes` against the declared digest and returns the normalized
    /// digest on success.
    pub fn verify(
        &self,
        file_id: &FileId,
        chunk_index: u32,
        bytes: &[u8],
        declared: &str,
    ) -> Result<String, AppError> {
        let actual = self.digest(bytes);
        let expected = declared.trim().to_ascii_lowercase();
        if actual != expected {
            tracing::warn!(
                file_id = %file_id,
                chunk_index = chunk_index,
                expected = %expected,
                actual = %actual,
                "Chunk digest mismatch"
            );
            return Err(AppError::Integrity {
                file_id: file_id.to_string(),
                chunk_index,
                expected,
                actual,
            });
        }
        Ok(actual)
    }
}

/// Incremental digest for data read in pieces.
#[derive(Default)]
pub struct StreamingDigest {
    hasher: Sha256,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> FileId {
        FileId::parse("12345678").unwrap()
    }

    #[test]
    fn test_known_digest() {
        let verifier = IntegrityVerifier::new();
        assert_eq!(
            verifier.digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_accepts_uppercase_declared_digest() {
        let verifier = IntegrityVerifier::new();
        let declared = verifier.digest(b"chunk").to_uppercase();
        let normalized = verifier.verify(&id(), 0, b"chunk", &declared).unwrap();
        assert_eq!(normalized, verifier.digest(b"chunk"));
    }

    #[test]
    fn test_verify_rejects_mismatch_with_chunk_index() {
        let verifier = IntegrityVerifier::new();
        let declared = verifier.digest(b"other");
        let err = verifier.verify(&id(), 5, b"chunk", &declared).unwrap_err();
        assert!(matches!(err, AppError::Integrity { chunk_index: 5, .. }));
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let verifier = IntegrityVerifier::new();
        let mut streaming = StreamingDigest::new();
        streaming.update(b"hello ");
        streaming.update(b"world");
        assert_eq!(streaming.finalize_hex(), verifier.digest(b"hello world"));
    }
}
