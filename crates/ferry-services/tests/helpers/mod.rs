//! Shared fixtures: a fully wired service stack over two temp directories
//! and a manual clock.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use ferry_core::{ChunkDeclaration, ChunkReceipt, FileId, ManualClock, SharedClock, UploadLimits};
use ferry_services::credential::Argon2Hasher;
use ferry_services::locking::{Backoff, InMemoryLock};
use ferry_services::{
    AssemblyEngine, AttemptLimiter, ChunkUpload, CredentialHasher, DownloadGate, IntegrityVerifier,
    MetadataLedger, RetentionManager, SessionLocks, UploadService,
};
use ferry_storage::{ArtifactStore, ChunkStore, LocalArtifactStore, LocalChunkStore};
use tempfile::TempDir;

pub const MAX_CREDENTIAL_FAILURES: u32 = 3;

pub struct Harness {
    pub upload: Arc<UploadService>,
    pub gate: DownloadGate,
    pub retention: RetentionManager,
    pub engine: Arc<AssemblyEngine>,
    pub locks: SessionLocks,
    pub chunks: Arc<dyn ChunkStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub clock: Arc<ManualClock>,
    pub temp_dir: TempDir,
    pub final_dir: TempDir,
}

pub async fn harness() -> Harness {
    harness_with_locks(SessionLocks::new(
        Arc::new(InMemoryLock::new(Duration::from_secs(30))),
        Backoff::new(Duration::from_millis(5), Duration::from_millis(40), 100),
    ))
    .await
}

pub async fn harness_with_locks(locks: SessionLocks) -> Harness {
    let temp_dir = TempDir::new().expect("temp dir");
    let final_dir = TempDir::new().expect("final dir");

    let chunks: Arc<dyn ChunkStore> = Arc::new(
        LocalChunkStore::new(temp_dir.path())
            .await
            .expect("chunk store"),
    );
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        LocalArtifactStore::new(final_dir.path())
            .await
            .expect("artifact store"),
    );

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let shared_clock: SharedClock = clock.clone();

    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::low_cost());

    let engine = Arc::new(AssemblyEngine::new(chunks.clone(), artifacts.clone()));
    let ledger = Arc::new(MetadataLedger::new(
        chunks.clone(),
        artifacts.clone(),
        locks.clone(),
        engine.clone(),
        shared_clock.clone(),
    ));
    let upload = Arc::new(UploadService::new(
        chunks.clone(),
        hasher.clone(),
        ledger,
        UploadLimits::default(),
    ));
    let gate = DownloadGate::new(
        artifacts.clone(),
        chunks.clone(),
        hasher,
        AttemptLimiter::new(MAX_CREDENTIAL_FAILURES, Duration::from_secs(900)),
        shared_clock.clone(),
    );
    let retention = RetentionManager::new(
        chunks.clone(),
        artifacts.clone(),
        locks.clone(),
        shared_clock,
        chrono::Duration::hours(24),
    );

    Harness {
        upload,
        gate,
        retention,
        engine,
        locks,
        chunks,
        artifacts,
        clock,
        temp_dir,
        final_dir,
    }
}

pub fn file_id(raw: &str) -> FileId {
    FileId::parse(raw).expect("valid file id")
}

pub fn digest(bytes: &[u8]) -> String {
    IntegrityVerifier::new().digest(bytes)
}

/// Deterministic, non-repeating test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// A file split into fixed-size chunks, with the declaration for each.
pub struct Plan {
    pub file_id: FileId,
    pub file_name: String,
    pub content: Vec<u8>,
    pub chunk_size: usize,
    pub duration_hours: u32,
    pub credential: Option<String>,
}

impl Plan {
    pub fn new(file_id: &str, content: Vec<u8>, chunk_size: usize) -> Self {
        Self {
            file_id: self::file_id(file_id),
            file_name: "report.pdf".to_string(),
            content,
            chunk_size,
            duration_hours: 1,
            credential: None,
        }
    }

    pub fn protected(mut self, credential: &str) -> Self {
        self.credential = Some(credential.to_string());
        self
    }

    pub fn hours(mut self, duration_hours: u32) -> Self {
        self.duration_hours = duration_hours;
        self
    }

    pub fn total_chunks(&self) -> u32 {
        self.content.len().div_ceil(self.chunk_size) as u32
    }

    pub fn chunk_bytes(&self, index: u32) -> Bytes {
        let start = index as usize * self.chunk_size;
        let end = (start + self.chunk_size).min(self.content.len());
        Bytes::copy_from_slice(&self.content[start..end])
    }

    pub fn declaration(&self, index: u32) -> ChunkDeclaration {
        ChunkDeclaration {
            file_id: self.file_id.clone(),
            file_name: self.file_name.clone(),
            original_file_size: self.content.len() as u64,
            total_chunks: self.total_chunks(),
            chunk_index: index,
            duration_hours: self.duration_hours,
            is_protected: self.credential.is_some(),
            chunk_digest: digest(&self.chunk_bytes(index)),
        }
    }

    pub fn chunk(&self, index: u32) -> ChunkUpload {
        ChunkUpload {
            declaration: self.declaration(index),
            credential: self.credential.clone(),
            data: self.chunk_bytes(index),
        }
    }
}

impl Harness {
    pub async fn send(
        &self,
        plan: &Plan,
        index: u32,
    ) -> Result<ChunkReceipt, ferry_core::AppError> {
        self.upload.receive_chunk(plan.chunk(index)).await
    }

    /// Sends every chunk in index order and returns the last receipt.
    pub async fn upload_all(&self, plan: &Plan) -> ChunkReceipt {
        let mut last = None;
        for index in 0..plan.total_chunks() {
            last = Some(self.send(plan, index).await.expect("chunk accepted"));
        }
        last.expect("at least one chunk")
    }

    /// Reads a published artifact completely.
    pub async fn download(&self, file_id: &FileId, credential: Option<&str>) -> Vec<u8> {
        use futures::StreamExt;

        let grant = self
            .gate
            .authorize(file_id, credential)
            .await
            .expect("authorized");
        let mut artifact = self.gate.open(&grant).await.expect("artifact opens");
        let mut out = Vec::new();
        while let Some(piece) = artifact.stream.next().await {
            out.extend_from_slice(&piece.expect("artifact bytes"));
        }
        out
    }
}
