//! Test helpers: build the router over temp directories and a manual clock.
//!
//! Run from workspace root: `cargo test -p ferry-api`.
#![allow(dead_code)]

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use chrono::{TimeZone, Utc};
use ferry_api::constants::{self, fields};
use ferry_api::setup::{routes, services};
use ferry_core::{Config, ManualClock, SharedClock};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

pub const CLEANUP_TOKEN: &str = "test-cleanup-token-0123456789";

/// API path prefix for tests (e.g. `/api`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server, clock and owned storage roots.
pub struct TestApp {
    pub server: TestServer,
    pub clock: Arc<ManualClock>,
    pub config: Config,
    pub _temp_dir: TempDir,
    pub _final_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Same as [`setup_test_app`] with a hook to adjust the configuration.
pub async fn setup_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let final_dir = tempfile::tempdir().expect("Failed to create final directory");

    let mut config = Config::with_roots(temp_dir.path(), final_dir.path());
    config.cleanup_token = Some(CLEANUP_TOKEN.to_string());
    config.credential_max_failures = 3;
    adjust(&mut config);

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let shared: SharedClock = clock.clone();

    let state = services::initialize_services(&config, shared)
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        clock,
        config,
        _temp_dir: temp_dir,
        _final_dir: final_dir,
    }
}

pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A file to upload in fixed-size chunks.
#[derive(Clone)]
pub struct Upload {
    pub file_id: String,
    pub file_name: String,
    pub content: Vec<u8>,
    pub chunk_size: usize,
    pub duration_hours: u32,
    pub password: Option<String>,
}

impl Upload {
    pub fn new(file_id: &str, content: Vec<u8>, chunk_size: usize) -> Self {
        Self {
            file_id: file_id.to_string(),
            file_name: "report.pdf".to_string(),
            content,
            chunk_size,
            duration_hours: 1,
            password: None,
        }
    }

    pub fn protected(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn total_chunks(&self) -> usize {
        self.content.len().div_ceil(self.chunk_size).max(1)
    }

    pub fn chunk_bytes(&self, index: usize) -> Vec<u8> {
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.content.len());
        self.content[start..end].to_vec()
    }

    pub fn form(&self, index: usize) -> MultipartForm {
        self.form_with_digest(index, &digest(&self.chunk_bytes(index)))
    }

    /// Chunk form carrying an arbitrary declared digest.
    pub fn form_with_digest(&self, index: usize, chunk_digest: &str) -> MultipartForm {
        let bytes = self.chunk_bytes(index);
        let mut form = MultipartForm::new()
            .add_text(fields::FILE_ID, self.file_id.clone())
            .add_text(fields::FILE_NAME, self.file_name.clone())
            .add_text(fields::FILE_SIZE, self.content.len().to_string())
            .add_text(fields::CHUNK_INDEX, index.to_string())
            .add_text(fields::TOTAL_CHUNKS, self.total_chunks().to_string())
            .add_text(fields::DURATION, self.duration_hours.to_string())
            .add_text(fields::IS_PROTECTED, self.password.is_some().to_string())
            .add_text(fields::CHUNK_HASH, chunk_digest.to_string());
        if let Some(password) = &self.password {
            form = form.add_text(fields::PASSWORD, password.clone());
        }
        form.add_part(
            fields::CHUNK,
            Part::bytes(bytes)
                .file_name("blob")
                .mime_type("application/octet-stream"),
        )
    }
}

pub async fn send_chunk(client: &TestServer, upload: &Upload, index: usize) -> TestResponse {
    client
        .post(&api_path("/upload"))
        .multipart(upload.form(index))
        .await
}

/// Sends every chunk in order and returns the last response.
pub async fn upload_all(client: &TestServer, upload: &Upload) -> TestResponse {
    let mut last = None;
    for index in 0..upload.total_chunks() {
        let response = send_chunk(client, upload, index).await;
        assert_eq!(response.status_code(), 200, "chunk {}: {}", index, response.text());
        last = Some(response);
    }
    last.expect("at least one chunk")
}
