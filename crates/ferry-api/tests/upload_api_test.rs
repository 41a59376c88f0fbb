//! Chunk intake over HTTP.
//!
//! Run with: `cargo test -p ferry-api --test upload_api_test`

mod helpers;

use helpers::{api_path, content, send_chunk, setup_test_app, upload_all, Upload};
use serde_json::Value;

#[tokio::test]
async fn test_out_of_order_upload_assembles_once() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("12345678", content(3000), 1024);

    let first: Value = send_chunk(client, &upload, 2).await.json();
    assert_eq!(first["success"], true);
    assert_eq!(first["receivedChunks"], 1);
    assert_eq!(first["status"], "pending");
    assert!(first.get("shareLink").is_none());

    let second: Value = send_chunk(client, &upload, 0).await.json();
    assert_eq!(second["receivedChunks"], 2);

    let last = send_chunk(client, &upload, 1).await;
    assert_eq!(last.status_code(), 200);
    let last: Value = last.json();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["finalReference"], "12345678");
    assert_eq!(last["shareLink"], "12345678");

    let download = client.get(&api_path("/download/12345678")).await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(download.as_bytes().as_ref(), upload.content.as_slice());
    assert_eq!(download.header("content-length"), "3000");
    assert_eq!(download.header("cache-control"), "no-store");
    assert_eq!(
        download.header("content-disposition"),
        "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
    );
}

#[tokio::test]
async fn test_retransmitted_chunk_is_acknowledged_as_duplicate() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("22222224", content(2048), 1024);

    send_chunk(client, &upload, 0).await;
    let again = send_chunk(client, &upload, 0).await;
    assert_eq!(again.status_code(), 200);
    let again: Value = again.json();
    assert_eq!(again["duplicate"], true);
    assert_eq!(again["receivedChunks"], 1);
    assert_eq!(again["message"], "Chunk 1/2 already received");
}

#[tokio::test]
async fn test_chunk_after_completion_reports_upload_complete() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("33333331", content(100), 100);

    upload_all(client, &upload).await;
    let late = send_chunk(client, &upload, 0).await;
    assert_eq!(late.status_code(), 200);
    let late: Value = late.json();
    assert_eq!(late["duplicate"], true);
    assert_eq!(late["shareLink"], "33333331");
    assert_eq!(late["message"], "Upload already complete");
}

#[tokio::test]
async fn test_digest_mismatch_is_unprocessable() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("44444448", content(2048), 1024);

    let response = client
        .post(&api_path("/upload"))
        .multipart(upload.form_with_digest(1, &"0".repeat(64)))
        .await;
    assert_eq!(response.status_code(), 422);
    let body: Value = response.json();
    assert_eq!(body["code"], "INTEGRITY_ERROR");
    assert_eq!(body["chunk_index"], 1);
    assert_eq!(body["recoverable"], true);

    let info = client.get(&api_path("/file-info/44444448")).await;
    assert_eq!(info.status_code(), 404);
}

#[tokio::test]
async fn test_malformed_file_id_is_rejected() {
    let app = setup_test_app().await;
    let client = app.client();

    // Check digit is wrong.
    let upload = Upload::new("12345679", content(10), 10);
    let response = send_chunk(client, &upload, 0).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let response = client.get(&api_path("/download/abc")).await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_conflicting_declaration_names_the_chunk() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("12345678", content(2048), 1024);
    send_chunk(client, &upload, 0).await;

    let mut renamed = upload.clone();
    renamed.file_name = "other.pdf".to_string();
    let response = send_chunk(client, &renamed, 1).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_CHUNK");
    assert_eq!(body["chunk_index"], 1);
}

#[tokio::test]
async fn test_oversized_chunk_is_payload_too_large() {
    let app = helpers::setup_test_app_with(|config| config.limits.max_chunk_bytes = 1024).await;
    let client = app.client();
    let upload = Upload::new("87654325", content(4096), 4096);

    let response = send_chunk(client, &upload, 0).await;
    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_missing_chunk_field_names_the_index() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = axum_test::multipart::MultipartForm::new()
        .add_text("fileId", "12345678")
        .add_text("fileName", "a.txt")
        .add_text("fileSize", "10")
        .add_text("chunkIndex", "0")
        .add_text("totalChunks", "1")
        .add_text("duration", "1")
        .add_text("chunkHash", "a".repeat(64));
    let response = client.post(&api_path("/upload")).multipart(form).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_CHUNK");
    assert_eq!(body["chunk_index"], 0);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;

    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
    assert!(response.maybe_header("x-request-id").is_some());
    assert!(response.maybe_header("content-security-policy").is_some());
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .get("/health")
        .add_header("x-request-id", "trace-abc-123")
        .await;
    assert_eq!(response.header("x-request-id"), "trace-abc-123");
}
