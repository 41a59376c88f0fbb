//! Downloads, access codes, expiry and file information over HTTP.
//!
//! Run with: `cargo test -p ferry-api --test download_api_test`

mod helpers;

use chrono::Duration;
use helpers::{api_path, content, send_chunk, setup_test_app, upload_all, Upload};
use serde_json::{json, Value};

#[tokio::test]
async fn test_protected_download_requires_the_right_code() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("12345678", content(2500), 1000).protected("4821");
    upload_all(client, &upload).await;

    let missing = client.get(&api_path("/download/12345678")).await;
    assert_eq!(missing.status_code(), 401);
    let body: Value = missing.json();
    assert_eq!(body["code"], "AUTH_REQUIRED");

    let wrong = client
        .get(&api_path("/download/12345678"))
        .add_query_param("password", "0000")
        .await;
    assert_eq!(wrong.status_code(), 401);
    let body: Value = wrong.json();
    assert_eq!(body["code"], "INVALID_CREDENTIAL");

    let ok = client
        .get(&api_path("/download/12345678"))
        .add_query_param("password", "4821")
        .await;
    assert_eq!(ok.status_code(), 200);
    assert_eq!(ok.as_bytes().as_ref(), upload.content.as_slice());
}

#[tokio::test]
async fn test_verify_endpoint_checks_code_without_streaming() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("22222224", content(500), 500).protected("4821");
    upload_all(client, &upload).await;

    let ok = client
        .post(&api_path("/files/22222224/verify"))
        .json(&json!({ "password": "4821" }))
        .await;
    assert_eq!(ok.status_code(), 200);
    let body: Value = ok.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["isProtected"], true);
    assert_eq!(body["fileName"], "report.pdf");

    let none = client
        .post(&api_path("/files/22222224/verify"))
        .json(&json!({}))
        .await;
    assert_eq!(none.status_code(), 401);
}

#[tokio::test]
async fn test_verify_rejects_malformed_json() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .post(&api_path("/files/22222224/verify"))
        .bytes(bytes::Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_repeated_wrong_codes_are_throttled() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("33333331", content(500), 500).protected("4821");
    upload_all(client, &upload).await;

    let mut last = None;
    for _ in 0..app.config.credential_max_failures {
        last = Some(
            client
                .get(&api_path("/download/33333331"))
                .add_query_param("password", "0000")
                .await,
        );
    }
    let last = last.unwrap();
    assert_eq!(last.status_code(), 429);
    let retry_after: u64 = last.header("retry-after").to_str().unwrap().parse().unwrap();
    assert!(retry_after >= 1);

    // Blocked even with the right code until the window passes.
    let blocked = client
        .get(&api_path("/download/33333331"))
        .add_query_param("password", "4821")
        .await;
    assert_eq!(blocked.status_code(), 429);
    let body: Value = blocked.json();
    assert_eq!(body["code"], "TOO_MANY_ATTEMPTS");
    assert_eq!(body["recoverable"], true);
}

#[tokio::test]
async fn test_expired_file_is_gone_but_still_described() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("44444448", content(800), 400);
    upload_all(client, &upload).await;

    app.clock.advance(Duration::minutes(59));
    assert_eq!(
        client.get(&api_path("/download/44444448")).await.status_code(),
        200
    );

    app.clock.advance(Duration::minutes(2));
    let gone = client.get(&api_path("/download/44444448")).await;
    assert_eq!(gone.status_code(), 410);
    let body: Value = gone.json();
    assert_eq!(body["code"], "EXPIRED");

    let info: Value = client.get(&api_path("/file-info/44444448")).await.json();
    assert_eq!(info["expired"], true);
    assert_eq!(info["status"], "completed");
}

#[tokio::test]
async fn test_expiry_is_checked_before_the_code() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("87654325", content(300), 300).protected("4821");
    upload_all(client, &upload).await;

    app.clock.advance(Duration::hours(2));
    let response = client.get(&api_path("/download/87654325")).await;
    assert_eq!(response.status_code(), 410);
}

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let app = setup_test_app().await;
    let client = app.client();

    assert_eq!(
        client.get(&api_path("/download/11111117")).await.status_code(),
        404
    );
    let info = client.get(&api_path("/file-info/11111117")).await;
    assert_eq!(info.status_code(), 404);
    let body: Value = info.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_file_info_reports_progress_then_completion() {
    let app = setup_test_app().await;
    let client = app.client();
    let upload = Upload::new("12345678", content(2048), 1024).protected("4821");

    send_chunk(client, &upload, 1).await;
    let partial: Value = client.get(&api_path("/file-info/12345678")).await.json();
    assert_eq!(partial["status"], "pending");
    assert_eq!(partial["receivedChunks"], 1);
    assert_eq!(partial["totalChunks"], 2);
    assert_eq!(partial["isProtected"], true);
    assert!(partial.get("credentialDigest").is_none());

    send_chunk(client, &upload, 0).await;
    let done: Value = client.get(&api_path("/file-info/12345678")).await.json();
    assert_eq!(done["status"], "completed");
    assert_eq!(done["fileSizeDisplay"], "2.00 KB");
    assert_eq!(done["expired"], false);
}

#[tokio::test]
async fn test_unicode_file_name_is_encoded_in_disposition() {
    let app = setup_test_app().await;
    let client = app.client();
    let mut upload = Upload::new("22222224", content(64), 64);
    upload.file_name = "résumé.pdf".to_string();
    upload_all(client, &upload).await;

    let response = client.get(&api_path("/download/22222224")).await;
    let disposition = response.header("content-disposition");
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.contains("filename=\"r_sum_.pdf\""));
    assert!(disposition.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
}
