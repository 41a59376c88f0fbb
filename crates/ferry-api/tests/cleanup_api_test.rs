//! Admin cleanup endpoints, health and API docs over HTTP.
//!
//! Run with: `cargo test -p ferry-api --test cleanup_api_test`

mod helpers;

use chrono::Duration;
use helpers::{api_path, content, send_chunk, setup_test_app, upload_all, Upload, CLEANUP_TOKEN};
use serde_json::Value;

#[tokio::test]
async fn test_cleanup_requires_the_admin_token() {
    let app = setup_test_app().await;
    let client = app.client();

    let missing = client.post(&api_path("/cleanup")).await;
    assert_eq!(missing.status_code(), 401);
    let body: Value = missing.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let wrong = client
        .post(&api_path("/cleanup"))
        .add_query_param("token", "not-the-token")
        .await;
    assert_eq!(wrong.status_code(), 401);

    let by_query = client
        .post(&api_path("/cleanup"))
        .add_query_param("token", CLEANUP_TOKEN)
        .await;
    assert_eq!(by_query.status_code(), 200);

    let by_header = client
        .get(&api_path("/cleanup"))
        .add_header("authorization", format!("Bearer {}", CLEANUP_TOKEN))
        .await;
    assert_eq!(by_header.status_code(), 200);
    let body: Value = by_header.json();
    assert_eq!(body["success"], true);
    assert!(body["expired"].is_object());
    assert!(body["temp"].is_object());
}

#[tokio::test]
async fn test_cleanup_is_disabled_without_a_configured_token() {
    let app = helpers::setup_test_app_with(|config| config.cleanup_token = None).await;
    let response = app
        .client()
        .post(&api_path("/cleanup"))
        .add_query_param("token", CLEANUP_TOKEN)
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_expired_cleanup_removes_expired_files() {
    let app = setup_test_app().await;
    let client = app.client();
    upload_all(client, &Upload::new("12345678", content(600), 300)).await;
    let mut longer = Upload::new("22222224", content(600), 300);
    longer.duration_hours = 12;
    upload_all(client, &longer).await;

    app.clock.advance(Duration::hours(2));
    let response = client
        .post(&api_path("/cleanup/expired"))
        .add_query_param("token", CLEANUP_TOKEN)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["expired"]["checked"], 2);
    assert_eq!(body["expired"]["removed"], 1);
    assert!(body.get("temp").is_none());

    assert_eq!(
        client.get(&api_path("/download/12345678")).await.status_code(),
        404
    );
    assert_eq!(
        client.get(&api_path("/download/22222224")).await.status_code(),
        200
    );
}

#[tokio::test]
async fn test_temp_cleanup_removes_stale_partial_uploads() {
    let app = setup_test_app().await;
    let client = app.client();
    send_chunk(client, &Upload::new("33333331", content(2048), 1024), 0).await;

    let fresh = client
        .post(&api_path("/cleanup/temp"))
        .add_query_param("token", CLEANUP_TOKEN)
        .await;
    let body: Value = fresh.json();
    assert_eq!(body["temp"]["removed"], 0);

    app.clock.advance(Duration::hours(25));
    let stale = client
        .post(&api_path("/cleanup/temp"))
        .add_query_param("token", CLEANUP_TOKEN)
        .await;
    assert_eq!(stale.status_code(), 200);
    let body: Value = stale.json();
    assert_eq!(body["temp"]["removed"], 1);
    assert!(body.get("expired").is_none());

    assert_eq!(
        client.get(&api_path("/file-info/33333331")).await.status_code(),
        404
    );
}

#[tokio::test]
async fn test_health_reports_both_storage_roots() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["temp_storage"], "healthy");
    assert_eq!(body["final_storage"], "healthy");
}

#[tokio::test]
async fn test_health_degrades_when_a_root_disappears() {
    let app = setup_test_app().await;
    std::fs::remove_dir_all(&app.config.final_root).unwrap();

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["temp_storage"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = setup_test_app().await;
    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let doc: Value = response.json();
    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/api/upload",
        "/api/download/{file_id}",
        "/api/files/{file_id}/verify",
        "/api/file-info/{file_id}",
        "/api/cleanup",
        "/health",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
}

#[tokio::test]
async fn test_docs_page_is_served_without_strict_csp() {
    let app = setup_test_app().await;
    let response = app.client().get("/docs").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.maybe_header("content-security-policy").is_none());
    assert_eq!(response.header("x-content-type-options"), "nosniff");
}
