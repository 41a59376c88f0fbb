//! Expired and orphaned upload cleanup.

mod helpers;

use chrono::Duration;
use ferry_core::SessionStatus;
use ferry_services::Sweeper;
use helpers::{content, harness, Plan};

#[tokio::test]
async fn test_expired_artifacts_are_removed_once() {
    let h = harness().await;
    let short = Plan::new("12345678", content(900), 1024).hours(1);
    let long = Plan::new("87654325", content(900), 1024).hours(24);
    h.upload_all(&short).await;
    h.upload_all(&long).await;

    h.clock.advance(Duration::hours(2));

    let first = h.retention.sweep_expired().await;
    assert_eq!(first.checked, 2);
    assert_eq!(first.removed, 1);
    assert_eq!(first.failed, 0);
    assert!(!h.artifacts.exists(&short.file_id).await.unwrap());
    assert!(h.artifacts.exists(&long.file_id).await.unwrap());

    let second = h.retention.sweep_expired().await;
    assert_eq!(second.removed, 0);
    assert_eq!(second.checked, 1);
}

#[tokio::test]
async fn test_final_directory_without_metadata_is_removed() {
    let h = harness().await;
    let plan = Plan::new("12345678", content(900), 1024).hours(24);
    h.upload_all(&plan).await;

    tokio::fs::remove_file(h.final_dir.path().join("12345678/meta.json"))
        .await
        .unwrap();

    let report = h.retention.sweep_expired().await;
    assert_eq!(report.removed, 1);
    assert!(!h.final_dir.path().join("12345678").exists());
}

#[tokio::test]
async fn test_stale_partial_upload_is_removed() {
    let h = harness().await;
    let stale = Plan::new("12345678", content(3072), 1024);
    h.send(&stale, 0).await.unwrap();

    h.clock.advance(Duration::hours(25));

    let fresh = Plan::new("87654325", content(3072), 1024);
    h.send(&fresh, 0).await.unwrap();

    let report = h.retention.sweep_orphans().await;
    assert_eq!(report.removed, 1);
    assert!(!h.temp_dir.path().join("12345678").exists());
    assert!(h.temp_dir.path().join("87654325").exists());

    let again = h.retention.sweep_orphans().await;
    assert_eq!(again.removed, 0);
}

#[tokio::test]
async fn test_temp_directory_without_metadata_is_removed_immediately() {
    let h = harness().await;
    let orphan = h.temp_dir.path().join("12345678");
    tokio::fs::create_dir_all(&orphan).await.unwrap();
    tokio::fs::write(orphan.join("chunk-0"), b"leftover").await.unwrap();

    let report = h.retention.sweep_orphans().await;
    assert_eq!(report.removed, 1);
    assert!(!orphan.exists());
}

#[tokio::test]
async fn test_locked_session_is_skipped() {
    let h = harness().await;
    let plan = Plan::new("12345678", content(3072), 1024);
    h.send(&plan, 0).await.unwrap();
    h.clock.advance(Duration::hours(25));

    let guard = h.locks.try_acquire(&plan.file_id).await.unwrap().expect("lock free");
    let report = h.retention.sweep_orphans().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.removed, 0);
    drop(guard);

    let report = h.retention.sweep_orphans().await;
    assert_eq!(report.removed, 1);
}

#[tokio::test]
async fn test_full_sweep_does_not_touch_active_uploads() {
    let h = harness().await;
    let done = Plan::new("12345678", content(900), 1024).hours(24);
    h.upload_all(&done).await;
    let partial = Plan::new("87654325", content(3072), 1024);
    h.send(&partial, 1).await.unwrap();

    let summary = h.retention.sweep().await;
    assert_eq!(summary.expired.removed, 0);
    assert_eq!(summary.temp.removed, 0);

    let session = h.chunks.load_metadata(&partial.file_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(h.download(&done.file_id, None).await, done.content);
}

#[tokio::test]
async fn test_late_chunk_after_orphan_sweep_starts_fresh_session() {
    let h = harness().await;
    let plan = Plan::new("33333331", content(3072), 1024);
    h.send(&plan, 0).await.unwrap();
    h.send(&plan, 1).await.unwrap();
    let abandoned = h.chunks.load_metadata(&plan.file_id).await.unwrap().unwrap();

    h.clock.advance(Duration::hours(25));
    let report = h.retention.sweep_orphans().await;
    assert_eq!(report.removed, 1);

    // The old chunks are gone; the late one opens a new session on its own.
    let receipt = h.send(&plan, 2).await.unwrap();
    assert_eq!(receipt.status, SessionStatus::Pending);
    assert_eq!(receipt.received_chunks, 1);
    assert!(!receipt.duplicate);

    let fresh = h.chunks.load_metadata(&plan.file_id).await.unwrap().unwrap();
    assert!(fresh.created_at > abandoned.created_at);
    assert!(!fresh.has_chunk(0));
    assert!(fresh.has_chunk(2));
}
