//! Submission gateway tests
//!
//! A rejected submission must leave nothing behind: no receipt row, no
//! stored image, no dispatch to the extraction service.

mod helpers;

use axum::http::StatusCode;
use helpers::{create_test_app, fake_jpeg, submit_image, ScriptedExtraction};
use larder_ingest::config::IngestConfig;

async fn receipt_count(pool: &sqlx::SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM receipts")
        .fetch_one(pool)
        .await
        .expect("count")
}

fn stored_image_count(test: &helpers::TestApp) -> usize {
    let image_dir = test.state.config.image_dir();
    if !image_dir.exists() {
        return 0;
    }
    std::fs::read_dir(image_dir).expect("read dir").count()
}

#[tokio::test]
async fn test_submit_accepts_jpeg_and_creates_pending_receipt() {
    let test = create_test_app(ScriptedExtraction::processing_forever()).await;

    let (status, body) = submit_image(&test.app, fake_jpeg(2 * 1024 * 1024), "image/jpeg").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert!(body["receipt_id"].is_string());

    assert_eq!(receipt_count(&test.state.db).await, 1);
    assert_eq!(test.extraction.submit_count(), 1);
    assert_eq!(stored_image_count(&test), 1);
}

#[tokio::test]
async fn test_submit_rejects_non_image_content_type() {
    let test = create_test_app(ScriptedExtraction::processing_forever()).await;

    let (status, body) = submit_image(&test.app, fake_jpeg(1024), "application/pdf").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(receipt_count(&test.state.db).await, 0);
    assert_eq!(test.extraction.submit_count(), 0);
    assert_eq!(stored_image_count(&test), 0);
}

#[tokio::test]
async fn test_submit_rejects_oversize_payload() {
    let test = create_test_app_with_cap(1024).await;

    let (status, body) = submit_image(&test.app, fake_jpeg(2048), "image/jpeg").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(receipt_count(&test.state.db).await, 0);
    assert_eq!(test.extraction.submit_count(), 0);
    assert_eq!(stored_image_count(&test), 0);
}

#[tokio::test]
async fn test_submit_rejects_bytes_that_are_not_an_image() {
    let test = create_test_app(ScriptedExtraction::processing_forever()).await;

    // Declared image/jpeg but the bytes say otherwise
    let (status, body) =
        submit_image(&test.app, b"just some text".to_vec(), "image/jpeg").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(receipt_count(&test.state.db).await, 0);
    assert_eq!(test.extraction.submit_count(), 0);
}

#[tokio::test]
async fn test_submit_rejects_empty_body() {
    let test = create_test_app(ScriptedExtraction::processing_forever()).await;

    let (status, _) = submit_image(&test.app, vec![], "image/jpeg").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(receipt_count(&test.state.db).await, 0);
    assert_eq!(test.extraction.submit_count(), 0);
}

#[tokio::test]
async fn test_failed_dispatch_leaves_no_receipt_and_no_image() {
    let test = create_test_app(ScriptedExtraction::refusing_submission()).await;

    let (status, body) = submit_image(&test.app, fake_jpeg(1024), "image/jpeg").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "EXTRACTION_UNAVAILABLE");
    assert_eq!(receipt_count(&test.state.db).await, 0);
    // The stored file was cleaned up after the dispatch failed
    assert_eq!(stored_image_count(&test), 0);
}

#[tokio::test]
async fn test_owner_header_recorded_and_filters_listing() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    let test = create_test_app(ScriptedExtraction::processing_forever()).await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receipts")
                .header("content-type", "image/jpeg")
                .header("x-owner-id", "alice")
                .body(Body::from(fake_jpeg(512)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/receipts")
                .header("x-owner-id", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["receipts"].as_array().unwrap().len(), 0);

    let (_, json) = helpers::get(&test.app, "/receipts").await;
    assert_eq!(json["receipts"].as_array().unwrap().len(), 1);
    assert_eq!(json["receipts"][0]["owner_id"], "alice");
}

async fn create_test_app_with_cap(max_upload_bytes: usize) -> helpers::TestApp {
    helpers::create_test_app_with_config(
        ScriptedExtraction::processing_forever(),
        IngestConfig {
            max_upload_bytes,
            poll_interval_ms: 100,
            poll_max_attempts: 5,
        },
    )
    .await
}
