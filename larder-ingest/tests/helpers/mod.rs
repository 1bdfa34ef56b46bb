//! Shared test helpers: scripted fake extraction service and app builder
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::util::ServiceExt;
use uuid::Uuid;

use larder_common::events::EventBus;
use larder_ingest::config::{IngestConfig, ServiceConfig};
use larder_ingest::models::{NewLineItem, Receipt, ReceiptStatus};
use larder_ingest::services::{
    ExtractionError, ExtractionService, ExtractionStatus, RemoteLineItem, RemoteStatus,
};
use larder_ingest::AppState;

/// One scripted `fetch_status` response
pub enum ScriptStep {
    Report(ExtractionStatus),
    TransientError(String),
}

/// Fake extraction service driven by a queue of canned responses
///
/// Once the queue runs dry, `fetch_status` keeps returning the fallback
/// status so a poll loop can run out its attempt bound.
pub struct ScriptedExtraction {
    steps: Mutex<VecDeque<ScriptStep>>,
    fallback: RemoteStatus,
    fail_submit: bool,
    pub submit_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedExtraction {
    pub fn with_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: RemoteStatus::Processing,
            fail_submit: false,
            submit_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Every status query reports `processing`, forever
    pub fn processing_forever() -> Self {
        Self::with_steps(vec![])
    }

    /// `submit` fails with a network error; `fetch_status` never answers
    pub fn refusing_submission() -> Self {
        Self {
            fail_submit: true,
            ..Self::with_steps(vec![])
        }
    }

    /// Append a step to the script after construction
    pub fn push_step(&self, step: ScriptStep) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for ScriptedExtraction {
    async fn submit(&self, _image: &[u8], _media_type: &str) -> Result<String, ExtractionError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_submit {
            return Err(ExtractionError::NetworkError(
                "connection refused".to_string(),
            ));
        }
        Ok(format!("ext-job-{}", n))
    }

    async fn fetch_status(&self, _job_id: &str) -> Result<ExtractionStatus, ExtractionError> {
        // Under `start_paused`, a live blocking task inhibits tokio's
        // auto-advance. Hold one briefly per poll tick so the watcher's
        // follow-up database writes (real sqlite worker-thread round-trips)
        // complete before virtual time jumps to the next timer.
        tokio::task::spawn_blocking(|| std::thread::sleep(std::time::Duration::from_millis(5)));
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.lock().unwrap().pop_front() {
            Some(ScriptStep::Report(report)) => Ok(report),
            Some(ScriptStep::TransientError(msg)) => Err(ExtractionError::NetworkError(msg)),
            None => Ok(report(self.fallback)),
        }
    }
}

/// A bare status report with nothing else filled in
pub fn report(status: RemoteStatus) -> ExtractionStatus {
    ExtractionStatus {
        status,
        line_items: vec![],
        is_duplicate: false,
        duplicate_of: None,
        error: None,
        merchant_name: None,
        purchase_date: None,
        total_amount: None,
        tax_amount: None,
    }
}

/// A completed report carrying the given items
pub fn completed_report(items: Vec<RemoteLineItem>) -> ExtractionStatus {
    ExtractionStatus {
        status: RemoteStatus::Completed,
        line_items: items,
        merchant_name: Some("Corner Grocer".to_string()),
        purchase_date: Some("2026-08-14".to_string()),
        ..report(RemoteStatus::Completed)
    }
}

/// A failed report with its error description
pub fn failed_report(error: &str) -> ExtractionStatus {
    ExtractionStatus {
        status: RemoteStatus::Failed,
        error: Some(error.to_string()),
        ..report(RemoteStatus::Failed)
    }
}

pub fn remote_item(description: &str, quantity: f64, total_price: f64) -> RemoteLineItem {
    RemoteLineItem {
        description: description.to_string(),
        quantity,
        unit_price: None,
        total_price: Some(total_price),
        product_code: None,
    }
}

/// Everything a test needs to drive the service
pub struct TestApp {
    pub app: axum::Router,
    pub state: AppState,
    pub extraction: Arc<ScriptedExtraction>,
    // Dropping the handle deletes the directory, so hold it
    pub data_dir: tempfile::TempDir,
}

/// Build the router against an in-memory database and a scripted fake
///
/// Polls run every 100 ms for up to 5 attempts; tests using the paused
/// clock advance through them virtually.
pub async fn create_test_app(extraction: ScriptedExtraction) -> TestApp {
    create_test_app_with_config(
        extraction,
        IngestConfig {
            max_upload_bytes: 10 * 1024 * 1024,
            poll_interval_ms: 100,
            poll_max_attempts: 5,
        },
    )
    .await
}

pub async fn create_test_app_with_config(
    extraction: ScriptedExtraction,
    ingest: IngestConfig,
) -> TestApp {
    // Tests run under `start_paused`, but sqlite work happens on plain OS
    // threads tokio cannot see: left alone, the paused clock auto-advances
    // straight to sqlx's acquire timeout while a connection or release-time
    // ping is still in flight, and the pool reports `PoolTimedOut`. Pace the
    // clock instead: advance at most 1 ms of virtual time per step, with a
    // short real-time gap (a blocking task inhibits auto-advance) between
    // steps so worker threads always win the race. On an unpaused clock this
    // is just a cheap background loop.
    tokio::task::spawn(async {
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            let _ = tokio::task::spawn_blocking(|| {
                std::thread::sleep(std::time::Duration::from_micros(50));
            })
            .await;
        }
    });

    // Hold auto-advance off entirely while the pool warms up.
    let (warm_tx, warm_rx) = std::sync::mpsc::channel::<()>();
    let inhibit_auto_advance = tokio::task::spawn_blocking(move || {
        let _ = warm_rx.recv();
    });
    // One connection only: with `sqlite::memory:` every extra connection is a
    // separate empty database. No reaper timers: the paused clock would fire
    // them minutes "later" and close that sole connection mid-test.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .test_before_acquire(false)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    larder_common::db::init_schema(&pool).await.expect("schema");
    drop(warm_tx);
    let _ = inhibit_auto_advance.await;

    let data_dir = tempfile::tempdir().expect("tempdir");
    let config = ServiceConfig {
        extraction: Default::default(),
        ingest,
        data_dir: data_dir.path().to_path_buf(),
    };

    let extraction = Arc::new(extraction);
    let state = AppState::new(
        pool,
        EventBus::new(64),
        Arc::clone(&extraction) as Arc<dyn ExtractionService>,
        config,
    );
    let app = larder_ingest::build_router(state.clone());

    TestApp {
        app,
        state,
        extraction,
        data_dir,
    }
}

/// A syntactically valid JPEG payload of the given size
pub fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len.max(4)];
    bytes[0] = 0xFF;
    bytes[1] = 0xD8;
    bytes[2] = 0xFF;
    bytes[3] = 0xE0;
    bytes
}

/// POST an image to /receipts and decode the response
pub async fn submit_image(
    app: &axum::Router,
    body: Vec<u8>,
    content_type: &str,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/receipts")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    decode(response).await
}

pub async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    decode(response).await
}

pub async fn post_empty(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    decode(response).await
}

pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    decode(response).await
}

async fn decode(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Insert a receipt row directly, bypassing submission
pub async fn seed_receipt(pool: &SqlitePool, status: ReceiptStatus) -> Uuid {
    let now = chrono::Utc::now();
    let receipt = Receipt {
        id: Uuid::new_v4(),
        owner_id: None,
        extraction_job_id: format!("ext-seed-{}", Uuid::new_v4()),
        status: ReceiptStatus::Pending,
        merchant_name: None,
        purchase_date: None,
        total_amount: None,
        tax_amount: None,
        image_path: None,
        processing_error: None,
        is_duplicate: false,
        duplicate_of_id: None,
        committed: false,
        created_at: now,
        updated_at: now,
    };
    larder_ingest::db::receipts::insert_receipt(pool, &receipt)
        .await
        .expect("insert");

    match status {
        ReceiptStatus::Pending => {}
        ReceiptStatus::Processing => {
            larder_ingest::db::receipts::mark_processing(pool, receipt.id)
                .await
                .expect("processing");
        }
        ReceiptStatus::Completed => {
            let items = vec![
                new_item("Milk", 1.0, 2.49),
                new_item("Bread", 2.0, 3.98),
                new_item("Coffee", 1.0, 8.99),
            ];
            larder_ingest::db::receipts::record_completion(
                pool,
                receipt.id,
                &items,
                &Default::default(),
            )
            .await
            .expect("complete");
        }
        ReceiptStatus::Failed => {
            larder_ingest::db::receipts::record_failure(pool, receipt.id, "unreadable image")
                .await
                .expect("fail");
        }
    }

    receipt.id
}

fn new_item(description: &str, quantity: f64, total_price: f64) -> NewLineItem {
    NewLineItem {
        description: description.to_string(),
        quantity,
        unit_price: None,
        total_price: Some(total_price),
        matched_product_code: None,
    }
}
