//! Job submission gateway
//!
//! POST /receipts: validate the inbound image, store it, dispatch it to the
//! extraction service, insert the PENDING receipt, and hand the receipt to
//! a background watcher. Validation failures happen before any of the side
//! effects, so a rejected submission leaves nothing behind.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use larder_common::events::LarderEvent;

use crate::error::{ApiError, ApiResult};
use crate::models::{Receipt, ReceiptStatus};
use crate::AppState;

/// POST /receipts response
#[derive(Debug, Serialize)]
pub struct SubmitReceiptResponse {
    pub receipt_id: Uuid,
    pub status: ReceiptStatus,
}

/// POST /receipts
///
/// Accepts a raw image body. Returns 201 with the receipt id as soon as the
/// extraction request is dispatched; completion is observed by the watcher,
/// not by this call.
pub async fn submit_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SubmitReceiptResponse>)> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !media_type.starts_with("image/") {
        return Err(ApiError::Validation(format!(
            "Content-Type must be an image type, got '{}'",
            media_type
        )));
    }

    let max_bytes = state.config.ingest.max_upload_bytes;
    if body.is_empty() {
        return Err(ApiError::Validation("Image payload is empty".to_string()));
    }
    if body.len() > max_bytes {
        return Err(ApiError::Validation(format!(
            "Image is {} bytes, maximum is {}",
            body.len(),
            max_bytes
        )));
    }

    // A declared image type whose bytes are not an image is rejected the
    // same way as a bad Content-Type
    let kind = infer::get(&body).ok_or_else(|| {
        ApiError::Validation("Payload is not a recognizable image".to_string())
    })?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ApiError::Validation(format!(
            "Payload is {}, not an image",
            kind.mime_type()
        )));
    }

    let owner_id = headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let receipt_id = Uuid::new_v4();

    // Store the image before dispatch so the path can go on the row
    let image_dir = state.config.image_dir();
    tokio::fs::create_dir_all(&image_dir).await?;
    let image_path = image_dir.join(format!("{}.{}", receipt_id, kind.extension()));
    tokio::fs::write(&image_path, &body).await?;

    // Exactly one dispatch per successful submission. If the service
    // refuses the image, undo the stored file and create no row.
    let extraction_job_id = match state.extraction.submit(&body, &media_type).await {
        Ok(job_id) => job_id,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&image_path).await {
                tracing::warn!(
                    path = %image_path.display(),
                    error = %remove_err,
                    "Failed to remove image after rejected dispatch"
                );
            }
            return Err(e.into());
        }
    };

    let now = chrono::Utc::now();
    let receipt = Receipt {
        id: receipt_id,
        owner_id,
        extraction_job_id: extraction_job_id.clone(),
        status: ReceiptStatus::Pending,
        merchant_name: None,
        purchase_date: None,
        total_amount: None,
        tax_amount: None,
        image_path: Some(image_path.to_string_lossy().to_string()),
        processing_error: None,
        is_duplicate: false,
        duplicate_of_id: None,
        committed: false,
        created_at: now,
        updated_at: now,
    };
    crate::db::receipts::insert_receipt(&state.db, &receipt).await?;

    tracing::info!(
        receipt_id = %receipt_id,
        extraction_job_id = %extraction_job_id,
        bytes = body.len(),
        "Receipt submitted and dispatched"
    );
    state.event_bus.emit_lossy(LarderEvent::ReceiptSubmitted {
        receipt_id,
        timestamp: now,
    });

    state
        .poller
        .spawn_watcher(&state.watchers, receipt_id, extraction_job_id)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SubmitReceiptResponse {
            receipt_id,
            status: ReceiptStatus::Pending,
        }),
    ))
}

/// Build submission routes
pub fn submission_routes() -> Router<AppState> {
    Router::new().route("/receipts", post(submit_receipt))
}
