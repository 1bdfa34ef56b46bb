//! Receipt listing, detail, recheck, and delete handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_common::events::LarderEvent;

use crate::error::{ApiError, ApiResult};
use crate::models::{LineItem, Receipt};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// GET /receipts query parameters
#[derive(Debug, Deserialize)]
pub struct ListReceiptsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /receipts response
#[derive(Debug, Serialize)]
pub struct ListReceiptsResponse {
    pub receipts: Vec<Receipt>,
}

/// GET /receipts/{id} response: the receipt plus its line items
#[derive(Debug, Serialize)]
pub struct ReceiptDetailResponse {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub line_items: Vec<LineItem>,
}

/// POST /receipts/{id}/recheck response
#[derive(Debug, Serialize)]
pub struct RecheckResponse {
    pub receipt_id: Uuid,
    pub started: bool,
}

/// GET /receipts
///
/// Newest first. An X-Owner-Id header narrows the listing to that owner.
pub async fn list_receipts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListReceiptsQuery>,
) -> ApiResult<Json<ListReceiptsResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let owner_id = headers.get("x-owner-id").and_then(|v| v.to_str().ok());

    let receipts =
        crate::db::receipts::list_receipts(&state.db, owner_id, limit, offset).await?;

    Ok(Json(ListReceiptsResponse { receipts }))
}

/// GET /receipts/{id}
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> ApiResult<Json<ReceiptDetailResponse>> {
    let receipt = load_receipt(&state, receipt_id).await?;
    let line_items = crate::db::line_items::list_for_receipt(&state.db, receipt_id).await?;

    Ok(Json(ReceiptDetailResponse {
        receipt,
        line_items,
    }))
}

/// POST /receipts/{id}/recheck
///
/// Restarts a bounded poll for a receipt whose previous poll timed out.
/// A no-op on terminal receipts and on receipts that already have an
/// active watcher, reported as `started: false` rather than an error.
pub async fn recheck_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> ApiResult<Json<RecheckResponse>> {
    let receipt = load_receipt(&state, receipt_id).await?;

    if receipt.status.is_terminal() {
        return Ok(Json(RecheckResponse {
            receipt_id,
            started: false,
        }));
    }

    if state.watchers.read().await.contains_key(&receipt_id) {
        return Ok(Json(RecheckResponse {
            receipt_id,
            started: false,
        }));
    }

    tracing::info!(receipt_id = %receipt_id, "Restarting bounded poll on recheck");
    state
        .poller
        .spawn_watcher(&state.watchers, receipt_id, receipt.extraction_job_id)
        .await;

    Ok(Json(RecheckResponse {
        receipt_id,
        started: true,
    }))
}

/// DELETE /receipts/{id}
///
/// Cancels the watcher first so a completion racing the delete cannot
/// write line items for a vanishing receipt, then removes the rows (items
/// cascade) and the stored image.
pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let receipt = load_receipt(&state, receipt_id).await?;

    if let Some(token) = state.watchers.read().await.get(&receipt_id) {
        token.cancel();
    }

    crate::db::receipts::delete_receipt(&state.db, receipt_id).await?;

    if let Some(path) = receipt.image_path {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    receipt_id = %receipt_id,
                    path = %path,
                    error = %e,
                    "Failed to remove stored image"
                );
            }
        }
    }

    tracing::info!(receipt_id = %receipt_id, "Receipt deleted");
    state.event_bus.emit_lossy(LarderEvent::ReceiptDeleted {
        receipt_id,
        timestamp: chrono::Utc::now(),
    });

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn load_receipt(state: &AppState, receipt_id: Uuid) -> ApiResult<Receipt> {
    crate::db::receipts::get_receipt(&state.db, receipt_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Receipt not found: {}", receipt_id)))
}

/// Build receipt routes
pub fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts", get(list_receipts))
        .route("/receipts/:id", get(get_receipt).delete(delete_receipt))
        .route("/receipts/:id/recheck", post(recheck_receipt))
}
