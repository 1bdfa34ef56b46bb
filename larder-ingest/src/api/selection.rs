//! Line-item selection handlers
//!
//! Selection only makes sense on a completed, not-yet-committed receipt;
//! anything else is a 409. The operations themselves are idempotent in
//! effect: toggling twice restores the original state, and repeating
//! select-all or select-none changes nothing further.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ReceiptStatus;
use crate::AppState;

/// Selection mutation response: the selection as it now stands
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub receipt_id: Uuid,
    pub selected_ids: Vec<i64>,
}

/// POST /receipts/{id}/items/{item_id}/toggle
pub async fn toggle_item(
    State(state): State<AppState>,
    Path((receipt_id, item_id)): Path<(Uuid, i64)>,
) -> ApiResult<Json<SelectionResponse>> {
    require_selectable(&state, receipt_id).await?;

    let flipped = crate::db::line_items::toggle_selected(&state.db, receipt_id, item_id).await?;
    if !flipped {
        return Err(ApiError::NotFound(format!(
            "Line item {} not found on receipt {}",
            item_id, receipt_id
        )));
    }

    selection_response(&state, receipt_id).await
}

/// POST /receipts/{id}/select-all
pub async fn select_all(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> ApiResult<Json<SelectionResponse>> {
    require_selectable(&state, receipt_id).await?;
    crate::db::line_items::set_all_selected(&state.db, receipt_id, true).await?;
    selection_response(&state, receipt_id).await
}

/// POST /receipts/{id}/select-none
pub async fn select_none(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> ApiResult<Json<SelectionResponse>> {
    require_selectable(&state, receipt_id).await?;
    crate::db::line_items::set_all_selected(&state.db, receipt_id, false).await?;
    selection_response(&state, receipt_id).await
}

async fn require_selectable(state: &AppState, receipt_id: Uuid) -> ApiResult<()> {
    let receipt = super::receipts::load_receipt(state, receipt_id).await?;

    if receipt.status != ReceiptStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "Receipt is {}, selection requires a completed receipt",
            receipt.status
        )));
    }
    if receipt.committed {
        return Err(ApiError::Conflict(
            "Receipt is already committed, selection is frozen".to_string(),
        ));
    }

    Ok(())
}

async fn selection_response(
    state: &AppState,
    receipt_id: Uuid,
) -> ApiResult<Json<SelectionResponse>> {
    let items = crate::db::line_items::list_for_receipt(&state.db, receipt_id).await?;
    let selected_ids = items
        .iter()
        .filter(|item| item.selected)
        .map(|item| item.id)
        .collect();

    Ok(Json(SelectionResponse {
        receipt_id,
        selected_ids,
    }))
}

/// Build selection routes
pub fn selection_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts/:id/items/:item_id/toggle", post(toggle_item))
        .route("/receipts/:id/select-all", post(select_all))
        .route("/receipts/:id/select-none", post(select_none))
}
