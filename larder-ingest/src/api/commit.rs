//! Commit handler
//!
//! POST /receipts/{id}/commit hands the selected ids to the reconciliation
//! committer. A repeated call reports `already_committed: true` with a 200,
//! matching the at-most-once contract: the retry is a success from the
//! client's point of view, nothing was merged twice.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::CommitOutcome;
use crate::AppState;

/// POST /receipts/{id}/commit request
#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub item_ids: Vec<i64>,
}

/// POST /receipts/{id}/commit
pub async fn commit_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(request): Json<CommitRequest>,
) -> ApiResult<Json<CommitOutcome>> {
    let outcome = crate::services::commit_receipt(
        &state.db,
        &state.event_bus,
        receipt_id,
        &request.item_ids,
    )
    .await?;

    Ok(Json(outcome))
}

/// Build commit routes
pub fn commit_routes() -> Router<AppState> {
    Router::new().route("/receipts/:id/commit", post(commit_receipt))
}
