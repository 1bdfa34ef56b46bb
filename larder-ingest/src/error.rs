//! API error types for larder-ingest
//!
//! Maps workflow errors onto HTTP statuses. Commit input errors stay 400,
//! commit on a receipt in the wrong state is 409, and an inventory write
//! failure mid-commit is 502 because the receipt was left untouched and
//! the client should retry the whole call.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{CommitError, ExtractionError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Operation not legal in the receipt's current state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Commit called with no items selected (400)
    #[error("Selection is empty")]
    EmptySelection,

    /// Commit named an item outside the receipt (400)
    #[error("Line item {0} does not belong to this receipt")]
    UnknownLineItem(i64),

    /// The inventory store rejected a write; the commit rolled back (502)
    #[error("Commit failed and was rolled back: {0}")]
    CommitFailed(String),

    /// The extraction service could not be reached or rejected the call (502)
    #[error("Extraction service error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// larder-common error
    #[error("Common error: {0}")]
    Common(#[from] larder_common::Error),
}

impl From<CommitError> for ApiError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::ReceiptNotFound(id) => {
                ApiError::NotFound(format!("Receipt not found: {}", id))
            }
            CommitError::NotCompleted(status) => ApiError::Conflict(format!(
                "Receipt is {}, only completed receipts can be committed",
                status
            )),
            CommitError::EmptySelection => ApiError::EmptySelection,
            CommitError::UnknownLineItem(id) => ApiError::UnknownLineItem(id),
            CommitError::PartialCommitFailure(msg) => ApiError::CommitFailed(msg),
            CommitError::Database(e) => ApiError::Internal(e.to_string()),
            CommitError::Common(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::EmptySelection => (
                StatusCode::BAD_REQUEST,
                "EMPTY_SELECTION",
                "Selection is empty".to_string(),
            ),
            ApiError::UnknownLineItem(id) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_LINE_ITEM",
                format!("Line item {} does not belong to this receipt", id),
            ),
            ApiError::CommitFailed(msg) => (StatusCode::BAD_GATEWAY, "COMMIT_FAILED", msg),
            ApiError::Extraction(ref err) => (
                StatusCode::BAD_GATEWAY,
                "EXTRACTION_UNAVAILABLE",
                err.to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(larder_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(larder_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
