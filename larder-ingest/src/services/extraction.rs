//! Extraction service boundary
//!
//! The OCR/extraction engine is an opaque external collaborator. This module
//! defines the trait the workflow talks through and the wire types the
//! service reports, so the production HTTP client and the scripted fakes in
//! tests are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extraction client errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Job status as reported by the extraction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One candidate line item on the wire
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteLineItem {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    /// Product match hint, not authoritative
    pub product_code: Option<String>,
}

fn default_quantity() -> f64 {
    1.0
}

/// Full status report for a dispatched job
///
/// `line_items`, the duplicate fields, and the merchant metadata carry data
/// only when `status` is `completed`; `error` only when `failed`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionStatus {
    pub status: RemoteStatus,
    #[serde(default)]
    pub line_items: Vec<RemoteLineItem>,
    #[serde(default)]
    pub is_duplicate: bool,
    /// The service's own job handle for the receipt this one duplicates
    pub duplicate_of: Option<String>,
    pub error: Option<String>,
    pub merchant_name: Option<String>,
    pub purchase_date: Option<String>,
    pub total_amount: Option<f64>,
    pub tax_amount: Option<f64>,
}

/// Response to a submission call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// The workflow's view of the external extraction service
///
/// Exactly two operations: dispatch an image, query a dispatched job.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Dispatch an image for extraction, returning the service's job handle
    async fn submit(
        &self,
        image: &[u8],
        media_type: &str,
    ) -> Result<String, ExtractionError>;

    /// Query the status of a dispatched job
    async fn fetch_status(&self, job_id: &str) -> Result<ExtractionStatus, ExtractionError>;
}
