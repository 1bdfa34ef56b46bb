//! Receipt ingestion state machine
//!
//! A receipt progresses through PENDING → PROCESSING → {COMPLETED | FAILED}.
//! Terminal states are frozen: no transition leaves COMPLETED or FAILED, and
//! line items never change once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Extraction status of a submitted receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Accepted and dispatched, no progress observed yet
    Pending,
    /// External extraction reported work in progress
    Processing,
    /// Extraction finished, line items available
    Completed,
    /// Extraction reported a terminal failure
    Failed,
}

impl ReceiptStatus {
    /// Database/text form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Completed => "completed",
            ReceiptStatus::Failed => "failed",
        }
    }

    /// Check if status is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiptStatus::Completed | ReceiptStatus::Failed)
    }

    /// Whether advancing to `next` is a legal transition
    ///
    /// A receipt may complete or fail straight from PENDING: the remote
    /// job can pass through its processing phase between two of our
    /// observations. Regressions and transitions out of a terminal state
    /// are never legal.
    pub fn can_transition_to(&self, next: ReceiptStatus) -> bool {
        match (self, next) {
            (ReceiptStatus::Pending, ReceiptStatus::Processing)
            | (ReceiptStatus::Pending, ReceiptStatus::Completed)
            | (ReceiptStatus::Pending, ReceiptStatus::Failed)
            | (ReceiptStatus::Processing, ReceiptStatus::Completed)
            | (ReceiptStatus::Processing, ReceiptStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReceiptStatus::Pending),
            "processing" => Ok(ReceiptStatus::Processing),
            "completed" => Ok(ReceiptStatus::Completed),
            "failed" => Ok(ReceiptStatus::Failed),
            other => Err(format!("unknown receipt status: {}", other)),
        }
    }
}

/// A submitted receipt and its extraction outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique receipt identifier
    pub id: Uuid,

    /// Opaque owner reference from the submission request, if any
    pub owner_id: Option<String>,

    /// The extraction service's handle for the dispatched job
    pub extraction_job_id: String,

    /// Current workflow state
    pub status: ReceiptStatus,

    /// Merchant name reported at completion
    pub merchant_name: Option<String>,

    /// Purchase date reported at completion (as printed on the receipt)
    pub purchase_date: Option<String>,

    /// Receipt total reported at completion
    pub total_amount: Option<f64>,

    /// Tax amount reported at completion
    pub tax_amount: Option<f64>,

    /// Where the submitted image is stored on disk
    pub image_path: Option<String>,

    /// Failure description, populated only when status is FAILED
    pub processing_error: Option<String>,

    /// Advisory flag: this receipt likely matches a prior one
    pub is_duplicate: bool,

    /// The prior receipt this one duplicates, when resolvable
    pub duplicate_of_id: Option<Uuid>,

    /// At-most-once reconciliation flag, set only by commit
    pub committed: bool,

    /// When the receipt was submitted
    pub created_at: DateTime<Utc>,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

/// One extracted candidate line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Row id, unique within the table (and therefore within the receipt)
    pub id: i64,

    /// Receipt this item was extracted from
    pub receipt_id: Uuid,

    /// Item text as read off the receipt
    pub description: String,

    /// Quantity, non-negative
    pub quantity: f64,

    /// Per-unit price if the extraction could split it out
    pub unit_price: Option<f64>,

    /// Line total
    pub total_price: Option<f64>,

    /// Product match hint from extraction, not authoritative
    pub matched_product_code: Option<String>,

    /// Whether the user has chosen this item for commit
    pub selected: bool,
}

/// Line item payload written when a receipt completes
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub matched_product_code: Option<String>,
}

/// Result of one bounded poll run
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Terminal success, line items recorded
    Completed {
        line_item_count: usize,
        is_duplicate: bool,
    },
    /// Terminal failure reported by the extraction service
    Failed { error: String },
    /// Attempt bound exhausted with no terminal status; receipt untouched
    TimedOut { attempts: u32 },
    /// Poll task cancelled; receipt untouched
    Cancelled,
}

/// Result of a commit call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommitOutcome {
    /// Inventory entities created by this call
    pub merged_count: usize,

    /// True when a prior commit already won; this call changed nothing
    pub already_committed: bool,
}
