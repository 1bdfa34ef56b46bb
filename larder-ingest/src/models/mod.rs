//! Data models for larder-ingest (receipt ingestion service)

pub mod receipt;

pub use receipt::{
    CommitOutcome, LineItem, NewLineItem, PollOutcome, Receipt, ReceiptStatus,
};
