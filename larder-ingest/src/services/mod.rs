//! Service modules for the receipt ingestion workflow

pub mod committer;
pub mod extraction;
pub mod extraction_client;
pub mod poller;

pub use committer::{commit_receipt, CommitError};
pub use extraction::{
    ExtractionError, ExtractionService, ExtractionStatus, RemoteLineItem, RemoteStatus,
};
pub use extraction_client::HttpExtractionClient;
pub use poller::{PollPolicy, StatusPoller};
