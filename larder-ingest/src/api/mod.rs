//! HTTP API handlers for larder-ingest

pub mod commit;
pub mod events;
pub mod health;
pub mod receipts;
pub mod selection;
pub mod submission;

pub use commit::commit_routes;
pub use events::event_stream;
pub use health::health_routes;
pub use receipts::receipt_routes;
pub use selection::selection_routes;
pub use submission::submission_routes;
