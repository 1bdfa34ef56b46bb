//! Database operations for larder-ingest
//!
//! Raw sqlx queries over the shared sqlite pool. UUIDs and timestamps are
//! stored as TEXT; status transition guards live in the SQL itself so a
//! stale writer can never regress a receipt.

pub mod inventory;
pub mod line_items;
pub mod receipts;
