//! # Larder Common Library
//!
//! Shared code for larder services including:
//! - Error types
//! - Event types (LarderEvent enum) and EventBus
//! - Database initialization and schema
//! - Configuration loading
//! - SSE utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
