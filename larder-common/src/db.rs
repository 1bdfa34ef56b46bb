//! Database initialization
//!
//! Creates the sqlite database on first run and brings the schema up on
//! every start. All statements are `CREATE TABLE IF NOT EXISTS`, safe to
//! re-run against an existing database.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Apply PRAGMAs and create all tables on an existing pool
///
/// Split out from [`init_database`] so tests can run it against an
/// in-memory connection.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // WAL allows concurrent readers with one writer; poll tasks write
    // while the API layer reads
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;

    create_receipts_table(pool).await?;
    create_receipt_line_items_table(pool).await?;
    create_inventory_items_table(pool).await?;

    Ok(())
}

/// Create the receipts table
///
/// One row per submitted document. `status` holds the extraction state
/// machine ('pending', 'processing', 'completed', 'failed'); `committed`
/// is the at-most-once reconciliation flag.
pub async fn create_receipts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            extraction_job_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            merchant_name TEXT,
            purchase_date TEXT,
            total_amount REAL,
            tax_amount REAL,
            image_path TEXT,
            processing_error TEXT,
            is_duplicate INTEGER NOT NULL DEFAULT 0,
            duplicate_of_id TEXT,
            committed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_receipts_status ON receipts(status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the receipt_line_items table
///
/// Extracted candidate items, written once when a receipt completes.
/// `selected` carries the user's commit selection.
pub async fn create_receipt_line_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipt_line_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            receipt_id TEXT NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            quantity REAL NOT NULL CHECK (quantity >= 0),
            unit_price REAL,
            total_price REAL,
            matched_product_code TEXT,
            selected INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_line_items_receipt ON receipt_line_items(receipt_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the inventory_items table
///
/// The downstream store that committed line items merge into. The
/// non-empty name constraint rejects malformed items at the database,
/// which is what the all-or-nothing commit policy leans on.
pub async fn create_inventory_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL CHECK (length(name) > 0),
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,
            price REAL,
            purchase_date TEXT,
            store TEXT,
            receipt_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
