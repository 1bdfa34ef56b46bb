//! Receipt database operations
//!
//! All status mutations are guarded in SQL: a write only lands when the row
//! is still in a state the transition is legal from, so concurrent pollers
//! and stale observations cannot move a receipt backwards.

use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use larder_common::{Error, Result};

use crate::models::{NewLineItem, Receipt, ReceiptStatus};

/// Fields written when a receipt reaches COMPLETED
#[derive(Debug, Clone, Default)]
pub struct CompletionRecord {
    pub merchant_name: Option<String>,
    pub purchase_date: Option<String>,
    pub total_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub is_duplicate: bool,
    pub duplicate_of_id: Option<Uuid>,
}

/// Insert a freshly submitted receipt
pub async fn insert_receipt(pool: &SqlitePool, receipt: &Receipt) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO receipts (
            id, owner_id, extraction_job_id, status,
            merchant_name, purchase_date, total_amount, tax_amount,
            image_path, processing_error, is_duplicate, duplicate_of_id,
            committed, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(receipt.id.to_string())
    .bind(&receipt.owner_id)
    .bind(&receipt.extraction_job_id)
    .bind(receipt.status.as_str())
    .bind(&receipt.merchant_name)
    .bind(&receipt.purchase_date)
    .bind(receipt.total_amount)
    .bind(receipt.tax_amount)
    .bind(&receipt.image_path)
    .bind(&receipt.processing_error)
    .bind(receipt.is_duplicate as i64)
    .bind(receipt.duplicate_of_id.map(|id| id.to_string()))
    .bind(receipt.committed as i64)
    .bind(receipt.created_at.to_rfc3339())
    .bind(receipt.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one receipt by id
pub async fn get_receipt(pool: &SqlitePool, id: Uuid) -> Result<Option<Receipt>> {
    let row = sqlx::query("SELECT * FROM receipts WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| receipt_from_row(&r)).transpose()
}

/// List receipts, newest first, optionally filtered by owner
pub async fn list_receipts(
    pool: &SqlitePool,
    owner_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Receipt>> {
    let rows = match owner_id {
        Some(owner) => {
            sqlx::query(
                r#"
                SELECT * FROM receipts
                WHERE owner_id = ?
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT * FROM receipts
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(receipt_from_row).collect()
}

/// Load every receipt not yet in a terminal state
///
/// Used on startup to resume polling for jobs whose watcher died with the
/// previous process.
pub async fn list_unfinished(pool: &SqlitePool) -> Result<Vec<Receipt>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM receipts
        WHERE status IN ('pending', 'processing')
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(receipt_from_row).collect()
}

/// Resolve the local receipt for an extraction-service job handle
pub async fn find_by_extraction_job(
    pool: &SqlitePool,
    extraction_job_id: &str,
) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM receipts WHERE extraction_job_id = ? LIMIT 1",
    )
    .bind(extraction_job_id)
    .fetch_optional(pool)
    .await?;

    id.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| Error::Internal(format!("Invalid receipt id: {}", e)))
    })
    .transpose()
}

/// Advance a receipt from PENDING to PROCESSING
///
/// Returns false when the receipt was not in PENDING; the caller treats
/// that as "already advanced" and moves on.
pub async fn mark_processing(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE receipts
        SET status = 'processing', updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record terminal completion: status, metadata, and line items in one
/// transaction
///
/// Returns false without writing anything when the receipt is already
/// terminal (a stale observation arriving after completion or failure).
pub async fn record_completion(
    pool: &SqlitePool,
    id: Uuid,
    items: &[NewLineItem],
    completion: &CompletionRecord,
) -> Result<bool> {
    let mut tx: sqlx::Transaction<'_, Sqlite> = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE receipts
        SET status = 'completed',
            merchant_name = ?,
            purchase_date = ?,
            total_amount = ?,
            tax_amount = ?,
            is_duplicate = ?,
            duplicate_of_id = ?,
            updated_at = ?
        WHERE id = ? AND status IN ('pending', 'processing')
        "#,
    )
    .bind(&completion.merchant_name)
    .bind(&completion.purchase_date)
    .bind(completion.total_amount)
    .bind(completion.tax_amount)
    .bind(completion.is_duplicate as i64)
    .bind(completion.duplicate_of_id.map(|d| d.to_string()))
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    crate::db::line_items::insert_line_items(&mut tx, id, items).await?;

    tx.commit().await?;
    Ok(true)
}

/// Record terminal failure with its description
///
/// Guarded the same way as [`record_completion`].
pub async fn record_failure(pool: &SqlitePool, id: Uuid, error: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE receipts
        SET status = 'failed', processing_error = ?, updated_at = ?
        WHERE id = ? AND status IN ('pending', 'processing')
        "#,
    )
    .bind(error)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a receipt; line items cascade
pub async fn delete_receipt(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM receipts WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn receipt_from_row(row: &SqliteRow) -> Result<Receipt> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid receipt id: {}", e)))?;

    let status: String = row.get("status");
    let status: ReceiptStatus = status
        .parse()
        .map_err(|e| Error::Internal(format!("Corrupt status column: {}", e)))?;

    let duplicate_of_id: Option<String> = row.get("duplicate_of_id");
    let duplicate_of_id = duplicate_of_id
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Invalid duplicate_of_id: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(Receipt {
        id,
        owner_id: row.get("owner_id"),
        extraction_job_id: row.get("extraction_job_id"),
        status,
        merchant_name: row.get("merchant_name"),
        purchase_date: row.get("purchase_date"),
        total_amount: row.get("total_amount"),
        tax_amount: row.get("tax_amount"),
        image_path: row.get("image_path"),
        processing_error: row.get("processing_error"),
        is_duplicate: row.get::<i64, _>("is_duplicate") != 0,
        duplicate_of_id,
        committed: row.get::<i64, _>("committed") != 0,
        created_at,
        updated_at,
    })
}
