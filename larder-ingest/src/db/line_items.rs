//! Line item database operations

use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use larder_common::Result;

use crate::models::{LineItem, NewLineItem};

/// Insert extracted line items inside the completion transaction
pub async fn insert_line_items(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    receipt_id: Uuid,
    items: &[NewLineItem],
) -> Result<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO receipt_line_items (
                receipt_id, description, quantity,
                unit_price, total_price, matched_product_code, selected
            ) VALUES (?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(receipt_id.to_string())
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(&item.matched_product_code)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// List a receipt's line items in extraction order
pub async fn list_for_receipt(pool: &SqlitePool, receipt_id: Uuid) -> Result<Vec<LineItem>> {
    let rows = sqlx::query(
        "SELECT * FROM receipt_line_items WHERE receipt_id = ? ORDER BY id ASC",
    )
    .bind(receipt_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(line_item_from_row).collect()
}

/// Same as [`list_for_receipt`], for use inside an open transaction
pub async fn list_for_receipt_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    receipt_id: Uuid,
) -> Result<Vec<LineItem>> {
    let rows = sqlx::query(
        "SELECT * FROM receipt_line_items WHERE receipt_id = ? ORDER BY id ASC",
    )
    .bind(receipt_id.to_string())
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(line_item_from_row).collect()
}

/// Flip one item's selection flag
///
/// Returns false when no such item belongs to the receipt.
pub async fn toggle_selected(
    pool: &SqlitePool,
    receipt_id: Uuid,
    item_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE receipt_line_items SET selected = 1 - selected WHERE id = ? AND receipt_id = ?",
    )
    .bind(item_id)
    .bind(receipt_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Set every item's selection flag for a receipt
///
/// Returns the number of items touched.
pub async fn set_all_selected(
    pool: &SqlitePool,
    receipt_id: Uuid,
    selected: bool,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE receipt_line_items SET selected = ? WHERE receipt_id = ?",
    )
    .bind(selected as i64)
    .bind(receipt_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn line_item_from_row(row: &SqliteRow) -> Result<LineItem> {
    let receipt_id: String = row.get("receipt_id");
    let receipt_id = Uuid::parse_str(&receipt_id)
        .map_err(|e| larder_common::Error::Internal(format!("Invalid receipt id: {}", e)))?;

    Ok(LineItem {
        id: row.get("id"),
        receipt_id,
        description: row.get("description"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        total_price: row.get("total_price"),
        matched_product_code: row.get("matched_product_code"),
        selected: row.get::<i64, _>("selected") != 0,
    })
}
