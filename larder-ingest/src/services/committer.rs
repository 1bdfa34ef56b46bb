//! Reconciliation committer
//!
//! Merges a selected subset of a completed receipt's line items into the
//! inventory store, at most once per receipt. The whole operation is one
//! sqlite transaction whose first statement is the committed check-and-set,
//! so concurrent attempts serialize on the write lock and exactly one can
//! win. Everything after the check-and-set either lands with the commit or
//! rolls back with it.

use sqlx::{Row, Sqlite, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use larder_common::events::{EventBus, LarderEvent};

use crate::db;
use crate::models::{CommitOutcome, ReceiptStatus};

/// Inventory unit recorded for merged line items
const INVENTORY_UNIT: &str = "item";

/// Commit failures
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(Uuid),

    #[error("Receipt is {0}, only completed receipts can be committed")]
    NotCompleted(ReceiptStatus),

    #[error("Selection is empty")]
    EmptySelection,

    #[error("Line item {0} does not belong to this receipt")]
    UnknownLineItem(i64),

    /// The inventory store rejected a write mid-commit. The transaction
    /// rolled back: no entities exist and `committed` stayed false, so the
    /// caller may retry the whole commit.
    #[error("Inventory write failed, nothing was merged: {0}")]
    PartialCommitFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] larder_common::Error),
}

/// Commit `item_ids` of `receipt_id` into inventory
///
/// Returns `already_committed = true` with a zero count when a prior
/// commit won; that is a successful no-op, not an error.
pub async fn commit_receipt(
    pool: &SqlitePool,
    event_bus: &EventBus,
    receipt_id: Uuid,
    item_ids: &[i64],
) -> Result<CommitOutcome, CommitError> {
    // Input errors resolve locally, before any receipt mutation
    if item_ids.is_empty() {
        return Err(CommitError::EmptySelection);
    }

    let mut tx: sqlx::Transaction<'_, Sqlite> = pool.begin().await?;

    // Check-and-set up front: this takes the write lock, so a concurrent
    // commit for the same receipt blocks here and then sees committed = 1
    let result = sqlx::query(
        r#"
        UPDATE receipts
        SET committed = 1, updated_at = ?
        WHERE id = ? AND committed = 0 AND status = 'completed'
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(receipt_id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        let row = sqlx::query("SELECT status, committed FROM receipts WHERE id = ?")
            .bind(receipt_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        tx.rollback().await?;

        return match row {
            None => Err(CommitError::ReceiptNotFound(receipt_id)),
            Some(row) if row.get::<i64, _>("committed") != 0 => {
                tracing::info!(receipt_id = %receipt_id, "Commit repeated, already merged");
                Ok(CommitOutcome {
                    merged_count: 0,
                    already_committed: true,
                })
            }
            Some(row) => {
                let status: String = row.get("status");
                let status: ReceiptStatus = status.parse().map_err(|e: String| {
                    CommitError::Common(larder_common::Error::Internal(e))
                })?;
                Err(CommitError::NotCompleted(status))
            }
        };
    }

    // Validate the selection against this exact receipt's items. A bad id
    // rolls the check-and-set back, leaving committed = 0.
    let items = db::line_items::list_for_receipt_tx(&mut tx, receipt_id).await?;
    for requested in item_ids {
        if !items.iter().any(|item| item.id == *requested) {
            tx.rollback().await?;
            return Err(CommitError::UnknownLineItem(*requested));
        }
    }

    let meta = sqlx::query("SELECT merchant_name, purchase_date FROM receipts WHERE id = ?")
        .bind(receipt_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
    let merchant_name: Option<String> = meta.get("merchant_name");
    let purchase_date: Option<String> = meta.get("purchase_date");

    // All-or-nothing: the first rejected entity aborts the transaction,
    // undoing the check-and-set and every insert before it
    let mut merged_count = 0;
    for item in items.iter().filter(|item| item_ids.contains(&item.id)) {
        let entity = db::inventory::NewInventoryEntity {
            name: item.description.clone(),
            quantity: item.quantity,
            unit: INVENTORY_UNIT.to_string(),
            price: item.total_price,
            purchase_date: purchase_date.clone(),
            store: merchant_name.clone(),
            receipt_id: Some(receipt_id),
        };

        if let Err(e) = db::inventory::create_inventory_entity(&mut tx, &entity).await {
            tracing::error!(
                receipt_id = %receipt_id,
                line_item_id = item.id,
                error = %e,
                "Inventory write failed, rolling back commit"
            );
            return Err(CommitError::PartialCommitFailure(e.to_string()));
        }
        merged_count += 1;
    }

    tx.commit().await?;

    tracing::info!(
        receipt_id = %receipt_id,
        merged_count = merged_count,
        "Selected line items merged into inventory"
    );
    event_bus.emit_lossy(LarderEvent::ItemsCommitted {
        receipt_id,
        merged_count,
        timestamp: chrono::Utc::now(),
    });

    Ok(CommitOutcome {
        merged_count,
        already_committed: false,
    })
}
