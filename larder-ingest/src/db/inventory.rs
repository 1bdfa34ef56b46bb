//! Inventory store operations
//!
//! The ingestion service only ever creates entities here, one per committed
//! line item, always inside the committer's transaction.

use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use larder_common::Result;

/// Payload for one inventory entity creation
#[derive(Debug, Clone)]
pub struct NewInventoryEntity {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub price: Option<f64>,
    pub purchase_date: Option<String>,
    pub store: Option<String>,
    pub receipt_id: Option<Uuid>,
}

/// Create one inventory entity, returning its id
///
/// Runs on the caller's transaction so a failed insert rolls the whole
/// commit back.
pub async fn create_inventory_entity(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    entity: &NewInventoryEntity,
) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO inventory_items (
            id, name, quantity, unit, price,
            purchase_date, store, receipt_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&entity.name)
    .bind(entity.quantity)
    .bind(&entity.unit)
    .bind(entity.price)
    .bind(&entity.purchase_date)
    .bind(&entity.store)
    .bind(entity.receipt_id.map(|r| r.to_string()))
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// Count entities created from one receipt
pub async fn count_for_receipt(pool: &SqlitePool, receipt_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE receipt_id = ?")
            .bind(receipt_id.to_string())
            .fetch_one(pool)
            .await?;

    Ok(count)
}
