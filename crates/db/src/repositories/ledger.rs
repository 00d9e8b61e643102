use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::ledger::{InventoryLedgerEntry, LedgerReason};
use remedi_core::domain::medicine::MedicineId;

use super::{parse_timestamp, LedgerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLedgerRepository {
    pool: DbPool,
}

impl SqlLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerRepository for SqlLedgerRepository {
    async fn append(&self, entry: InventoryLedgerEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO inventory_ledger (id, medicine_id, change, reason, recorded_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.medicine_id.0)
        .bind(entry.change)
        .bind(entry.reason.as_str())
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_medicine(
        &self,
        medicine_id: &MedicineId,
    ) -> Result<Vec<InventoryLedgerEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, medicine_id, change, reason, recorded_at
             FROM inventory_ledger
             WHERE medicine_id = ?
             ORDER BY recorded_at ASC",
        )
        .bind(&medicine_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: SqliteRow) -> Result<InventoryLedgerEntry, RepositoryError> {
    let reason_raw = row.get::<String, _>("reason");
    let reason = LedgerReason::parse(&reason_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown ledger reason `{reason_raw}`")))?;

    Ok(InventoryLedgerEntry {
        id: row.get::<String, _>("id"),
        medicine_id: MedicineId(row.get::<String, _>("medicine_id")),
        change: row.get::<i64, _>("change"),
        reason,
        recorded_at: parse_timestamp(&row.get::<String, _>("recorded_at"))?,
    })
}
