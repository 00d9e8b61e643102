use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::medicine::{Medicine, MedicineId, LOW_STOCK_THRESHOLD};

use super::{parse_decimal, MedicineRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMedicineRepository {
    pool: DbPool,
}

impl SqlMedicineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT
    id,
    name,
    unit_price,
    stock,
    requires_prescription,
    default_dosage_per_day,
    low_stock_notified
 FROM medicine";

#[async_trait::async_trait]
impl MedicineRepository for SqlMedicineRepository {
    async fn find_by_id(&self, id: &MedicineId) -> Result<Option<Medicine>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(medicine_from_row).transpose()
    }

    async fn find_by_name_or_id(&self, needle: &str) -> Result<Option<Medicine>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE name = ? COLLATE NOCASE OR id = ? COLLATE NOCASE"
        ))
        .bind(needle.trim())
        .bind(needle.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(medicine_from_row).transpose()
    }

    async fn list_in_stock(&self) -> Result<Vec<Medicine>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE stock > 0 ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(medicine_from_row).collect()
    }

    async fn save(&self, medicine: Medicine) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO medicine (
                id,
                name,
                unit_price,
                stock,
                requires_prescription,
                default_dosage_per_day,
                low_stock_notified
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                unit_price = excluded.unit_price,
                stock = excluded.stock,
                requires_prescription = excluded.requires_prescription,
                default_dosage_per_day = excluded.default_dosage_per_day,
                low_stock_notified = excluded.low_stock_notified",
        )
        .bind(&medicine.id.0)
        .bind(&medicine.name)
        .bind(medicine.unit_price.to_string())
        .bind(medicine.stock)
        .bind(medicine.requires_prescription)
        .bind(i64::from(medicine.default_dosage_per_day))
        .bind(medicine.low_stock_notified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &MedicineId,
        quantity: u32,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query("UPDATE medicine SET stock = stock - ? WHERE id = ?")
            .bind(i64::from(quantity))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("medicine `{}`", id.0)));
        }

        let stock = sqlx::query_scalar::<_, i64>("SELECT stock FROM medicine WHERE id = ?")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(stock)
    }

    async fn restock(&self, id: &MedicineId, quantity: u32) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE medicine SET
                stock = stock + ?,
                low_stock_notified = CASE
                    WHEN stock + ? >= ? THEN 0
                    ELSE low_stock_notified
                END
             WHERE id = ?",
        )
        .bind(i64::from(quantity))
        .bind(i64::from(quantity))
        .bind(LOW_STOCK_THRESHOLD)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("medicine `{}`", id.0)));
        }

        let stock = sqlx::query_scalar::<_, i64>("SELECT stock FROM medicine WHERE id = ?")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(stock)
    }

    async fn set_low_stock_notified(
        &self,
        id: &MedicineId,
        notified: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE medicine SET low_stock_notified = ? WHERE id = ?")
            .bind(notified)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn medicine_from_row(row: SqliteRow) -> Result<Medicine, RepositoryError> {
    Ok(Medicine {
        id: MedicineId(row.get::<String, _>("id")),
        name: row.get::<String, _>("name"),
        unit_price: parse_decimal(&row.get::<String, _>("unit_price"))?,
        stock: row.get::<i64, _>("stock"),
        requires_prescription: row.get::<bool, _>("requires_prescription"),
        default_dosage_per_day: row.get::<i64, _>("default_dosage_per_day") as u32,
        low_stock_notified: row.get::<bool, _>("low_stock_notified"),
    })
}
