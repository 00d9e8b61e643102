use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::medicine::MedicineId;
use remedi_core::domain::refill::RefillAlert;
use remedi_core::domain::user::UserId;

use super::{parse_timestamp, RefillAlertRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRefillAlertRepository {
    pool: DbPool,
}

impl SqlRefillAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RefillAlertRepository for SqlRefillAlertRepository {
    async fn find(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
    ) -> Result<Option<RefillAlert>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, medicine_id, days_left, notified, updated_at
             FROM refill_alert
             WHERE user_id = ? AND medicine_id = ?",
        )
        .bind(&user_id.0)
        .bind(&medicine_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(alert_from_row).transpose()
    }

    async fn upsert(&self, alert: RefillAlert) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO refill_alert (user_id, medicine_id, days_left, notified, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id, medicine_id) DO UPDATE SET
                days_left = excluded.days_left,
                notified = excluded.notified,
                updated_at = excluded.updated_at",
        )
        .bind(&alert.user_id.0)
        .bind(&alert.medicine_id.0)
        .bind(alert.days_left)
        .bind(alert.notified)
        .bind(alert.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn alert_from_row(row: SqliteRow) -> Result<RefillAlert, RepositoryError> {
    Ok(RefillAlert {
        user_id: UserId(row.get::<String, _>("user_id")),
        medicine_id: MedicineId(row.get::<String, _>("medicine_id")),
        days_left: row.get::<i64, _>("days_left"),
        notified: row.get::<bool, _>("notified"),
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
