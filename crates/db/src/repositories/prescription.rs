use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::medicine::MedicineId;
use remedi_core::domain::prescription::{Prescription, PrescriptionId};
use remedi_core::domain::user::UserId;

use super::{parse_timestamp, PrescriptionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPrescriptionRepository {
    pool: DbPool,
}

impl SqlPrescriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PrescriptionRepository for SqlPrescriptionRepository {
    async fn find_valid(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
        now: DateTime<Utc>,
    ) -> Result<Option<Prescription>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, medicine_id, prescribed_by, valid_till, created_at
             FROM prescription
             WHERE user_id = ? AND medicine_id = ? AND valid_till > ?
             ORDER BY valid_till DESC
             LIMIT 1",
        )
        .bind(&user_id.0)
        .bind(&medicine_id.0)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        row.map(prescription_from_row).transpose()
    }

    async fn list_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, medicine_id, prescribed_by, valid_till, created_at
             FROM prescription
             WHERE user_id = ? AND valid_till > ?
             ORDER BY valid_till DESC",
        )
        .bind(&user_id.0)
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(prescription_from_row).collect()
    }

    async fn save(&self, prescription: Prescription) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO prescription (id, user_id, medicine_id, prescribed_by, valid_till, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                medicine_id = excluded.medicine_id,
                prescribed_by = excluded.prescribed_by,
                valid_till = excluded.valid_till",
        )
        .bind(&prescription.id.0)
        .bind(&prescription.user_id.0)
        .bind(&prescription.medicine_id.0)
        .bind(&prescription.prescribed_by)
        .bind(prescription.valid_till.to_rfc3339())
        .bind(prescription.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn prescription_from_row(row: SqliteRow) -> Result<Prescription, RepositoryError> {
    Ok(Prescription {
        id: PrescriptionId(row.get::<String, _>("id")),
        user_id: UserId(row.get::<String, _>("user_id")),
        medicine_id: MedicineId(row.get::<String, _>("medicine_id")),
        prescribed_by: row.get::<String, _>("prescribed_by"),
        valid_till: parse_timestamp(&row.get::<String, _>("valid_till"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
