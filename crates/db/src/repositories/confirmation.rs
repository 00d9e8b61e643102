use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use remedi_core::domain::confirmation::{ConfirmationStatus, PendingConfirmation, ProposedItem};
use remedi_core::domain::user::UserId;

use super::{parse_decimal, parse_timestamp, ConfirmationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConfirmationRepository {
    pool: DbPool,
}

impl SqlConfirmationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConfirmationRepository for SqlConfirmationRepository {
    async fn propose(&self, confirmation: PendingConfirmation) -> Result<(), RepositoryError> {
        let items_json = serde_json::to_string(&confirmation.items)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        // Supersede-then-insert in one transaction; the partial unique index
        // on (user_id) WHERE status='WAITING' backs the invariant.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE pending_confirmation SET status = 'CANCELLED'
             WHERE user_id = ? AND status = 'WAITING'",
        )
        .bind(&confirmation.user_id.0)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO pending_confirmation
                (id, user_id, items_json, total, status, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&confirmation.user_id.0)
        .bind(items_json)
        .bind(confirmation.total.to_string())
        .bind(confirmation.status.as_str())
        .bind(confirmation.created_at.to_rfc3339())
        .bind(confirmation.expires_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, items_json, total, status, created_at, expires_at
             FROM pending_confirmation
             WHERE user_id = ? AND status = 'WAITING' AND expires_at > ?",
        )
        .bind(&user_id.0)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        row.map(confirmation_from_row).transpose()
    }

    async fn confirm_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, user_id, items_json, total, status, created_at, expires_at
             FROM pending_confirmation
             WHERE user_id = ? AND status = 'WAITING' AND expires_at > ?",
        )
        .bind(&user_id.0)
        .bind(now.to_rfc3339())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let row_id = row.get::<String, _>("id");
        let mut confirmation = confirmation_from_row(row)?;

        let updated = sqlx::query(
            "UPDATE pending_confirmation SET status = 'CONFIRMED'
             WHERE id = ? AND status = 'WAITING'",
        )
        .bind(&row_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if updated.rows_affected() == 0 {
            // Lost a race with another confirm; treat as absent.
            return Ok(None);
        }

        confirmation.status = ConfirmationStatus::Confirmed;
        Ok(Some(confirmation))
    }

    async fn cancel_waiting(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE pending_confirmation SET status = 'CANCELLED'
             WHERE user_id = ? AND status = 'WAITING'",
        )
        .bind(&user_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn confirmation_from_row(row: SqliteRow) -> Result<PendingConfirmation, RepositoryError> {
    let items_json = row.get::<String, _>("items_json");
    let items: Vec<ProposedItem> = serde_json::from_str(&items_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid items payload: {error}")))?;

    let status_raw = row.get::<String, _>("status");
    let status = ConfirmationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown confirmation status `{status_raw}`"))
    })?;

    Ok(PendingConfirmation {
        user_id: UserId(row.get::<String, _>("user_id")),
        items,
        total: parse_decimal(&row.get::<String, _>("total"))?,
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        expires_at: parse_timestamp(&row.get::<String, _>("expires_at"))?,
    })
}
