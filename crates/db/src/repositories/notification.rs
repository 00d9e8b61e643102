use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::notification::{Notification, NotificationKind, Recipient};
use remedi_core::domain::user::UserId;

use super::{parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError> {
        let (role, target_user_id) = match &notification.recipient {
            Recipient::User(user_id) => ("USER", Some(user_id.0.clone())),
            Recipient::Admin => ("ADMIN", None),
        };

        sqlx::query(
            "INSERT INTO notification (id, recipient_role, target_user_id, kind, message, sent_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(role)
        .bind(target_user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.sent_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, recipient_role, target_user_id, kind, message, sent_at
             FROM notification
             ORDER BY sent_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(notification_from_row).collect()
    }
}

fn notification_from_row(row: SqliteRow) -> Result<Notification, RepositoryError> {
    let role = row.get::<String, _>("recipient_role");
    let recipient = match role.as_str() {
        "ADMIN" => Recipient::Admin,
        "USER" => {
            let target = row.get::<Option<String>, _>("target_user_id").ok_or_else(|| {
                RepositoryError::Decode("user notification without target_user_id".to_string())
            })?;
            Recipient::User(UserId(target))
        }
        other => {
            return Err(RepositoryError::Decode(format!("unknown recipient role `{other}`")));
        }
    };

    let kind_raw = row.get::<String, _>("kind");
    let kind = match kind_raw.as_str() {
        "order_placed" => NotificationKind::OrderPlaced,
        "order_finalized" => NotificationKind::OrderFinalized,
        "refill_reminder" => NotificationKind::RefillReminder,
        "low_stock" => NotificationKind::LowStock,
        other => {
            return Err(RepositoryError::Decode(format!("unknown notification kind `{other}`")));
        }
    };

    Ok(Notification {
        id: row.get::<String, _>("id"),
        recipient,
        kind,
        message: row.get::<String, _>("message"),
        sent_at: parse_timestamp(&row.get::<String, _>("sent_at"))?,
    })
}
