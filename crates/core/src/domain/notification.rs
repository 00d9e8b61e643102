use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "user_id", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderFinalized,
    RefillReminder,
    LowStock,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPlaced => "order_placed",
            Self::OrderFinalized => "order_finalized",
            Self::RefillReminder => "refill_reminder",
            Self::LowStock => "low_stock",
        }
    }
}

/// Write-once record fanned out to zero or more realtime channels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient: Recipient, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient,
            kind,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn to_user(
        user_id: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Recipient::User(user_id), kind, message)
    }

    pub fn to_admin(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self::new(Recipient::Admin, kind, message)
    }
}
