use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::medicine::MedicineId;
use crate::domain::user::UserId;

/// How long a proposed order stays confirmable.
pub const CONFIRMATION_WINDOW_SECS: i64 = 600;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Waiting,
    Confirmed,
    Expired,
    Cancelled,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Confirmed => "CONFIRMED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WAITING" => Some(Self::Waiting),
            "CONFIRMED" => Some(Self::Confirmed),
            "EXPIRED" => Some(Self::Expired),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One line of a proposed order, priced at proposal time. The stored price is
/// what the user confirms, even if the catalog moves afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedItem {
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub quantity: u32,
    pub dosage_per_day: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub user_id: UserId,
    pub items: Vec<ProposedItem>,
    pub total: Decimal,
    pub status: ConfirmationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn propose(user_id: UserId, items: Vec<ProposedItem>, total: Decimal) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            items,
            total,
            status: ConfirmationStatus::Waiting,
            created_at: now,
            expires_at: now + Duration::seconds(CONFIRMATION_WINDOW_SECS),
        }
    }

    /// Expiry is a pure function of the clock. An expired row that no sweeper
    /// has removed yet must behave exactly like an absent one.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_confirmable(&self, now: DateTime<Utc>) -> bool {
        self.status == ConfirmationStatus::Waiting && !self.is_expired(now)
    }
}
