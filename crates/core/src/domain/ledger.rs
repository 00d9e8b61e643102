use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::medicine::MedicineId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerReason {
    OrderPlaced,
    OrderFulfilled,
    ManualUpdate,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPlaced => "ORDER_PLACED",
            Self::OrderFulfilled => "ORDER_FULFILLED",
            Self::ManualUpdate => "MANUAL_UPDATE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ORDER_PLACED" => Some(Self::OrderPlaced),
            "ORDER_FULFILLED" => Some(Self::OrderFulfilled),
            "MANUAL_UPDATE" => Some(Self::ManualUpdate),
            _ => None,
        }
    }
}

/// Append-only audit row, one per stock mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLedgerEntry {
    pub id: String,
    pub medicine_id: MedicineId,
    pub change: i64,
    pub reason: LedgerReason,
    pub recorded_at: DateTime<Utc>,
}

impl InventoryLedgerEntry {
    pub fn new(medicine_id: MedicineId, change: i64, reason: LedgerReason) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            medicine_id,
            change,
            reason,
            recorded_at: Utc::now(),
        }
    }
}
