use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::medicine::MedicineId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Confirmed,
    Rejected,
    InWarehouse,
    Shipped,
    Fulfilled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::InWarehouse => "IN_WAREHOUSE",
            Self::Shipped => "SHIPPED",
            Self::Fulfilled => "FULFILLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CONFIRMED" => Some(Self::Confirmed),
            "REJECTED" => Some(Self::Rejected),
            "IN_WAREHOUSE" => Some(Self::InWarehouse),
            "SHIPPED" => Some(Self::Shipped),
            "FULFILLED" => Some(Self::Fulfilled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub quantity: u32,
    pub dosage_per_day: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub estimated_end_date: DateTime<Utc>,
    /// Set exactly once by the finalize step. A non-empty value blocks any
    /// repeated finalize from re-applying inventory effects.
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Confirmed, OrderStatus::InWarehouse)
                | (OrderStatus::Confirmed, OrderStatus::Rejected)
                | (OrderStatus::InWarehouse, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Fulfilled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }
}
