use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock level at which the fulfillment partner is asked to restock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedicineId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,
    pub unit_price: Decimal,
    pub stock: i64,
    pub requires_prescription: bool,
    pub default_dosage_per_day: u32,
    /// Dedup flag for the low-stock webhook. Set on the first crossing below
    /// `LOW_STOCK_THRESHOLD`; cleared only by a manual restock back to or
    /// above the threshold.
    pub low_stock_notified: bool,
}

impl Medicine {
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(candidate.trim())
            || self.id.0.trim().eq_ignore_ascii_case(candidate.trim())
    }

    pub fn is_below_threshold(&self) -> bool {
        self.stock < LOW_STOCK_THRESHOLD
    }
}
