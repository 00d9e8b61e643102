use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::medicine::{Medicine, MedicineId};
use crate::domain::prescription::Prescription;
use crate::domain::user::UserId;

/// One requested line, as extracted from the utterance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    NotFound { name: String },
    LowStock { name: String, requested: u32, available: i64 },
    PrescriptionMissing { name: String },
}

impl RejectReason {
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound { name } => format!("`{name}` is not in our catalog"),
            Self::LowStock { name, requested, available } => {
                format!("only {available} units of `{name}` in stock, {requested} requested")
            }
            Self::PrescriptionMissing { name } => {
                format!("`{name}` needs a valid prescription on file")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Approved,
    Rejected(RejectReason),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerdict {
    pub name: String,
    pub status: ItemStatus,
    pub resolved_medicine_id: Option<MedicineId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub approved: bool,
    pub reasons: Vec<String>,
    pub per_item: Vec<ItemVerdict>,
}

/// Read-only check of stock and prescription records for a candidate item
/// list. Pure over the supplied snapshots; callers may repeat it freely.
#[derive(Clone, Debug, Default)]
pub struct SafetyValidator;

impl SafetyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        user_id: &UserId,
        items: &[RequestedItem],
        catalog: &[Medicine],
        prescriptions: &[Prescription],
        now: DateTime<Utc>,
    ) -> SafetyVerdict {
        let mut per_item = Vec::with_capacity(items.len());
        let mut reasons = Vec::new();

        for item in items {
            let verdict = self.validate_item(user_id, item, catalog, prescriptions, now);
            if let ItemStatus::Rejected(reject) = &verdict.status {
                reasons.push(reject.reason());
            }
            per_item.push(verdict);
        }

        let approved = !per_item.is_empty()
            && per_item.iter().all(|verdict| verdict.status == ItemStatus::Approved);

        SafetyVerdict { approved, reasons, per_item }
    }

    fn validate_item(
        &self,
        user_id: &UserId,
        item: &RequestedItem,
        catalog: &[Medicine],
        prescriptions: &[Prescription],
        now: DateTime<Utc>,
    ) -> ItemVerdict {
        let Some(medicine) = catalog.iter().find(|medicine| medicine.matches_name(&item.name))
        else {
            return ItemVerdict {
                name: item.name.clone(),
                status: ItemStatus::Rejected(RejectReason::NotFound { name: item.name.clone() }),
                resolved_medicine_id: None,
            };
        };

        if i64::from(item.quantity) > medicine.stock {
            return ItemVerdict {
                name: item.name.clone(),
                status: ItemStatus::Rejected(RejectReason::LowStock {
                    name: medicine.name.clone(),
                    requested: item.quantity,
                    available: medicine.stock,
                }),
                resolved_medicine_id: Some(medicine.id.clone()),
            };
        }

        if medicine.requires_prescription {
            let on_file = prescriptions.iter().any(|prescription| {
                prescription.user_id == *user_id
                    && prescription.medicine_id == medicine.id
                    && prescription.is_valid_at(now)
            });
            if !on_file {
                return ItemVerdict {
                    name: item.name.clone(),
                    status: ItemStatus::Rejected(RejectReason::PrescriptionMissing {
                        name: medicine.name.clone(),
                    }),
                    resolved_medicine_id: Some(medicine.id.clone()),
                };
            }
        }

        ItemVerdict {
            name: item.name.clone(),
            status: ItemStatus::Approved,
            resolved_medicine_id: Some(medicine.id.clone()),
        }
    }
}
