use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::medicine::MedicineId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrescriptionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub user_id: UserId,
    pub medicine_id: MedicineId,
    pub prescribed_by: String,
    pub valid_till: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_till > now
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{Prescription, PrescriptionId};
    use crate::domain::medicine::MedicineId;
    use crate::domain::user::UserId;

    #[test]
    fn validity_is_strict_future_comparison() {
        let now = Utc::now();
        let prescription = Prescription {
            id: PrescriptionId("rx-1".to_string()),
            user_id: UserId("u-1".to_string()),
            medicine_id: MedicineId("med-amoxicillin".to_string()),
            prescribed_by: "Dr. Rao".to_string(),
            valid_till: now,
            created_at: now - Duration::days(7),
        };

        assert!(!prescription.is_valid_at(now));

        let mut future = prescription.clone();
        future.valid_till = now + Duration::days(1);
        assert!(future.is_valid_at(now));
    }
}
