use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::medicine::MedicineId;
use crate::domain::user::UserId;

/// Predicted days of supply at or below which a refill alert is raised.
pub const REFILL_ALERT_DAYS: i64 = 5;

/// One row per (user, medicine). `notified` is the dedup bit: true while an
/// alert has been sent and the user has not yet refilled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillAlert {
    pub user_id: UserId,
    pub medicine_id: MedicineId,
    pub days_left: i64,
    pub notified: bool,
    pub updated_at: DateTime<Utc>,
}

impl RefillAlert {
    pub fn needs_notification(&self) -> bool {
        self.days_left <= REFILL_ALERT_DAYS && !self.notified
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{RefillAlert, REFILL_ALERT_DAYS};
    use crate::domain::medicine::MedicineId;
    use crate::domain::user::UserId;

    fn alert(days_left: i64, notified: bool) -> RefillAlert {
        RefillAlert {
            user_id: UserId("u-1".to_string()),
            medicine_id: MedicineId("med-metformin".to_string()),
            days_left,
            notified,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn low_and_unnotified_needs_notification() {
        assert!(alert(REFILL_ALERT_DAYS, false).needs_notification());
        assert!(alert(1, false).needs_notification());
    }

    #[test]
    fn already_notified_or_high_supply_does_not() {
        assert!(!alert(3, true).needs_notification());
        assert!(!alert(REFILL_ALERT_DAYS + 1, false).needs_notification());
    }
}
