use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use remedi_core::domain::confirmation::{ConfirmationStatus, PendingConfirmation};
use remedi_core::domain::ledger::InventoryLedgerEntry;
use remedi_core::domain::medicine::{Medicine, MedicineId, LOW_STOCK_THRESHOLD};
use remedi_core::domain::notification::Notification;
use remedi_core::domain::order::{Order, OrderId};
use remedi_core::domain::prescription::Prescription;
use remedi_core::domain::refill::RefillAlert;
use remedi_core::domain::user::{UserAccount, UserId};

use super::{
    ConfirmationRepository, LedgerRepository, MedicineRepository, NotificationRepository,
    OrderRepository, PrescriptionRepository, RefillAlertRepository, RepositoryError,
    UserRepository,
};

#[derive(Default)]
pub struct InMemoryMedicineRepository {
    medicines: RwLock<HashMap<String, Medicine>>,
}

impl InMemoryMedicineRepository {
    pub async fn with_catalog(catalog: Vec<Medicine>) -> Self {
        let repo = Self::default();
        {
            let mut medicines = repo.medicines.write().await;
            for medicine in catalog {
                medicines.insert(medicine.id.0.clone(), medicine);
            }
        }
        repo
    }
}

#[async_trait::async_trait]
impl MedicineRepository for InMemoryMedicineRepository {
    async fn find_by_id(&self, id: &MedicineId) -> Result<Option<Medicine>, RepositoryError> {
        let medicines = self.medicines.read().await;
        Ok(medicines.get(&id.0).cloned())
    }

    async fn find_by_name_or_id(&self, needle: &str) -> Result<Option<Medicine>, RepositoryError> {
        let medicines = self.medicines.read().await;
        Ok(medicines.values().find(|medicine| medicine.matches_name(needle)).cloned())
    }

    async fn list_in_stock(&self) -> Result<Vec<Medicine>, RepositoryError> {
        let medicines = self.medicines.read().await;
        let mut in_stock: Vec<Medicine> =
            medicines.values().filter(|medicine| medicine.stock > 0).cloned().collect();
        in_stock.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(in_stock)
    }

    async fn save(&self, medicine: Medicine) -> Result<(), RepositoryError> {
        let mut medicines = self.medicines.write().await;
        medicines.insert(medicine.id.0.clone(), medicine);
        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &MedicineId,
        quantity: u32,
    ) -> Result<i64, RepositoryError> {
        let mut medicines = self.medicines.write().await;
        let medicine = medicines
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("medicine `{}`", id.0)))?;
        medicine.stock -= i64::from(quantity);
        Ok(medicine.stock)
    }

    async fn restock(&self, id: &MedicineId, quantity: u32) -> Result<i64, RepositoryError> {
        let mut medicines = self.medicines.write().await;
        let medicine = medicines
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("medicine `{}`", id.0)))?;
        medicine.stock += i64::from(quantity);
        if medicine.stock >= LOW_STOCK_THRESHOLD {
            medicine.low_stock_notified = false;
        }
        Ok(medicine.stock)
    }

    async fn set_low_stock_notified(
        &self,
        id: &MedicineId,
        notified: bool,
    ) -> Result<(), RepositoryError> {
        let mut medicines = self.medicines.write().await;
        if let Some(medicine) = medicines.get_mut(&id.0) {
            medicine.low_stock_notified = notified;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPrescriptionRepository {
    prescriptions: RwLock<Vec<Prescription>>,
}

#[async_trait::async_trait]
impl PrescriptionRepository for InMemoryPrescriptionRepository {
    async fn find_valid(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
        now: DateTime<Utc>,
    ) -> Result<Option<Prescription>, RepositoryError> {
        let prescriptions = self.prescriptions.read().await;
        Ok(prescriptions
            .iter()
            .find(|prescription| {
                prescription.user_id == *user_id
                    && prescription.medicine_id == *medicine_id
                    && prescription.is_valid_at(now)
            })
            .cloned())
    }

    async fn list_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        let prescriptions = self.prescriptions.read().await;
        Ok(prescriptions
            .iter()
            .filter(|prescription| {
                prescription.user_id == *user_id && prescription.is_valid_at(now)
            })
            .cloned()
            .collect())
    }

    async fn save(&self, prescription: Prescription) -> Result<(), RepositoryError> {
        let mut prescriptions = self.prescriptions.write().await;
        prescriptions.retain(|existing| existing.id != prescription.id);
        prescriptions.push(prescription);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|order| order.id == *id).cloned())
    }

    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut for_user: Vec<Order> =
            orders.iter().filter(|order| order.user_id == *user_id).cloned().collect();
        for_user.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        for_user.truncate(limit as usize);
        Ok(for_user)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut for_user: Vec<Order> =
            orders.iter().filter(|order| order.user_id == *user_id).cloned().collect();
        for_user.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(for_user)
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.retain(|existing| existing.id != order.id);
        orders.push(order);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConfirmationRepository {
    confirmations: RwLock<Vec<PendingConfirmation>>,
}

#[async_trait::async_trait]
impl ConfirmationRepository for InMemoryConfirmationRepository {
    async fn propose(&self, confirmation: PendingConfirmation) -> Result<(), RepositoryError> {
        let mut confirmations = self.confirmations.write().await;
        for existing in confirmations.iter_mut() {
            if existing.user_id == confirmation.user_id
                && existing.status == ConfirmationStatus::Waiting
            {
                existing.status = ConfirmationStatus::Cancelled;
            }
        }
        confirmations.push(confirmation);
        Ok(())
    }

    async fn find_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError> {
        let confirmations = self.confirmations.read().await;
        Ok(confirmations
            .iter()
            .find(|confirmation| {
                confirmation.user_id == *user_id && confirmation.is_confirmable(now)
            })
            .cloned())
    }

    async fn confirm_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError> {
        let mut confirmations = self.confirmations.write().await;
        for confirmation in confirmations.iter_mut() {
            if confirmation.user_id == *user_id && confirmation.is_confirmable(now) {
                confirmation.status = ConfirmationStatus::Confirmed;
                return Ok(Some(confirmation.clone()));
            }
        }
        Ok(None)
    }

    async fn cancel_waiting(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let mut confirmations = self.confirmations.write().await;
        let mut cancelled = false;
        for confirmation in confirmations.iter_mut() {
            if confirmation.user_id == *user_id
                && confirmation.status == ConfirmationStatus::Waiting
            {
                confirmation.status = ConfirmationStatus::Cancelled;
                cancelled = true;
            }
        }
        Ok(cancelled)
    }
}

#[derive(Default)]
pub struct InMemoryLedgerRepository {
    entries: RwLock<Vec<InventoryLedgerEntry>>,
}

#[async_trait::async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn append(&self, entry: InventoryLedgerEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn list_for_medicine(
        &self,
        medicine_id: &MedicineId,
    ) -> Result<Vec<InventoryLedgerEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|entry| entry.medicine_id == *medicine_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryRefillAlertRepository {
    alerts: RwLock<HashMap<(String, String), RefillAlert>>,
}

#[async_trait::async_trait]
impl RefillAlertRepository for InMemoryRefillAlertRepository {
    async fn find(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
    ) -> Result<Option<RefillAlert>, RepositoryError> {
        let alerts = self.alerts.read().await;
        Ok(alerts.get(&(user_id.0.clone(), medicine_id.0.clone())).cloned())
    }

    async fn upsert(&self, alert: RefillAlert) -> Result<(), RepositoryError> {
        let mut alerts = self.alerts.write().await;
        alerts.insert((alert.user_id.0.clone(), alert.medicine_id.0.clone()), alert);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, UserAccount>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, user: UserAccount) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub async fn all(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        let mut recent: Vec<Notification> = notifications.clone();
        recent.sort_by(|left, right| right.sent_at.cmp(&left.sent_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use remedi_core::domain::confirmation::{
        ConfirmationStatus, PendingConfirmation, ProposedItem,
    };
    use remedi_core::domain::medicine::{Medicine, MedicineId};
    use remedi_core::domain::user::UserId;

    use crate::repositories::{
        ConfirmationRepository, InMemoryConfirmationRepository, InMemoryMedicineRepository,
        MedicineRepository,
    };

    fn medicine(stock: i64) -> Medicine {
        Medicine {
            id: MedicineId("med-paracetamol".to_string()),
            name: "Paracetamol".to_string(),
            unit_price: Decimal::new(250, 2),
            stock,
            requires_prescription: false,
            default_dosage_per_day: 3,
            low_stock_notified: false,
        }
    }

    fn proposal(user: &str) -> PendingConfirmation {
        PendingConfirmation::propose(
            UserId(user.to_string()),
            vec![ProposedItem {
                medicine_id: MedicineId("med-paracetamol".to_string()),
                medicine_name: "Paracetamol".to_string(),
                quantity: 1,
                dosage_per_day: 3,
                unit_price: Decimal::new(250, 2),
            }],
            Decimal::new(250, 2),
        )
    }

    #[tokio::test]
    async fn decrement_and_restock_round_trip() {
        let repo = InMemoryMedicineRepository::with_catalog(vec![medicine(5)]).await;
        let id = MedicineId("med-paracetamol".to_string());

        let post = repo.decrement_stock(&id, 2).await.expect("decrement");
        assert_eq!(post, 3);

        repo.set_low_stock_notified(&id, true).await.expect("flag");
        let post = repo.restock(&id, 7).await.expect("restock");
        assert_eq!(post, 10);

        let fetched = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert!(!fetched.low_stock_notified, "restock to threshold clears the flag");
    }

    #[tokio::test]
    async fn restock_below_threshold_keeps_flag() {
        let repo = InMemoryMedicineRepository::with_catalog(vec![medicine(5)]).await;
        let id = MedicineId("med-paracetamol".to_string());

        repo.set_low_stock_notified(&id, true).await.expect("flag");
        let post = repo.restock(&id, 2).await.expect("restock");
        assert_eq!(post, 7);

        let fetched = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert!(fetched.low_stock_notified);
    }

    #[tokio::test]
    async fn propose_supersedes_prior_waiting_row() {
        let repo = InMemoryConfirmationRepository::default();
        let user = UserId("u-1".to_string());

        repo.propose(proposal("u-1")).await.expect("first proposal");
        repo.propose(proposal("u-1")).await.expect("second proposal");

        let waiting = repo.find_waiting(&user, Utc::now()).await.expect("find");
        assert!(waiting.is_some());

        // Only one row is confirmable; the superseded one is cancelled.
        let first = repo.confirm_waiting(&user, Utc::now()).await.expect("confirm");
        assert!(first.is_some());
        let second = repo.confirm_waiting(&user, Utc::now()).await.expect("confirm again");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_proposal_is_not_confirmable() {
        let repo = InMemoryConfirmationRepository::default();
        let user = UserId("u-1".to_string());

        let mut expired = proposal("u-1");
        expired.expires_at = Utc::now() - Duration::seconds(1);
        repo.propose(expired).await.expect("propose");

        let confirmed = repo.confirm_waiting(&user, Utc::now()).await.expect("confirm");
        assert!(confirmed.is_none());
    }

    #[tokio::test]
    async fn confirmed_rows_stay_confirmed() {
        let repo = InMemoryConfirmationRepository::default();
        let user = UserId("u-1".to_string());

        repo.propose(proposal("u-1")).await.expect("propose");
        let confirmed =
            repo.confirm_waiting(&user, Utc::now()).await.expect("confirm").expect("payload");
        assert_eq!(confirmed.status, ConfirmationStatus::Confirmed);
        assert!(repo.find_waiting(&user, Utc::now()).await.expect("find").is_none());
    }
}
