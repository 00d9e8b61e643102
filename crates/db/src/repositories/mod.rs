use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use remedi_core::domain::confirmation::PendingConfirmation;
use remedi_core::domain::ledger::InventoryLedgerEntry;
use remedi_core::domain::medicine::{Medicine, MedicineId};
use remedi_core::domain::notification::Notification;
use remedi_core::domain::order::{Order, OrderId};
use remedi_core::domain::prescription::Prescription;
use remedi_core::domain::refill::RefillAlert;
use remedi_core::domain::user::{UserAccount, UserId};

pub mod confirmation;
pub mod ledger;
pub mod medicine;
pub mod memory;
pub mod notification;
pub mod order;
pub mod prescription;
pub mod refill_alert;
pub mod user;

pub use confirmation::SqlConfirmationRepository;
pub use ledger::SqlLedgerRepository;
pub use medicine::SqlMedicineRepository;
pub use memory::{
    InMemoryConfirmationRepository, InMemoryLedgerRepository, InMemoryMedicineRepository,
    InMemoryNotificationRepository, InMemoryOrderRepository, InMemoryPrescriptionRepository,
    InMemoryRefillAlertRepository, InMemoryUserRepository,
};
pub use notification::SqlNotificationRepository;
pub use order::SqlOrderRepository;
pub use prescription::SqlPrescriptionRepository;
pub use refill_alert::SqlRefillAlertRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait MedicineRepository: Send + Sync {
    async fn find_by_id(&self, id: &MedicineId) -> Result<Option<Medicine>, RepositoryError>;

    /// Case-insensitive lookup by display name or id.
    async fn find_by_name_or_id(&self, needle: &str) -> Result<Option<Medicine>, RepositoryError>;

    async fn list_in_stock(&self) -> Result<Vec<Medicine>, RepositoryError>;

    async fn save(&self, medicine: Medicine) -> Result<(), RepositoryError>;

    /// Returns the post-decrement stock level.
    async fn decrement_stock(
        &self,
        id: &MedicineId,
        quantity: u32,
    ) -> Result<i64, RepositoryError>;

    /// Manual restock. Clears `low_stock_notified` when the new level reaches
    /// the threshold again. Returns the post-restock stock level.
    async fn restock(&self, id: &MedicineId, quantity: u32) -> Result<i64, RepositoryError>;

    async fn set_low_stock_notified(
        &self,
        id: &MedicineId,
        notified: bool,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    async fn find_valid(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
        now: DateTime<Utc>,
    ) -> Result<Option<Prescription>, RepositoryError>;

    async fn list_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prescription>, RepositoryError>;

    async fn save(&self, prescription: Prescription) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Most recent orders first.
    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConfirmationRepository: Send + Sync {
    /// Stores a WAITING proposal, superseding any prior WAITING row for the
    /// same user in the same transaction.
    async fn propose(&self, confirmation: PendingConfirmation) -> Result<(), RepositoryError>;

    async fn find_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError>;

    /// Transitions the live WAITING row to CONFIRMED and returns its payload.
    /// Expired-but-unswept rows behave exactly like absent ones. The
    /// transition happens at most once per row.
    async fn confirm_waiting(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingConfirmation>, RepositoryError>;

    async fn cancel_waiting(&self, user_id: &UserId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn append(&self, entry: InventoryLedgerEntry) -> Result<(), RepositoryError>;

    async fn list_for_medicine(
        &self,
        medicine_id: &MedicineId,
    ) -> Result<Vec<InventoryLedgerEntry>, RepositoryError>;
}

#[async_trait]
pub trait RefillAlertRepository: Send + Sync {
    async fn find(
        &self,
        user_id: &UserId,
        medicine_id: &MedicineId,
    ) -> Result<Option<RefillAlert>, RepositoryError>;

    /// Last write wins; concurrent upserts for one (user, medicine) are
    /// acceptable.
    async fn upsert(&self, alert: RefillAlert) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;

    async fn save(&self, user: UserAccount) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Notifications are write-once; there is no update path.
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<Notification>, RepositoryError>;
}

pub(crate) fn parse_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal `{raw}`: {error}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}
