pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod safety;

pub use audit::{DecisionEvent, DecisionOutcome, DecisionSink, DecisionStage, InMemoryDecisionLog};
pub use domain::confirmation::{
    ConfirmationStatus, PendingConfirmation, ProposedItem, CONFIRMATION_WINDOW_SECS,
};
pub use domain::ledger::{InventoryLedgerEntry, LedgerReason};
pub use domain::medicine::{Medicine, MedicineId, LOW_STOCK_THRESHOLD};
pub use domain::notification::{Notification, NotificationKind, Recipient};
pub use domain::order::{Order, OrderId, OrderItem, OrderStatus};
pub use domain::prescription::{Prescription, PrescriptionId};
pub use domain::refill::{RefillAlert, REFILL_ALERT_DAYS};
pub use domain::user::{UserAccount, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use safety::{
    ItemStatus, ItemVerdict, RejectReason, RequestedItem, SafetyValidator, SafetyVerdict,
};

pub use chrono;
pub use rust_decimal;
