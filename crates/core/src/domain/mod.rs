pub mod confirmation;
pub mod ledger;
pub mod medicine;
pub mod notification;
pub mod order;
pub mod prescription;
pub mod refill;
pub mod user;
