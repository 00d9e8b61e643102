//! Agent Runtime - the decision pipeline behind the pharmacy chat
//!
//! This crate turns one inbound message into a safe, possibly-committed order
//! plus downstream alerts:
//!
//! 1. **Intent Resolution** (`intent`) - utterance + context → structured
//!    `IntentResult`, via a two-provider fallback chain
//! 2. **Confirmation / Placement** (`runtime`, `order`) - propose-then-confirm
//!    handshake, order commit with inventory effects
//! 3. **Predictive Refill** (`refill`) - per-medicine depletion forecast with
//!    alert dedup
//!
//! # Key Types
//!
//! - `ChatRuntime` - the single entry point; sequences the stages per message
//! - `CompletionProvider` - pluggable trait for text-completion backends
//! - `ProviderChain` - ordered fallback over providers
//!
//! # Safety Principle
//!
//! The completion providers are strictly translators and forecasters. They
//! never decide stock, prescriptions, prices, or whether an order commits.
//! Those are deterministic decisions made against the data store.

pub mod chain;
pub mod intent;
pub mod llm;
pub mod order;
pub mod providers;
pub mod refill;
pub mod runtime;

pub use chain::ProviderChain;
pub use intent::{IntentKind, IntentResolver, IntentResult};
pub use llm::{CompletionProvider, ProviderError};
pub use order::OrderEngine;
pub use refill::RefillEngine;
pub use runtime::{ChatResponse, ChatRuntime, WorkflowStatus};
