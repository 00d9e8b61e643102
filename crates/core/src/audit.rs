use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionStage {
    Intent,
    Safety,
    Confirmation,
    Placement,
    Refill,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    Success,
    Rejected,
    Failed,
}

/// One pipeline decision, appended per stage per inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: String,
    pub user_id: Option<UserId>,
    pub correlation_id: String,
    pub stage: DecisionStage,
    pub outcome: DecisionOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn new(
        user_id: Option<UserId>,
        correlation_id: impl Into<String>,
        stage: DecisionStage,
        outcome: DecisionOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id,
            correlation_id: correlation_id.into(),
            stage,
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait DecisionSink: Send + Sync {
    fn record(&self, event: DecisionEvent);
}

/// Ordered, read-only trail of past intent/safety decisions.
#[derive(Clone, Default)]
pub struct InMemoryDecisionLog {
    events: Arc<Mutex<Vec<DecisionEvent>>>,
}

impl InMemoryDecisionLog {
    pub fn events(&self) -> Vec<DecisionEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DecisionSink for InMemoryDecisionLog {
    fn record(&self, event: DecisionEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
