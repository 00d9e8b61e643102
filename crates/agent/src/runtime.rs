use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use remedi_core::audit::{
    DecisionEvent, DecisionOutcome, DecisionSink, DecisionStage, InMemoryDecisionLog,
};
use remedi_core::domain::confirmation::{PendingConfirmation, ProposedItem};
use remedi_core::domain::order::{Order, OrderId};
use remedi_core::domain::user::UserId;
use remedi_core::errors::ApplicationError;
use remedi_core::config::AppConfig;
use remedi_core::safety::{RequestedItem, SafetyValidator};
use remedi_db::repositories::{
    ConfirmationRepository, MedicineRepository, OrderRepository, PrescriptionRepository,
    SqlConfirmationRepository, SqlLedgerRepository, SqlMedicineRepository,
    SqlNotificationRepository, SqlOrderRepository, SqlPrescriptionRepository,
    SqlRefillAlertRepository, SqlUserRepository,
};
use remedi_db::DbPool;
use remedi_notify::channel::LoggingChannelPublisher;
use remedi_notify::webhook::{HttpWebhookSink, NoopWebhookSink, WebhookSink};

use crate::chain::ProviderChain;
use crate::intent::{IntentKind, IntentResolver, IntentResult};
use crate::order::{store_error, OrderEngine};
use crate::providers::provider_from_config;
use crate::refill::RefillEngine;

/// Outbound webhook requests give up after this many seconds.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// How far back the resolver looks when the caller supplies no history.
const HISTORY_WINDOW: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    AwaitingConfirmation,
    OrderSuccess,
    NoPendingOrder,
    RejectedBySafety,
    CompletedConversation,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub intent: IntentKind,
    pub workflow_status: WorkflowStatus,
    pub order_id: Option<OrderId>,
}

/// One inbound message drives one sequential pipeline run: intent, then the
/// branch-specific stages, each recorded in the decision log. Every branch
/// terminates with a response; provider failures degrade the answer rather
/// than surface as errors.
pub struct ChatRuntime {
    resolver: IntentResolver,
    validator: SafetyValidator,
    medicines: Arc<dyn MedicineRepository>,
    prescriptions: Arc<dyn PrescriptionRepository>,
    orders: Arc<dyn OrderRepository>,
    confirmations: Arc<dyn ConfirmationRepository>,
    order_engine: OrderEngine,
    refill: RefillEngine,
    decisions: InMemoryDecisionLog,
}

impl ChatRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: IntentResolver,
        validator: SafetyValidator,
        medicines: Arc<dyn MedicineRepository>,
        prescriptions: Arc<dyn PrescriptionRepository>,
        orders: Arc<dyn OrderRepository>,
        confirmations: Arc<dyn ConfirmationRepository>,
        order_engine: OrderEngine,
        refill: RefillEngine,
        decisions: InMemoryDecisionLog,
    ) -> Self {
        Self {
            resolver,
            validator,
            medicines,
            prescriptions,
            orders,
            confirmations,
            order_engine,
            refill,
            decisions,
        }
    }

    /// Production wiring: SQLite-backed repositories, the two configured
    /// completion providers in fallback order, HTTP webhooks, and the logging
    /// channel publisher.
    pub fn from_config(config: &AppConfig, db_pool: DbPool) -> Self {
        let chain = ProviderChain::new(vec![
            provider_from_config(&config.primary_provider),
            provider_from_config(&config.secondary_provider),
        ]);

        let medicines = Arc::new(SqlMedicineRepository::new(db_pool.clone()));
        let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
        let notifications = Arc::new(SqlNotificationRepository::new(db_pool.clone()));
        let webhooks: Arc<dyn WebhookSink> = if config.webhooks.fulfillment_url.is_none()
            && config.webhooks.low_stock_url.is_none()
        {
            Arc::new(NoopWebhookSink)
        } else {
            Arc::new(HttpWebhookSink::new(
                config.webhooks.fulfillment_url.clone(),
                config.webhooks.low_stock_url.clone(),
                WEBHOOK_TIMEOUT_SECS,
            ))
        };
        let channels = Arc::new(LoggingChannelPublisher);

        let refill = RefillEngine::new(
            orders.clone(),
            Arc::new(SqlRefillAlertRepository::new(db_pool.clone())),
            notifications.clone(),
            channels.clone(),
            chain.clone(),
        );
        let order_engine = OrderEngine::new(
            medicines.clone(),
            orders.clone(),
            Arc::new(SqlUserRepository::new(db_pool.clone())),
            Arc::new(SqlLedgerRepository::new(db_pool.clone())),
            notifications,
            chain.clone(),
            webhooks,
            channels,
        );

        Self::new(
            IntentResolver::new(chain),
            SafetyValidator::new(),
            medicines,
            Arc::new(SqlPrescriptionRepository::new(db_pool.clone())),
            orders,
            Arc::new(SqlConfirmationRepository::new(db_pool)),
            order_engine,
            refill,
            InMemoryDecisionLog::default(),
        )
    }

    pub fn decision_log(&self) -> InMemoryDecisionLog {
        self.decisions.clone()
    }

    pub fn order_engine(&self) -> &OrderEngine {
        &self.order_engine
    }

    pub fn refill_engine(&self) -> &RefillEngine {
        &self.refill
    }

    pub async fn chat(
        &self,
        user_id: &UserId,
        utterance: &str,
        history: Option<Vec<Order>>,
    ) -> Result<ChatResponse, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let history = match history {
            Some(history) => history,
            None => self
                .orders
                .recent_for_user(user_id, HISTORY_WINDOW)
                .await
                .map_err(store_error)?,
        };
        let catalog = self.medicines.list_in_stock().await.map_err(store_error)?;
        let prescriptions = self
            .prescriptions
            .list_valid_for_user(user_id, now)
            .await
            .map_err(store_error)?;

        let intent = self.resolver.resolve(utterance, &history, &catalog, &prescriptions).await;
        info!(
            user_id = %user_id.0,
            correlation_id,
            intent = intent.intent.as_str(),
            "intent resolved"
        );
        self.decisions.record(
            DecisionEvent::new(
                Some(user_id.clone()),
                correlation_id.clone(),
                DecisionStage::Intent,
                DecisionOutcome::Success,
            )
            .with_metadata("intent", intent.intent.as_str()),
        );

        match intent.intent {
            IntentKind::ConfirmOrder => self.handle_confirm(user_id, &intent, &correlation_id).await,
            IntentKind::OrderMedicine | IntentKind::Refill => {
                self.handle_order_request(user_id, &intent, &catalog, &prescriptions, &correlation_id)
                    .await
            }
            _ => Ok(ChatResponse {
                answer: intent.answer.clone(),
                intent: intent.intent,
                workflow_status: WorkflowStatus::CompletedConversation,
                order_id: None,
            }),
        }
    }

    async fn handle_confirm(
        &self,
        user_id: &UserId,
        intent: &IntentResult,
        correlation_id: &str,
    ) -> Result<ChatResponse, ApplicationError> {
        let pending = self
            .confirmations
            .confirm_waiting(user_id, Utc::now())
            .await
            .map_err(store_error)?;

        let Some(pending) = pending else {
            self.decisions.record(DecisionEvent::new(
                Some(user_id.clone()),
                correlation_id.to_string(),
                DecisionStage::Confirmation,
                DecisionOutcome::Rejected,
            ));
            let answer = self
                .resolver
                .translate(
                    "There is no pending order to confirm. It may have expired; please start over.",
                    &intent.language,
                )
                .await;
            return Ok(ChatResponse {
                answer,
                intent: intent.intent,
                workflow_status: WorkflowStatus::NoPendingOrder,
                order_id: None,
            });
        };

        self.decisions.record(DecisionEvent::new(
            Some(user_id.clone()),
            correlation_id.to_string(),
            DecisionStage::Confirmation,
            DecisionOutcome::Success,
        ));

        let order_id = self
            .order_engine
            .process_order(user_id, &pending.items, Some(pending.total))
            .await?;
        self.decisions.record(
            DecisionEvent::new(
                Some(user_id.clone()),
                correlation_id.to_string(),
                DecisionStage::Placement,
                DecisionOutcome::Success,
            )
            .with_metadata("order_id", order_id.0.clone()),
        );

        match self.refill.analyze_and_alert(user_id).await {
            Ok(raised) => {
                self.decisions.record(
                    DecisionEvent::new(
                        Some(user_id.clone()),
                        correlation_id.to_string(),
                        DecisionStage::Refill,
                        DecisionOutcome::Success,
                    )
                    .with_metadata("alerts", raised.len().to_string()),
                );
            }
            Err(error) => {
                warn!(user_id = %user_id.0, error = %error, "refill analysis after placement failed");
                self.decisions.record(DecisionEvent::new(
                    Some(user_id.clone()),
                    correlation_id.to_string(),
                    DecisionStage::Refill,
                    DecisionOutcome::Failed,
                ));
            }
        }

        let answer = self
            .resolver
            .translate(
                &format!(
                    "Your order is placed. Total: {}. Order reference: {}.",
                    pending.total, order_id.0
                ),
                &intent.language,
            )
            .await;
        Ok(ChatResponse {
            answer,
            intent: intent.intent,
            workflow_status: WorkflowStatus::OrderSuccess,
            order_id: Some(order_id),
        })
    }

    async fn handle_order_request(
        &self,
        user_id: &UserId,
        intent: &IntentResult,
        catalog: &[remedi_core::domain::medicine::Medicine],
        prescriptions: &[remedi_core::domain::prescription::Prescription],
        correlation_id: &str,
    ) -> Result<ChatResponse, ApplicationError> {
        let Some(medicine_name) = intent.medicine_name.as_deref() else {
            let answer = self
                .resolver
                .translate("Which medicine would you like to order?", &intent.language)
                .await;
            return Ok(ChatResponse {
                answer,
                intent: intent.intent,
                workflow_status: WorkflowStatus::CompletedConversation,
                order_id: None,
            });
        };

        let quantity = intent.quantity.unwrap_or(1);
        let requested =
            vec![RequestedItem { name: medicine_name.to_string(), quantity }];
        let verdict =
            self.validator.validate(user_id, &requested, catalog, prescriptions, Utc::now());

        if !verdict.approved {
            self.decisions.record(
                DecisionEvent::new(
                    Some(user_id.clone()),
                    correlation_id.to_string(),
                    DecisionStage::Safety,
                    DecisionOutcome::Rejected,
                )
                .with_metadata("reasons", verdict.reasons.join("; ")),
            );
            let answer = self
                .resolver
                .translate(
                    &format!("I cannot place this order: {}.", verdict.reasons.join("; ")),
                    &intent.language,
                )
                .await;
            return Ok(ChatResponse {
                answer,
                intent: intent.intent,
                workflow_status: WorkflowStatus::RejectedBySafety,
                order_id: None,
            });
        }

        self.decisions.record(DecisionEvent::new(
            Some(user_id.clone()),
            correlation_id.to_string(),
            DecisionStage::Safety,
            DecisionOutcome::Success,
        ));

        // The verdict resolved the id; the catalog row carries price and
        // default dosage.
        let medicine = verdict.per_item[0]
            .resolved_medicine_id
            .as_ref()
            .and_then(|id| catalog.iter().find(|medicine| &medicine.id == id))
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("medicine `{medicine_name}`"))
            })?;

        let item = ProposedItem {
            medicine_id: medicine.id.clone(),
            medicine_name: medicine.name.clone(),
            quantity,
            dosage_per_day: intent.dosage_per_day.unwrap_or(medicine.default_dosage_per_day),
            unit_price: medicine.unit_price,
        };
        let total = medicine.unit_price * Decimal::from(quantity);
        let proposal = PendingConfirmation::propose(user_id.clone(), vec![item], total);
        self.confirmations.propose(proposal).await.map_err(store_error)?;

        let answer = self
            .resolver
            .translate(
                &format!(
                    "That is {} x {} for a total of {}. Reply \"yes\" within 10 minutes to confirm.",
                    quantity, medicine.name, total
                ),
                &intent.language,
            )
            .await;
        Ok(ChatResponse {
            answer,
            intent: intent.intent,
            workflow_status: WorkflowStatus::AwaitingConfirmation,
            order_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use remedi_core::audit::InMemoryDecisionLog;
    use remedi_core::domain::medicine::{Medicine, MedicineId};
    use remedi_core::domain::user::UserId;
    use remedi_core::safety::SafetyValidator;
    use remedi_db::repositories::{
        InMemoryConfirmationRepository, InMemoryLedgerRepository, InMemoryMedicineRepository,
        InMemoryNotificationRepository, InMemoryOrderRepository, InMemoryPrescriptionRepository,
        InMemoryRefillAlertRepository, InMemoryUserRepository,
    };
    use remedi_notify::channel::InMemoryChannelPublisher;
    use remedi_notify::webhook::InMemoryWebhookSink;

    use super::{ChatRuntime, WorkflowStatus};
    use crate::chain::ProviderChain;
    use crate::intent::IntentResolver;
    use crate::llm::{CompletionProvider, ScriptedProvider};
    use crate::order::OrderEngine;
    use crate::refill::RefillEngine;

    fn paracetamol() -> Medicine {
        Medicine {
            id: MedicineId("med-paracetamol".to_string()),
            name: "Paracetamol".to_string(),
            unit_price: Decimal::new(250, 2),
            stock: 50,
            requires_prescription: false,
            default_dosage_per_day: 3,
            low_stock_notified: false,
        }
    }

    async fn runtime(provider: ScriptedProvider) -> ChatRuntime {
        let medicines =
            Arc::new(InMemoryMedicineRepository::with_catalog(vec![paracetamol()]).await);
        let orders = Arc::new(InMemoryOrderRepository::default());
        let chain =
            ProviderChain::new(vec![Arc::new(provider) as Arc<dyn CompletionProvider>]);
        let notifications = Arc::new(InMemoryNotificationRepository::default());
        let channels = Arc::new(InMemoryChannelPublisher::new());
        let refill = RefillEngine::new(
            orders.clone(),
            Arc::new(InMemoryRefillAlertRepository::default()),
            notifications.clone(),
            channels.clone(),
            chain.clone(),
        );
        let engine = OrderEngine::new(
            medicines.clone(),
            orders.clone(),
            Arc::new(InMemoryUserRepository::default()),
            Arc::new(InMemoryLedgerRepository::default()),
            notifications,
            chain.clone(),
            Arc::new(InMemoryWebhookSink::new()),
            channels,
        );
        ChatRuntime::new(
            IntentResolver::new(chain),
            SafetyValidator::new(),
            medicines,
            Arc::new(InMemoryPrescriptionRepository::default()),
            orders,
            Arc::new(InMemoryConfirmationRepository::default()),
            engine,
            refill,
            InMemoryDecisionLog::default(),
        )
    }

    fn user() -> UserId {
        UserId("user-1".to_string())
    }

    #[tokio::test]
    async fn general_query_returns_the_resolver_answer() {
        let runtime = runtime(ScriptedProvider::new("primary").enqueue(Ok(
            "{\"intent\": \"GENERAL_QUERY\", \"answer\": \"We are open around the clock.\", \
             \"language\": \"English\"}",
        )))
        .await;

        let response = runtime.chat(&user(), "when are you open?", None).await.unwrap();
        assert_eq!(response.workflow_status, WorkflowStatus::CompletedConversation);
        assert_eq!(response.answer, "We are open around the clock.");
        assert!(response.order_id.is_none());
    }

    #[tokio::test]
    async fn order_without_a_medicine_name_asks_for_one() {
        let runtime = runtime(ScriptedProvider::new("primary").enqueue(Ok(
            "{\"intent\": \"ORDER_MEDICINE\", \"answer\": \"\", \"language\": \"English\", \
             \"missing_fields\": [\"medicine_name\"]}",
        )))
        .await;

        let response = runtime.chat(&user(), "I want to order something", None).await.unwrap();
        assert_eq!(response.workflow_status, WorkflowStatus::CompletedConversation);
        assert!(response.answer.contains("Which medicine"));
    }

    #[tokio::test]
    async fn confirm_without_pending_proposal_reports_none() {
        let runtime = runtime(ScriptedProvider::new("primary").enqueue(Ok(
            "{\"intent\": \"CONFIRM_ORDER\", \"answer\": \"\", \"language\": \"English\"}",
        )))
        .await;

        let response = runtime.chat(&user(), "yes", None).await.unwrap();
        assert_eq!(response.workflow_status, WorkflowStatus::NoPendingOrder);
        assert!(response.order_id.is_none());
    }
}
