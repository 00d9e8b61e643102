//! End-to-end pipeline runs: utterance in, workflow status out, with the
//! in-memory store and scripted providers standing in for SQLite and the
//! hosted models.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use remedi_agent::chain::ProviderChain;
use remedi_agent::intent::IntentKind;
use remedi_agent::llm::{CompletionProvider, ScriptedProvider};
use remedi_agent::order::OrderEngine;
use remedi_agent::refill::RefillEngine;
use remedi_agent::runtime::{ChatRuntime, WorkflowStatus};
use remedi_core::audit::{DecisionStage, InMemoryDecisionLog};
use remedi_core::domain::confirmation::PendingConfirmation;
use remedi_core::domain::medicine::{Medicine, MedicineId};
use remedi_core::domain::order::OrderStatus;
use remedi_core::domain::prescription::{Prescription, PrescriptionId};
use remedi_core::domain::user::UserId;
use remedi_core::safety::SafetyValidator;
use remedi_db::repositories::{
    ConfirmationRepository, InMemoryConfirmationRepository, InMemoryLedgerRepository,
    InMemoryMedicineRepository, InMemoryNotificationRepository, InMemoryOrderRepository,
    InMemoryPrescriptionRepository, InMemoryRefillAlertRepository, InMemoryUserRepository,
    MedicineRepository, OrderRepository, PrescriptionRepository,
};
use remedi_notify::channel::InMemoryChannelPublisher;
use remedi_notify::webhook::{InMemoryWebhookSink, WebhookEvent};

fn medicine(id: &str, name: &str, stock: i64, requires_prescription: bool) -> Medicine {
    Medicine {
        id: MedicineId(id.to_string()),
        name: name.to_string(),
        unit_price: Decimal::new(250, 2),
        stock,
        requires_prescription,
        default_dosage_per_day: 3,
        low_stock_notified: false,
    }
}

fn user() -> UserId {
    UserId("user-1".to_string())
}

struct Harness {
    runtime: ChatRuntime,
    medicines: Arc<InMemoryMedicineRepository>,
    orders: Arc<InMemoryOrderRepository>,
    confirmations: Arc<InMemoryConfirmationRepository>,
    prescriptions: Arc<InMemoryPrescriptionRepository>,
    webhooks: Arc<InMemoryWebhookSink>,
}

async fn harness(catalog: Vec<Medicine>, providers: Vec<ScriptedProvider>) -> Harness {
    let medicines = Arc::new(InMemoryMedicineRepository::with_catalog(catalog).await);
    let orders = Arc::new(InMemoryOrderRepository::default());
    let confirmations = Arc::new(InMemoryConfirmationRepository::default());
    let prescriptions = Arc::new(InMemoryPrescriptionRepository::default());
    let notifications = Arc::new(InMemoryNotificationRepository::default());
    let webhooks = Arc::new(InMemoryWebhookSink::new());
    let channels = Arc::new(InMemoryChannelPublisher::new());
    let chain = ProviderChain::new(
        providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
            .collect(),
    );

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
        webhooks.clone(),
        channels,
    );
    let runtime = ChatRuntime::new(
        remedi_agent::intent::IntentResolver::new(chain),
        SafetyValidator::new(),
        medicines.clone(),
        prescriptions.clone(),
        orders.clone(),
        confirmations.clone(),
        engine,
        refill,
        InMemoryDecisionLog::default(),
    );

    Harness { runtime, medicines, orders, confirmations, prescriptions, webhooks }
}

fn order_intent(name: &str, quantity: u32) -> String {
    format!(
        "{{\"intent\": \"ORDER_MEDICINE\", \"answer\": \"\", \"language\": \"English\", \
         \"medicine_name\": \"{name}\", \"quantity\": {quantity}}}"
    )
}

const CONFIRM_INTENT: &str =
    r#"{"intent": "CONFIRM_ORDER", "answer": "", "language": "English"}"#;

// A confirm turn drives three chain calls in order: intent classification,
// end-date prediction, refill forecast.
const END_DATE: &str = "2026-12-01";
const NO_PREDICTIONS: &str = "[]";

#[tokio::test]
async fn order_then_confirm_places_one_confirmed_order() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![ScriptedProvider::new("primary")
            .enqueue(Ok(&order_intent("Paracetamol", 1)))
            .enqueue(Ok(CONFIRM_INTENT))
            .enqueue(Ok(END_DATE))
            .enqueue(Ok(NO_PREDICTIONS))],
    )
    .await;

    let first = harness.runtime.chat(&user(), "I need Paracetamol", None).await.unwrap();
    assert_eq!(first.workflow_status, WorkflowStatus::AwaitingConfirmation);
    assert!(first.answer.contains("2.50"));
    assert!(first.order_id.is_none());
    assert!(harness.orders.list_for_user(&user()).await.unwrap().is_empty());

    let second = harness.runtime.chat(&user(), "yes", None).await.unwrap();
    assert_eq!(second.workflow_status, WorkflowStatus::OrderSuccess);
    let order_id = second.order_id.expect("confirmed chat carries an order id");

    let order = harness.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.total_amount, Decimal::new(250, 2));

    let stocked = harness
        .medicines
        .find_by_id(&MedicineId("med-paracetamol".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stocked.stock, 49);
}

#[tokio::test]
async fn happy_path_records_every_pipeline_stage() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![ScriptedProvider::new("primary")
            .enqueue(Ok(&order_intent("Paracetamol", 1)))
            .enqueue(Ok(CONFIRM_INTENT))
            .enqueue(Ok(END_DATE))
            .enqueue(Ok(NO_PREDICTIONS))],
    )
    .await;

    harness.runtime.chat(&user(), "I need Paracetamol", None).await.unwrap();
    harness.runtime.chat(&user(), "yes", None).await.unwrap();

    let stages: Vec<DecisionStage> = harness
        .runtime
        .decision_log()
        .events()
        .into_iter()
        .map(|event| event.stage)
        .collect();
    assert_eq!(
        stages,
        vec![
            DecisionStage::Intent,
            DecisionStage::Safety,
            DecisionStage::Intent,
            DecisionStage::Confirmation,
            DecisionStage::Placement,
            DecisionStage::Refill,
        ]
    );
}

#[tokio::test]
async fn confirm_without_proposal_places_nothing() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![ScriptedProvider::new("primary").enqueue(Ok(CONFIRM_INTENT))],
    )
    .await;

    let response = harness.runtime.chat(&user(), "yes", None).await.unwrap();
    assert_eq!(response.workflow_status, WorkflowStatus::NoPendingOrder);
    assert!(harness.orders.list_for_user(&user()).await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_proposal_behaves_like_no_proposal() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![ScriptedProvider::new("primary").enqueue(Ok(CONFIRM_INTENT))],
    )
    .await;

    let mut stale = PendingConfirmation::propose(
        user(),
        vec![remedi_core::domain::confirmation::ProposedItem {
            medicine_id: MedicineId("med-paracetamol".to_string()),
            medicine_name: "Paracetamol".to_string(),
            quantity: 1,
            dosage_per_day: 3,
            unit_price: Decimal::new(250, 2),
        }],
        Decimal::new(250, 2),
    );
    stale.expires_at = Utc::now() - Duration::seconds(1);
    harness.confirmations.propose(stale).await.unwrap();

    let response = harness.runtime.chat(&user(), "yes", None).await.unwrap();
    assert_eq!(response.workflow_status, WorkflowStatus::NoPendingOrder);
    assert!(harness.orders.list_for_user(&user()).await.unwrap().is_empty());
}

#[tokio::test]
async fn reproposing_supersedes_the_earlier_proposal() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![ScriptedProvider::new("primary")
            .enqueue(Ok(&order_intent("Paracetamol", 1)))
            .enqueue(Ok(&order_intent("Paracetamol", 4)))],
    )
    .await;

    harness.runtime.chat(&user(), "I need Paracetamol", None).await.unwrap();
    harness.runtime.chat(&user(), "actually make it four", None).await.unwrap();

    let waiting =
        harness.confirmations.find_waiting(&user(), Utc::now()).await.unwrap().unwrap();
    assert_eq!(waiting.items[0].quantity, 4);
    assert_eq!(waiting.total, Decimal::new(1000, 2));
}

#[tokio::test]
async fn over_stock_request_is_rejected_by_safety() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 5, false)],
        vec![ScriptedProvider::new("primary").enqueue(Ok(&order_intent("Paracetamol", 100)))],
    )
    .await;

    let response = harness.runtime.chat(&user(), "100 paracetamol please", None).await.unwrap();
    assert_eq!(response.workflow_status, WorkflowStatus::RejectedBySafety);
    assert!(response.answer.contains("only 5 units"));
    assert!(harness.confirmations.find_waiting(&user(), Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn prescription_gate_blocks_until_a_valid_one_is_filed() {
    let harness = harness(
        vec![medicine("med-amoxicillin", "Amoxicillin", 30, true)],
        vec![ScriptedProvider::new("primary")
            .enqueue(Ok(&order_intent("Amoxicillin", 1)))
            .enqueue(Ok(&order_intent("Amoxicillin", 1)))],
    )
    .await;

    let blocked = harness.runtime.chat(&user(), "I need Amoxicillin", None).await.unwrap();
    assert_eq!(blocked.workflow_status, WorkflowStatus::RejectedBySafety);
    assert!(blocked.answer.contains("prescription"));

    harness
        .prescriptions
        .save(Prescription {
            id: PrescriptionId("rx-1".to_string()),
            user_id: user(),
            medicine_id: MedicineId("med-amoxicillin".to_string()),
            prescribed_by: "Dr. Rao".to_string(),
            valid_till: Utc::now() + Duration::days(30),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let allowed = harness.runtime.chat(&user(), "I need Amoxicillin", None).await.unwrap();
    assert_eq!(allowed.workflow_status, WorkflowStatus::AwaitingConfirmation);
}

#[tokio::test]
async fn dead_providers_still_answer_the_user() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 50, false)],
        vec![
            ScriptedProvider::always_unavailable("primary"),
            ScriptedProvider::always_unavailable("secondary"),
        ],
    )
    .await;

    let response = harness.runtime.chat(&user(), "I need Paracetamol", None).await.unwrap();
    assert_eq!(response.intent, IntentKind::Fallback);
    assert_eq!(response.workflow_status, WorkflowStatus::CompletedConversation);
    assert!(!response.answer.is_empty());
}

#[tokio::test]
async fn low_stock_crossing_fires_the_webhook_once() {
    let harness = harness(
        vec![medicine("med-paracetamol", "Paracetamol", 11, false)],
        vec![ScriptedProvider::new("primary")
            .enqueue(Ok(&order_intent("Paracetamol", 2)))
            .enqueue(Ok(CONFIRM_INTENT))
            .enqueue(Ok(END_DATE))
            .enqueue(Ok(NO_PREDICTIONS))
            .enqueue(Ok(&order_intent("Paracetamol", 1)))
            .enqueue(Ok(CONFIRM_INTENT))
            .enqueue(Ok(END_DATE))
            .enqueue(Ok(NO_PREDICTIONS))],
    )
    .await;

    // 11 -> 9 crosses the threshold, 9 -> 8 does not re-fire.
    harness.runtime.chat(&user(), "two paracetamol", None).await.unwrap();
    harness.runtime.chat(&user(), "yes", None).await.unwrap();
    harness.runtime.chat(&user(), "one more paracetamol", None).await.unwrap();
    harness.runtime.chat(&user(), "yes", None).await.unwrap();

    let low_stock: Vec<WebhookEvent> = harness
        .webhooks
        .events()
        .into_iter()
        .filter(|event| matches!(event, WebhookEvent::LowStock { .. }))
        .collect();
    assert_eq!(low_stock.len(), 1);
}
