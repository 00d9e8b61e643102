//! JSON chat surface.
//!
//! - `POST /chat`      — run one pipeline turn for a user message
//! - `GET  /decisions` — inspect the per-stage decision trail

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use remedi_agent::runtime::{ChatResponse, ChatRuntime};
use remedi_core::audit::DecisionEvent;
use remedi_core::domain::user::UserId;
use remedi_core::errors::InterfaceError;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<ChatRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub correlation_id: String,
}

pub fn router(runtime: Arc<ChatRuntime>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/decisions", get(decisions))
        .with_state(ApiState { runtime })
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let user_id = UserId(request.user_id);

    match state.runtime.chat(&user_id, &request.message, None).await {
        Ok(response) => {
            info!(
                event_name = "system.api.chat",
                user_id = %user_id.0,
                correlation_id,
                workflow_status = ?response.workflow_status,
                "chat turn completed"
            );
            Ok(Json(response))
        }
        Err(application_error) => {
            error!(
                event_name = "system.api.chat_failed",
                user_id = %user_id.0,
                correlation_id,
                error = %application_error,
                "chat turn failed"
            );
            let interface = application_error.into_interface(correlation_id.clone());
            let status = match &interface {
                InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ErrorResponse { error: interface.user_message(), correlation_id }),
            ))
        }
    }
}

pub async fn decisions(State(state): State<ApiState>) -> Json<Vec<DecisionEvent>> {
    Json(state.runtime.decision_log().events())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use remedi_agent::chain::ProviderChain;
    use remedi_agent::intent::IntentResolver;
    use remedi_agent::llm::{CompletionProvider, ScriptedProvider};
    use remedi_agent::order::OrderEngine;
    use remedi_agent::refill::RefillEngine;
    use remedi_agent::runtime::ChatRuntime;
    use remedi_core::audit::InMemoryDecisionLog;
    use remedi_core::domain::medicine::{Medicine, MedicineId};
    use remedi_core::safety::SafetyValidator;
    use remedi_db::repositories::{
        InMemoryConfirmationRepository, InMemoryLedgerRepository, InMemoryMedicineRepository,
        InMemoryNotificationRepository, InMemoryOrderRepository, InMemoryPrescriptionRepository,
        InMemoryRefillAlertRepository, InMemoryUserRepository,
    };
    use remedi_notify::channel::InMemoryChannelPublisher;
    use remedi_notify::webhook::InMemoryWebhookSink;

    use crate::api::router;

    async fn scripted_runtime(provider: ScriptedProvider) -> ChatRuntime {
        let catalog = vec![Medicine {
            id: MedicineId("med-paracetamol".to_string()),
            name: "Paracetamol".to_string(),
            unit_price: Decimal::new(250, 2),
            stock: 50,
            requires_prescription: false,
            default_dosage_per_day: 3,
            low_stock_notified: false,
        }];
        let medicines = Arc::new(InMemoryMedicineRepository::with_catalog(catalog).await);
        let orders = Arc::new(InMemoryOrderRepository::default());
        let notifications = Arc::new(InMemoryNotificationRepository::default());
        let channels = Arc::new(InMemoryChannelPublisher::new());
        let chain =
            ProviderChain::new(vec![Arc::new(provider) as Arc<dyn CompletionProvider>]);

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

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn chat_endpoint_returns_the_pipeline_response() {
        let runtime = scripted_runtime(ScriptedProvider::new("primary").enqueue(Ok(
            "{\"intent\": \"GENERAL_QUERY\", \"answer\": \"We are open around the clock.\", \
             \"language\": \"English\"}",
        )))
        .await;
        let app = router(Arc::new(runtime));

        let response = app
            .oneshot(chat_request(r#"{"user_id": "user-1", "message": "when are you open?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["workflow_status"], "COMPLETED_CONVERSATION");
        assert_eq!(payload["answer"], "We are open around the clock.");
    }

    #[tokio::test]
    async fn decisions_endpoint_exposes_the_trail() {
        let runtime = scripted_runtime(ScriptedProvider::new("primary").enqueue(Ok(
            "{\"intent\": \"GENERAL_QUERY\", \"answer\": \"Hi.\", \"language\": \"English\"}",
        )))
        .await;
        let app = router(Arc::new(runtime));

        app.clone()
            .oneshot(chat_request(r#"{"user_id": "user-1", "message": "hi"}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/decisions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let events: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(events.as_array().map(Vec::len), Some(1));
        assert_eq!(events[0]["stage"], "Intent");
    }
}
