use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

/// Payload posted to an external endpoint. Serialized as tagged JSON so the
/// receiver can route on `event`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookEvent {
    FulfillmentRequest {
        order_id: String,
        user_id: String,
        contact_email: Option<String>,
        total: String,
        item_count: usize,
    },
    LowStock {
        medicine_id: String,
        medicine_name: String,
        stock: i64,
    },
}

impl WebhookEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FulfillmentRequest { .. } => "fulfillment_request",
            Self::LowStock { .. } => "low_stock",
        }
    }
}

/// At-most-once delivery: `dispatch` returns immediately and any transport
/// failure is logged, not surfaced. Order placement must never block on, or
/// fail because of, a webhook receiver.
pub trait WebhookSink: Send + Sync {
    fn dispatch(&self, event: WebhookEvent);
}

pub struct HttpWebhookSink {
    client: reqwest::Client,
    fulfillment_url: Option<String>,
    low_stock_url: Option<String>,
}

impl HttpWebhookSink {
    pub fn new(
        fulfillment_url: Option<String>,
        low_stock_url: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self { client, fulfillment_url, low_stock_url }
    }

    fn url_for(&self, event: &WebhookEvent) -> Option<String> {
        match event {
            WebhookEvent::FulfillmentRequest { .. } => self.fulfillment_url.clone(),
            WebhookEvent::LowStock { .. } => self.low_stock_url.clone(),
        }
    }
}

impl WebhookSink for HttpWebhookSink {
    fn dispatch(&self, event: WebhookEvent) {
        let Some(url) = self.url_for(&event) else {
            return;
        };
        let client = self.client.clone();
        let event_name = event.name();

        tokio::spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!(
                        event_name,
                        status = %response.status(),
                        "webhook endpoint returned a non-success status"
                    );
                }
                Err(error) => {
                    warn!(event_name, error = %error, "webhook delivery failed");
                }
            }
        });
    }
}

/// Discards every event. Used when no webhook URLs are configured.
#[derive(Default)]
pub struct NoopWebhookSink;

impl WebhookSink for NoopWebhookSink {
    fn dispatch(&self, _event: WebhookEvent) {}
}

/// Records dispatched events for assertions.
#[derive(Clone, Default)]
pub struct InMemoryWebhookSink {
    events: Arc<Mutex<Vec<WebhookEvent>>>,
}

impl InMemoryWebhookSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl WebhookSink for InMemoryWebhookSink {
    fn dispatch(&self, event: WebhookEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
