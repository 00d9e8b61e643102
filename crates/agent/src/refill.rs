use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use remedi_core::domain::medicine::MedicineId;
use remedi_core::domain::notification::{Notification, NotificationKind};
use remedi_core::domain::order::Order;
use remedi_core::domain::refill::{RefillAlert, REFILL_ALERT_DAYS};
use remedi_core::domain::user::UserId;
use remedi_core::errors::ApplicationError;
use remedi_db::repositories::{NotificationRepository, OrderRepository, RefillAlertRepository};
use remedi_notify::channel::ChannelPublisher;

use crate::chain::ProviderChain;
use crate::llm::{strip_code_fences, ProviderError};
use crate::order::store_error;

/// Predicts when a user will run out of medicine from their order history and
/// raises at most one reminder per (user, medicine) until the supply recovers.
///
/// Prediction is advisory: when no provider answers, the analysis is skipped
/// rather than surfaced as an error, so a dead model never blocks an order.
pub struct RefillEngine {
    orders: Arc<dyn OrderRepository>,
    alerts: Arc<dyn RefillAlertRepository>,
    notifications: Arc<dyn NotificationRepository>,
    channels: Arc<dyn ChannelPublisher>,
    chain: ProviderChain,
}

#[derive(Debug, Deserialize)]
struct PredictionWire {
    medicine: String,
    days_left: i64,
    #[serde(default)]
    reason: String,
}

impl RefillEngine {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        alerts: Arc<dyn RefillAlertRepository>,
        notifications: Arc<dyn NotificationRepository>,
        channels: Arc<dyn ChannelPublisher>,
        chain: ProviderChain,
    ) -> Self {
        Self { orders, alerts, notifications, channels, chain }
    }

    /// Runs one prediction pass for `user_id` and returns the alerts that
    /// produced a notification in this pass.
    pub async fn analyze_and_alert(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<RefillAlert>, ApplicationError> {
        let history = self.orders.list_for_user(user_id).await.map_err(store_error)?;
        if history.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_refill_prompt(&history);
        let predictions = match self
            .chain
            .complete_parsed(&prompt, |raw| parse_predictions(raw))
            .await
        {
            Ok(predictions) => predictions,
            Err(error) => {
                warn!(user_id = %user_id.0, error = %error, "refill prediction unavailable, skipping pass");
                return Ok(Vec::new());
            }
        };

        let mut raised = Vec::new();
        for prediction in predictions {
            let Some(medicine_id) = resolve_medicine(&history, &prediction.medicine) else {
                warn!(medicine = %prediction.medicine, "prediction names a medicine absent from history");
                continue;
            };

            let existing =
                self.alerts.find(user_id, &medicine_id).await.map_err(store_error)?;

            if prediction.days_left > REFILL_ALERT_DAYS {
                // Supply recovered. Re-arm the dedup bit so the next dip can
                // alert again.
                if existing.is_some() {
                    self.alerts
                        .upsert(RefillAlert {
                            user_id: user_id.clone(),
                            medicine_id,
                            days_left: prediction.days_left,
                            notified: false,
                            updated_at: Utc::now(),
                        })
                        .await
                        .map_err(store_error)?;
                }
                continue;
            }

            if existing.as_ref().is_some_and(|alert| alert.notified) {
                continue;
            }

            let alert = RefillAlert {
                user_id: user_id.clone(),
                medicine_id,
                days_left: prediction.days_left,
                notified: true,
                updated_at: Utc::now(),
            };
            self.alerts.upsert(alert.clone()).await.map_err(store_error)?;
            self.send_reminder(user_id, &prediction).await;
            raised.push(alert);
        }

        Ok(raised)
    }

    async fn send_reminder(&self, user_id: &UserId, prediction: &PredictionWire) {
        let message = if prediction.reason.is_empty() {
            format!(
                "Your supply of {} runs out in about {} day(s). Reply \"refill\" to reorder.",
                prediction.medicine, prediction.days_left
            )
        } else {
            format!(
                "Your supply of {} runs out in about {} day(s) ({}). Reply \"refill\" to reorder.",
                prediction.medicine, prediction.days_left, prediction.reason
            )
        };

        let for_user =
            Notification::to_user(user_id.clone(), NotificationKind::RefillReminder, &message);
        let for_admin = Notification::to_admin(
            NotificationKind::RefillReminder,
            format!(
                "User {} is predicted to run out of {} in {} day(s).",
                user_id.0, prediction.medicine, prediction.days_left
            ),
        );

        for notification in [for_user, for_admin] {
            if let Err(error) = self.notifications.append(notification.clone()).await {
                warn!(error = %error, "failed to store refill reminder");
            }
            if let Err(error) = self.channels.publish(&notification).await {
                warn!(error = %error, "failed to publish refill reminder");
            }
        }
    }
}

fn parse_predictions(raw: &str) -> Result<Vec<PredictionWire>, ProviderError> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body)
        .map_err(|error| ProviderError::Malformed(format!("refill payload: {error}")))
}

fn resolve_medicine(history: &[Order], name: &str) -> Option<MedicineId> {
    history
        .iter()
        .flat_map(|order| order.items.iter())
        .find(|item| {
            item.medicine_name.trim().eq_ignore_ascii_case(name.trim())
                || item.medicine_id.0.trim().eq_ignore_ascii_case(name.trim())
        })
        .map(|item| item.medicine_id.clone())
}

fn build_refill_prompt(history: &[Order]) -> String {
    let today = Utc::now().format("%Y-%m-%d");
    let mut prompt = String::from(
        "You forecast medicine consumption for a pharmacy. Today is ",
    );
    prompt.push_str(&today.to_string());
    prompt.push_str(
        ". From the order history below, estimate for each medicine how many \
         days of supply remain, assuming the stated daily dosage. Reply with a \
         JSON array only, each element {\"medicine\": name, \"days_left\": \
         integer, \"reason\": short explanation}.\n\nOrder history:\n",
    );
    for order in history {
        for item in &order.items {
            prompt.push_str(&format!(
                "- {}: {} units at {} per day, ordered {}\n",
                item.medicine_name,
                item.quantity,
                item.dosage_per_day,
                order.created_at.format("%Y-%m-%d")
            ));
        }
    }
    prompt
}
