use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use remedi_core::domain::confirmation::ProposedItem;
use remedi_core::domain::ledger::{InventoryLedgerEntry, LedgerReason};
use remedi_core::domain::medicine::LOW_STOCK_THRESHOLD;
use remedi_core::domain::notification::{Notification, NotificationKind};
use remedi_core::domain::order::{Order, OrderId, OrderItem, OrderStatus};
use remedi_core::domain::user::UserId;
use remedi_core::errors::{ApplicationError, DomainError};
use remedi_db::repositories::{
    LedgerRepository, MedicineRepository, NotificationRepository, OrderRepository,
    RepositoryError, UserRepository,
};
use remedi_notify::channel::ChannelPublisher;
use remedi_notify::webhook::{WebhookEvent, WebhookSink};

use crate::chain::ProviderChain;
use crate::llm::ProviderError;
use crate::refill::RefillEngine;

/// Days of supply assumed when no provider can predict an exhaustion date.
const DEFAULT_SUPPLY_DAYS: i64 = 30;

pub(crate) fn store_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::NotFound(what) => ApplicationError::NotFound(what),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

/// Commits confirmed proposals: persists the order, applies per-item inventory
/// effects, and fires the fulfillment side channel. Writes are sequential and
/// deliberately not transactional across items; a failure mid-loop leaves
/// earlier decrements applied, with the ledger as the audit trail.
pub struct OrderEngine {
    medicines: Arc<dyn MedicineRepository>,
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    ledger: Arc<dyn LedgerRepository>,
    notifications: Arc<dyn NotificationRepository>,
    chain: ProviderChain,
    webhooks: Arc<dyn WebhookSink>,
    channels: Arc<dyn ChannelPublisher>,
}

impl OrderEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        medicines: Arc<dyn MedicineRepository>,
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        ledger: Arc<dyn LedgerRepository>,
        notifications: Arc<dyn NotificationRepository>,
        chain: ProviderChain,
        webhooks: Arc<dyn WebhookSink>,
        channels: Arc<dyn ChannelPublisher>,
    ) -> Self {
        Self { medicines, orders, users, ledger, notifications, chain, webhooks, channels }
    }

    /// Places a CONFIRMED order for `items`. `total_override` is the total the
    /// user actually confirmed; when present and non-zero it wins over the
    /// recomputed sum so a catalog price move between proposal and
    /// confirmation cannot change what the user agreed to pay.
    pub async fn process_order(
        &self,
        user_id: &UserId,
        items: &[ProposedItem],
        total_override: Option<Decimal>,
    ) -> Result<OrderId, ApplicationError> {
        if items.is_empty() {
            return Err(DomainError::InvariantViolation(
                "order item list is empty".to_string(),
            )
            .into());
        }

        let order_items: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                medicine_id: item.medicine_id.clone(),
                medicine_name: item.medicine_name.clone(),
                quantity: item.quantity,
                dosage_per_day: item.dosage_per_day,
                unit_price: item.unit_price,
            })
            .collect();

        let computed: Decimal = order_items.iter().map(OrderItem::line_total).sum();
        let total = match total_override {
            Some(total) if !total.is_zero() => total,
            _ => computed,
        };

        let estimated_end_date = self.predict_end_date(&order_items).await;
        let order = Order {
            id: OrderId(Uuid::new_v4().to_string()),
            user_id: user_id.clone(),
            items: order_items,
            total_amount: total,
            status: OrderStatus::Confirmed,
            estimated_end_date,
            finalized_at: None,
            created_at: Utc::now(),
        };
        let order_id = order.id.clone();

        self.orders.save(order.clone()).await.map_err(store_error)?;
        self.apply_inventory_effects(&order, LedgerReason::OrderPlaced).await?;
        self.dispatch_fulfillment(&order).await;
        self.notify_user(
            user_id,
            NotificationKind::OrderPlaced,
            format!(
                "Order {} placed: {} item(s), total {}.",
                order_id.0,
                order.items.len(),
                order.total_amount
            ),
        )
        .await;

        Ok(order_id)
    }

    /// Fulfillment entry point. Moves the order into the warehouse, repeats
    /// the end-date prediction and inventory effects, then runs the refill
    /// analysis and fans out notifications. The
    /// `finalized_at` stamp makes a repeat call (e.g. a retried partner
    /// webhook) fail fast instead of double-decrementing stock.
    pub async fn finalize_order(
        &self,
        order_id: &OrderId,
        refill: &RefillEngine,
    ) -> Result<(), ApplicationError> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ApplicationError::NotFound(format!("order {}", order_id.0)))?;

        if order.finalized_at.is_some() {
            return Err(DomainError::AlreadyFinalized(order.id).into());
        }

        order.transition_to(OrderStatus::InWarehouse)?;
        order.estimated_end_date = self.predict_end_date(&order.items).await;
        order.finalized_at = Some(Utc::now());
        // Stamp before side effects: a crash mid-effects must not make the
        // order finalizable again.
        self.orders.save(order.clone()).await.map_err(store_error)?;

        self.apply_inventory_effects(&order, LedgerReason::OrderFulfilled).await?;

        if let Err(error) = refill.analyze_and_alert(&order.user_id).await {
            warn!(order_id = %order.id.0, error = %error, "refill analysis after finalize failed");
        }

        self.notify_user(
            &order.user_id,
            NotificationKind::OrderFinalized,
            format!("Order {} has been handed to fulfillment.", order.id.0),
        )
        .await;
        let admin = Notification::to_admin(
            NotificationKind::OrderFinalized,
            format!("Order {} finalized for user {}.", order.id.0, order.user_id.0),
        );
        if let Err(error) = self.notifications.append(admin.clone()).await {
            warn!(error = %error, "failed to store finalize notification");
        }
        if let Err(error) = self.channels.publish(&admin).await {
            warn!(error = %error, "failed to publish finalize notification");
        }

        Ok(())
    }

    /// Per-item stock decrement, ledger append, and threshold-crossing
    /// webhook. Failures here do not roll back earlier iterations.
    async fn apply_inventory_effects(
        &self,
        order: &Order,
        reason: LedgerReason,
    ) -> Result<(), ApplicationError> {
        for item in &order.items {
            let post = self
                .medicines
                .decrement_stock(&item.medicine_id, item.quantity)
                .await
                .map_err(store_error)?;
            self.ledger
                .append(InventoryLedgerEntry::new(
                    item.medicine_id.clone(),
                    -i64::from(item.quantity),
                    reason,
                ))
                .await
                .map_err(store_error)?;

            if post >= LOW_STOCK_THRESHOLD {
                continue;
            }
            let Some(medicine) =
                self.medicines.find_by_id(&item.medicine_id).await.map_err(store_error)?
            else {
                continue;
            };
            if medicine.low_stock_notified {
                continue;
            }

            self.webhooks.dispatch(WebhookEvent::LowStock {
                medicine_id: medicine.id.0.clone(),
                medicine_name: medicine.name.clone(),
                stock: post,
            });
            self.medicines
                .set_low_stock_notified(&medicine.id, true)
                .await
                .map_err(store_error)?;
            let admin = Notification::to_admin(
                NotificationKind::LowStock,
                format!("{} is low on stock ({} left).", medicine.name, post),
            );
            if let Err(error) = self.notifications.append(admin.clone()).await {
                warn!(error = %error, "failed to store low-stock notification");
            }
            if let Err(error) = self.channels.publish(&admin).await {
                warn!(error = %error, "failed to publish low-stock notification");
            }
        }
        Ok(())
    }

    async fn dispatch_fulfillment(&self, order: &Order) {
        let contact_email = match self.users.find_by_id(&order.user_id).await {
            Ok(user) => user.map(|user| user.email),
            Err(error) => {
                warn!(user_id = %order.user_id.0, error = %error, "user lookup for fulfillment failed");
                None
            }
        };
        self.webhooks.dispatch(WebhookEvent::FulfillmentRequest {
            order_id: order.id.0.clone(),
            user_id: order.user_id.0.clone(),
            contact_email,
            total: order.total_amount.to_string(),
            item_count: order.items.len(),
        });
    }

    async fn notify_user(&self, user_id: &UserId, kind: NotificationKind, message: String) {
        let notification = Notification::to_user(user_id.clone(), kind, message);
        if let Err(error) = self.notifications.append(notification.clone()).await {
            warn!(error = %error, "failed to store notification");
        }
        if let Err(error) = self.channels.publish(&notification).await {
            warn!(error = %error, "failed to publish notification");
        }
    }

    /// Asks the chain for the date the supply runs out. Any failure, or an
    /// unparsable reply, falls back to a flat thirty-day estimate.
    async fn predict_end_date(&self, items: &[OrderItem]) -> DateTime<Utc> {
        let prompt = build_end_date_prompt(items);
        match self.chain.complete_parsed(&prompt, |raw| parse_date(raw)).await {
            Ok(date) => date,
            Err(error) => {
                warn!(error = %error, "end-date prediction failed, using default window");
                Utc::now() + Duration::days(DEFAULT_SUPPLY_DAYS)
            }
        }
    }
}

fn build_end_date_prompt(items: &[OrderItem]) -> String {
    let today = Utc::now().format("%Y-%m-%d");
    let mut prompt = format!(
        "Today is {today}. Given the quantities and daily dosages below, on \
         which date will the supply run out? Reply with a single date in \
         YYYY-MM-DD format and nothing else.\n\n"
    );
    for item in items {
        prompt.push_str(&format!(
            "- {}: {} units, {} per day\n",
            item.medicine_name, item.quantity, item.dosage_per_day
        ));
    }
    prompt
}

/// Scans the reply for the first YYYY-MM-DD token, tolerating models that
/// wrap the date in prose.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    for token in raw.split(|c: char| c.is_whitespace() || c == '`' || c == '"') {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit());
        if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            return Ok(DateTime::from_naive_utc_and_offset(
                date.and_time(NaiveTime::MIN),
                Utc,
            ));
        }
    }
    Err(ProviderError::Malformed(format!("no YYYY-MM-DD date in reply {raw:?}")))
}
