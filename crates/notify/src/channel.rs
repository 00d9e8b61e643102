use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use remedi_core::domain::notification::{Notification, Recipient};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("delivery failure: {0}")]
    Delivery(String),
}

/// Delivery seam for user- and admin-facing messages. Implementations decide
/// the transport; callers only pick the recipient.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), PublishError>;
}

/// Writes each message to the structured log. The default channel until a
/// real messaging transport is wired in.
#[derive(Default)]
pub struct LoggingChannelPublisher;

#[async_trait]
impl ChannelPublisher for LoggingChannelPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        match &notification.recipient {
            Recipient::User(user_id) => info!(
                notification_id = %notification.id,
                kind = notification.kind.as_str(),
                user_id = %user_id.0,
                message = %notification.message,
                "user notification"
            ),
            Recipient::Admin => info!(
                notification_id = %notification.id,
                kind = notification.kind.as_str(),
                message = %notification.message,
                "admin notification"
            ),
        }
        Ok(())
    }
}

/// Records published messages for assertions.
#[derive(Clone, Default)]
pub struct InMemoryChannelPublisher {
    published: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryChannelPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Notification> {
        match self.published.lock() {
            Ok(published) => published.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ChannelPublisher for InMemoryChannelPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        match self.published.lock() {
            Ok(mut published) => published.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use remedi_core::domain::notification::{Notification, NotificationKind};
    use remedi_core::domain::user::UserId;

    use super::{ChannelPublisher, InMemoryChannelPublisher, LoggingChannelPublisher};

    #[tokio::test]
    async fn in_memory_publisher_records_messages() {
        let publisher = InMemoryChannelPublisher::new();
        let notification = Notification::to_user(
            UserId("u-1".to_string()),
            NotificationKind::OrderPlaced,
            "Your order is confirmed.".to_string(),
        );

        publisher.publish(&notification).await.expect("publish");

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message, "Your order is confirmed.");
    }

    #[tokio::test]
    async fn logging_publisher_accepts_admin_messages() {
        let publisher = LoggingChannelPublisher;
        let notification = Notification::to_admin(
            NotificationKind::LowStock,
            "Paracetamol stock is low.".to_string(),
        );
        publisher.publish(&notification).await.expect("publish");
    }
}
