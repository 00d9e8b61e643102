//! Outbound delivery seams for the ordering pipeline:
//! - **Webhooks** (`webhook`) - fire-and-forget HTTP posts to fulfillment and
//!   inventory endpoints
//! - **Channels** (`channel`) - user- and admin-facing message delivery
//!
//! Both seams are trait-shaped so the agent runtime stays testable without a
//! network. Delivery is at-most-once by design: a failed post is logged and
//! dropped, never retried, and never fails the order that triggered it.

pub mod channel;
pub mod webhook;

pub use channel::{ChannelPublisher, InMemoryChannelPublisher, LoggingChannelPublisher};
pub use webhook::{HttpWebhookSink, InMemoryWebhookSink, NoopWebhookSink, WebhookEvent, WebhookSink};
