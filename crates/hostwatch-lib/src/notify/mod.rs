//! Alert notification
//!
//! This module provides:
//! - The [`NotificationSink`] abstraction over delivery channels
//! - An SMTP email sink and a chat webhook sink
//! - The [`AlertRouter`] that fans alerts out to every sink with
//!   per-sink timeouts and failure isolation

mod chat;
mod email;
mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatWebhookConfig, ChatWebhookSink};
pub use email::{EmailConfig, EmailSecurity, EmailSink};
pub use router::{AlertRouter, DispatchReport, RouterConfig, DEFAULT_SINK_TIMEOUT};

use crate::error::DeliveryError;

pub use async_trait::async_trait;

/// A notification delivery channel
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    /// Deliver one plain-text message
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}
