//! Chat webhook sink
//!
//! Posts `{"text": message}` to an incoming-webhook URL (Slack and
//! compatible chat services).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{async_trait, NotificationSink};
use crate::error::{ConfigError, DeliveryError};

const SINK_NAME: &str = "chat";

/// Chat webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatWebhookConfig {
    pub webhook_url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Sink posting messages to a chat webhook
pub struct ChatWebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl ChatWebhookSink {
    /// Create the sink; the URL must be an absolute http(s) URL
    pub fn new(config: &ChatWebhookConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let url = Url::parse(&config.webhook_url).map_err(|e| ConfigError::InvalidUrl {
            value: config.webhook_url.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                value: config.webhook_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Sink {
                sink: SINK_NAME,
                reason: e.to_string(),
            })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for ChatWebhookSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookPayload { text: message })
            .send()
            .await
            .map_err(|e| DeliveryError::Rejected {
                sink: SINK_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                sink: SINK_NAME.to_string(),
                status_code: status.as_u16(),
            });
        }

        Ok(())
    }
}
