//! SMTP email sink
//!
//! Sends each alert as a single plain-text message over an authenticated
//! TLS session (STARTTLS on 587 by default, implicit TLS on request).

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};

use super::{async_trait, NotificationSink};
use crate::error::{ConfigError, DeliveryError};

const SINK_NAME: &str = "email";
const SUBJECT: &str = "System Alert";

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailSecurity {
    /// Plain connection upgraded with STARTTLS
    #[default]
    StartTls,
    /// TLS from the first byte
    Tls,
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_addr: String,
    pub to_addr: String,
    #[serde(default)]
    pub security: EmailSecurity,
}

fn default_smtp_port() -> u16 {
    587
}

/// Sink sending alerts by email
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSink {
    /// Create the sink, validating addresses and credentials up front
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, ConfigError> {
        if config.smtp_host.trim().is_empty() {
            return Err(ConfigError::Missing("notify.email.smtp_host"));
        }
        if config.username.is_empty() || config.password.is_empty() {
            return Err(ConfigError::Missing("notify.email credentials"));
        }

        let from = parse_mailbox(&config.from_addr)?;
        let to = parse_mailbox(&config.to_addr)?;

        let builder = match config.security {
            EmailSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            }
            EmailSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host),
        }
        .map_err(|e| ConfigError::Sink {
            sink: SINK_NAME,
            reason: e.to_string(),
        })?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, from, to })
    }

    fn compose(&self, message: &str) -> Result<Message, DeliveryError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())
            .map_err(|e| rejected(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let email = self.compose(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| rejected(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(value: &str) -> Result<Mailbox, ConfigError> {
    value.parse().map_err(|e: lettre::address::AddressError| ConfigError::InvalidAddress {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn rejected(reason: String) -> DeliveryError {
    DeliveryError::Rejected {
        sink: SINK_NAME.to_string(),
        reason,
    }
}
