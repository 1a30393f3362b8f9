//! Stub sinks shared by router and loop tests

use std::sync::Mutex;
use std::time::Duration;

use super::{async_trait, NotificationSink};
use crate::error::DeliveryError;

/// Records every delivered message
pub(crate) struct RecordingSink {
    name: String,
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Rejects every message
pub(crate) struct FailingSink {
    name: String,
}

impl FailingSink {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected {
            sink: self.name.clone(),
            reason: "authentication failed".to_string(),
        })
    }
}

/// Never answers within any reasonable timeout
pub(crate) struct HangingSink {
    name: String,
}

impl HangingSink {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl NotificationSink for HangingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Panics inside delivery
pub(crate) struct PanickingSink;

#[async_trait]
impl NotificationSink for PanickingSink {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        panic!("sink bug");
    }
}
