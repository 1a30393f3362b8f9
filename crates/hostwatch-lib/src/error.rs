//! Error taxonomy
//!
//! Startup errors (`TrainingError`, `ConfigError`) are fatal. Steady-state
//! errors (`SamplingError`, `DeliveryError`) stay inside the cycle that
//! produced them.

use std::time::Duration;

use thiserror::Error;

use crate::models::Metric;

/// Metric source could not produce a complete sample
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid {metric} reading: {value}")]
    InvalidReading { metric: Metric, value: f64 },

    #[error("no disk mounted at {0}")]
    DiskNotFound(String),

    #[error("sampling task failed: {0}")]
    Task(String),
}

/// Outlier model could not be trained
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("at least 2 training points are required, got {got}")]
    InsufficientData { got: usize },

    #[error("training point {index} is not finite")]
    NonFinite { index: usize },

    #[error("invalid detector parameter: {0}")]
    InvalidParameter(String),
}

/// A single sink failed to deliver a message
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{sink}: delivery rejected: {reason}")]
    Rejected { sink: String, reason: String },

    #[error("{sink}: unexpected status {status_code}")]
    Status { sink: String, status_code: u16 },

    #[error("{sink}: no response within {after:?}")]
    Timeout { sink: String, after: Duration },
}

impl DeliveryError {
    /// Name of the sink that failed
    pub fn sink(&self) -> &str {
        match self {
            DeliveryError::Rejected { sink, .. }
            | DeliveryError::Status { sink, .. }
            | DeliveryError::Timeout { sink, .. } => sink,
        }
    }
}

/// Invalid startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{metric} threshold must be in (0, 100], got {value}")]
    InvalidThreshold { metric: Metric, value: f64 },

    #[error("sampling interval must be greater than zero")]
    InvalidCadence,

    #[error("notification timeout must be greater than zero")]
    InvalidTimeout,

    #[error("missing or empty setting: {0}")]
    Missing(&'static str),

    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("invalid webhook url {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("failed to set up {sink} sink: {reason}")]
    Sink { sink: &'static str, reason: String },
}

/// Terminal monitoring loop error
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("metric source failed {failures} consecutive times, last error: {last}")]
    SourceUnavailable {
        failures: u32,
        #[source]
        last: SamplingError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_sink_name() {
        let err = DeliveryError::Status {
            sink: "chat".to_string(),
            status_code: 500,
        };
        assert_eq!(err.sink(), "chat");
        assert_eq!(err.to_string(), "chat: unexpected status 500");
    }

    #[test]
    fn test_monitor_error_keeps_source() {
        let err = MonitorError::SourceUnavailable {
            failures: 3,
            last: SamplingError::Unavailable("no /proc".to_string()),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("3 consecutive"));
    }
}
