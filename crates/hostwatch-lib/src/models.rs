//! Core data models for host monitoring

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// Monitored host resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl Metric {
    /// All metrics in evaluation order
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Memory, Metric::Disk];

    /// Human-readable label used in alert messages
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::Memory => "Memory",
            Metric::Disk => "Disk",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cpu => write!(f, "cpu"),
            Metric::Memory => write!(f, "memory"),
            Metric::Disk => write!(f, "disk"),
        }
    }
}

/// One synchronized reading of host utilization.
///
/// Values are percentages in `[0, 100]`. A sample can only be built through
/// [`Sample::new`], so a partially valid reading never exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    /// Build a sample, rejecting non-finite or out-of-range values
    pub fn new(
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, SamplingError> {
        for (metric, value) in [
            (Metric::Cpu, cpu_percent),
            (Metric::Memory, memory_percent),
            (Metric::Disk, disk_percent),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(SamplingError::InvalidReading { metric, value });
            }
        }

        Ok(Self {
            cpu_percent,
            memory_percent,
            disk_percent,
            captured_at,
        })
    }

    /// Value of a single metric
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
            Metric::Disk => self.disk_percent,
        }
    }
}

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ThresholdBreach,
    AnomalyDetected,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::ThresholdBreach => write!(f, "threshold_breach"),
            AlertKind::AnomalyDetected => write!(f, "anomaly_detected"),
        }
    }
}

/// Alert produced by threshold evaluation or the outlier model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub metric: Metric,
    /// Observed value that triggered the alert
    pub value: f64,
    /// Breached limit for threshold alerts, anomaly score for anomalies
    pub limit_or_context: Option<f64>,
    pub message: String,
}

impl Alert {
    /// Alert for a value strictly above its configured limit
    pub fn threshold_breach(metric: Metric, value: f64, limit: f64) -> Self {
        Self {
            kind: AlertKind::ThresholdBreach,
            metric,
            value,
            limit_or_context: Some(limit),
            message: format!(
                "Alert: {} usage is {:.1}% (Exceeds threshold of {:.1}%)",
                metric.label(),
                value,
                limit
            ),
        }
    }

    /// Alert for a value the outlier model scored as anomalous
    pub fn anomaly(metric: Metric, value: f64, score: f64) -> Self {
        Self {
            kind: AlertKind::AnomalyDetected,
            metric,
            value,
            limit_or_context: Some(score),
            message: format!(
                "Anomaly detected in {} usage: {:.1}%",
                metric.label(),
                value
            ),
        }
    }
}
