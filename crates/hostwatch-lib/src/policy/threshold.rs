//! Threshold breach evaluation
//!
//! Each metric is compared against its own limit independently; a breach
//! requires the value to be strictly above the limit.

use serde::Serialize;

use crate::error::ConfigError;
use crate::models::{Alert, Metric, Sample};

/// Default CPU limit in percent
pub const DEFAULT_CPU_LIMIT: f64 = 80.0;
/// Default memory limit in percent
pub const DEFAULT_MEMORY_LIMIT: f64 = 75.0;
/// Default disk limit in percent
pub const DEFAULT_DISK_LIMIT: f64 = 85.0;

/// Static utilization limits, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdConfig {
    cpu_limit: f64,
    memory_limit: f64,
    disk_limit: f64,
}

impl ThresholdConfig {
    /// Create limits; each must be in (0, 100]
    pub fn new(cpu_limit: f64, memory_limit: f64, disk_limit: f64) -> Result<Self, ConfigError> {
        for (metric, value) in [
            (Metric::Cpu, cpu_limit),
            (Metric::Memory, memory_limit),
            (Metric::Disk, disk_limit),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigError::InvalidThreshold { metric, value });
            }
        }

        Ok(Self {
            cpu_limit,
            memory_limit,
            disk_limit,
        })
    }

    /// Limit configured for a metric
    pub fn limit(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_limit,
            Metric::Memory => self.memory_limit,
            Metric::Disk => self.disk_limit,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_limit: DEFAULT_CPU_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            disk_limit: DEFAULT_DISK_LIMIT,
        }
    }
}

/// Evaluate a sample against the limits.
///
/// Returns one `ThresholdBreach` alert per breached metric, in the order
/// CPU, memory, disk.
pub fn evaluate(sample: &Sample, config: &ThresholdConfig) -> Vec<Alert> {
    Metric::ALL
        .iter()
        .filter_map(|&metric| {
            let value = sample.value(metric);
            let limit = config.limit(metric);
            (value > limit).then(|| Alert::threshold_breach(metric, value, limit))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertKind;
    use chrono::Utc;

    fn sample(cpu: f64, memory: f64, disk: f64) -> Sample {
        Sample::new(cpu, memory, disk, Utc::now()).unwrap()
    }

    fn count_for(alerts: &[Alert], metric: Metric) -> usize {
        alerts
            .iter()
            .filter(|a| a.metric == metric && a.kind == AlertKind::ThresholdBreach)
            .count()
    }

    #[test]
    fn test_single_breach_per_metric() {
        let config = ThresholdConfig::default();

        let alerts = evaluate(&sample(90.0, 50.0, 50.0), &config);
        assert_eq!(alerts.len(), 1);
        assert_eq!(count_for(&alerts, Metric::Cpu), 1);

        let alerts = evaluate(&sample(10.0, 75.1, 50.0), &config);
        assert_eq!(alerts.len(), 1);
        assert_eq!(count_for(&alerts, Metric::Memory), 1);

        let alerts = evaluate(&sample(10.0, 10.0, 99.0), &config);
        assert_eq!(alerts.len(), 1);
        assert_eq!(count_for(&alerts, Metric::Disk), 1);
    }

    #[test]
    fn test_at_or_below_limits_is_empty() {
        let config = ThresholdConfig::default();

        assert!(evaluate(&sample(80.0, 75.0, 85.0), &config).is_empty());
        assert!(evaluate(&sample(0.0, 0.0, 0.0), &config).is_empty());
        assert!(evaluate(&sample(79.9, 74.9, 84.9), &config).is_empty());
    }

    #[test]
    fn test_breaches_are_independent() {
        let config = ThresholdConfig::default();
        let alerts = evaluate(&sample(95.0, 95.0, 95.0), &config);

        assert_eq!(alerts.len(), 3);
        let order: Vec<Metric> = alerts.iter().map(|a| a.metric).collect();
        assert_eq!(order, vec![Metric::Cpu, Metric::Memory, Metric::Disk]);

        // Memory breach looks the same whether or not the others breach
        let alone = evaluate(&sample(0.0, 95.0, 0.0), &config);
        assert_eq!(alone[0], alerts[1]);
    }

    #[test]
    fn test_breach_carries_limit() {
        let config = ThresholdConfig::new(50.0, 60.0, 70.0).unwrap();
        let alerts = evaluate(&sample(55.0, 10.0, 10.0), &config);

        assert_eq!(alerts[0].value, 55.0);
        assert_eq!(alerts[0].limit_or_context, Some(50.0));
        assert!(alerts[0].message.contains("Exceeds threshold of 50.0%"));
    }

    #[test]
    fn test_limits_validated() {
        assert!(ThresholdConfig::new(100.0, 0.1, 50.0).is_ok());
        assert!(matches!(
            ThresholdConfig::new(0.0, 75.0, 85.0),
            Err(ConfigError::InvalidThreshold {
                metric: Metric::Cpu,
                ..
            })
        ));
        assert!(ThresholdConfig::new(80.0, 100.5, 85.0).is_err());
        assert!(ThresholdConfig::new(80.0, 75.0, f64::NAN).is_err());
    }
}
