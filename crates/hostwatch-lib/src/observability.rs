//! Observability infrastructure for the host monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, sampling errors, alerts, deliveries, current usage)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{Alert, Metric, Sample};

/// Histogram buckets for cycle latency (in seconds). A cycle includes the
/// CPU settle window, so buckets start around one second.
const CYCLE_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 1.1, 1.25, 1.5, 2.0, 3.0, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_latency_seconds: Histogram,
    samples_collected: IntCounter,
    sampling_errors: IntCounter,
    alerts_dispatched: IntCounterVec,
    deliveries: IntCounterVec,
    usage_percent: GaugeVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "hostwatch_cycle_latency_seconds",
                "Time spent on one sample-evaluate-route cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            samples_collected: register_int_counter!(
                "hostwatch_samples_collected_total",
                "Total number of host samples collected"
            )
            .expect("Failed to register samples_collected"),

            sampling_errors: register_int_counter!(
                "hostwatch_sampling_errors_total",
                "Total number of failed sample reads"
            )
            .expect("Failed to register sampling_errors"),

            alerts_dispatched: register_int_counter_vec!(
                "hostwatch_alerts_dispatched_total",
                "Total number of alerts handed to the router",
                &["kind", "metric"]
            )
            .expect("Failed to register alerts_dispatched"),

            deliveries: register_int_counter_vec!(
                "hostwatch_deliveries_total",
                "Notification delivery attempts by sink and outcome",
                &["sink", "outcome"]
            )
            .expect("Failed to register deliveries"),

            usage_percent: register_gauge_vec!(
                "hostwatch_usage_percent",
                "Most recent utilization reading",
                &["metric"]
            )
            .expect("Failed to register usage_percent"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    /// Record a completed cycle's latency
    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    /// Record a successful sample and update the usage gauges
    pub fn record_sample(&self, sample: &Sample) {
        let inner = self.inner();
        inner.samples_collected.inc();
        for metric in Metric::ALL {
            inner
                .usage_percent
                .with_label_values(&[metric.to_string().as_str()])
                .set(sample.value(metric));
        }
    }

    pub fn inc_sampling_errors(&self) {
        self.inner().sampling_errors.inc();
    }

    pub fn inc_alerts(&self, alert: &Alert) {
        self.inner()
            .alerts_dispatched
            .with_label_values(&[
                alert.kind.to_string().as_str(),
                alert.metric.to_string().as_str(),
            ])
            .inc();
    }

    pub fn inc_delivered(&self, sink: &str) {
        self.inner()
            .deliveries
            .with_label_values(&[sink, "delivered"])
            .inc();
    }

    pub fn inc_delivery_failed(&self, sink: &str) {
        self.inner()
            .deliveries
            .with_label_values(&[sink, "failed"])
            .inc();
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for samples, alerts,
/// delivery failures and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Log one collected sample
    pub fn log_sample(&self, sample: &Sample) {
        info!(
            event = "sample_collected",
            host = %self.host_name,
            cpu_percent = sample.cpu_percent,
            memory_percent = sample.memory_percent,
            disk_percent = sample.disk_percent,
            captured_at = %sample.captured_at.to_rfc3339(),
            "CPU Usage: {:.1}% | Memory Usage: {:.1}% | Disk Usage: {:.1}%",
            sample.cpu_percent,
            sample.memory_percent,
            sample.disk_percent
        );
    }

    /// Log an alert raised during a cycle
    pub fn log_alert(&self, alert: &Alert) {
        warn!(
            event = "alert_raised",
            host = %self.host_name,
            kind = %alert.kind,
            metric = %alert.metric,
            value = alert.value,
            limit_or_context = ?alert.limit_or_context,
            "{}",
            alert.message
        );
    }

    /// Log a failed delivery to a single sink
    pub fn log_delivery_failure(&self, sink: &str, error: &dyn std::error::Error) {
        warn!(
            event = "delivery_failed",
            host = %self.host_name,
            sink = %sink,
            error = %error,
            "Notification delivery failed"
        );
    }

    /// Log outlier model training
    pub fn log_model_trained(&self, points: usize, trees: usize, threshold: f64) {
        info!(
            event = "model_trained",
            host = %self.host_name,
            points = points,
            trees = trees,
            threshold = threshold,
            "Outlier model trained"
        );
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "monitor_started",
            host = %self.host_name,
            version = %version,
            "Host monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Host monitor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_monitor_metrics_recording() {
        let metrics = MonitorMetrics::new();
        let sample = Sample::new(10.0, 20.0, 30.0, Utc::now()).unwrap();

        metrics.observe_cycle_latency(1.02);
        metrics.record_sample(&sample);
        metrics.inc_sampling_errors();
        metrics.inc_alerts(&Alert::threshold_breach(Metric::Disk, 90.0, 85.0));
        metrics.inc_delivered("chat");
        metrics.inc_delivery_failed("email");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "hostwatch_usage_percent"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host_name(), "test-host");
    }
}
