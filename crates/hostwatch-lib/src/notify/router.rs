//! Alert routing
//!
//! Fans each alert out to every configured sink. Sinks run concurrently,
//! each bounded by its own timeout, and a failing or hung sink never
//! affects the others or the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use super::NotificationSink;
use crate::error::DeliveryError;
use crate::health::{components, HealthRegistry};
use crate::models::{Alert, AlertKind, Metric};
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Default upper bound on a single sink delivery
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Per-sink delivery timeout (default: 5 seconds)
    pub sink_timeout: Duration,
    /// Suppress repeats of the same alert kind and metric within this
    /// window (default: zero, every alert is dispatched)
    pub dedup_window: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            dedup_window: Duration::ZERO,
        }
    }
}

/// Outcome of dispatching one alert
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Sinks that accepted the message
    pub delivered: Vec<String>,
    /// Per-sink failures
    pub failed: Vec<DeliveryError>,
    /// Alert was a repeat inside the dedup window and was not sent
    pub suppressed: bool,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        !self.suppressed && self.failed.is_empty()
    }
}

/// Routes alerts to notification sinks
pub struct AlertRouter {
    sinks: Vec<Arc<dyn NotificationSink>>,
    config: RouterConfig,
    /// Last dispatch time per (kind, metric)
    recent: Mutex<HashMap<(AlertKind, Metric), Instant>>,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl AlertRouter {
    pub fn new(config: RouterConfig, logger: StructuredLogger) -> Self {
        Self {
            sinks: Vec::new(),
            config,
            recent: Mutex::new(HashMap::new()),
            metrics: MonitorMetrics::new(),
            logger,
            health: None,
        }
    }

    /// Add a delivery channel
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Report notifier health into the registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver an alert to every sink.
    ///
    /// Never fails: each sink error is logged, counted and returned in the
    /// report. Returns after at most one sink timeout.
    pub async fn dispatch(&self, alert: &Alert) -> DispatchReport {
        if self.should_suppress(alert) {
            debug!(kind = %alert.kind, metric = %alert.metric, "Suppressing repeated alert");
            return DispatchReport {
                suppressed: true,
                ..DispatchReport::default()
            };
        }

        let timeout = self.config.sink_timeout;
        let handles: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let name = sink.name().to_string();
                let message = alert.message.clone();
                let task_name = name.clone();
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, sink.deliver(&message)).await {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout {
                            sink: task_name,
                            after: timeout,
                        }),
                    }
                });
                (name, handle)
            })
            .collect();

        let mut report = DispatchReport::default();
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(DeliveryError::Rejected {
                    sink: name.clone(),
                    reason: format!("sink task failed: {}", join_err),
                }),
            };

            match outcome {
                Ok(()) => {
                    debug!(sink = %name, metric = %alert.metric, "Alert delivered");
                    self.metrics.inc_delivered(&name);
                    report.delivered.push(name);
                }
                Err(err) => {
                    self.logger.log_delivery_failure(&name, &err);
                    self.metrics.inc_delivery_failed(&name);
                    report.failed.push(err);
                }
            }
        }

        // Only a delivered alert opens a suppression window
        if !report.delivered.is_empty() {
            self.record(alert);
        }
        self.update_health(&report).await;
        report
    }

    fn should_suppress(&self, alert: &Alert) -> bool {
        if self.config.dedup_window.is_zero() {
            return false;
        }
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent
            .get(&(alert.kind, alert.metric))
            .map(|last| last.elapsed() < self.config.dedup_window)
            .unwrap_or(false)
    }

    fn record(&self, alert: &Alert) {
        if self.config.dedup_window.is_zero() {
            return;
        }
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.insert((alert.kind, alert.metric), Instant::now());
        recent.retain(|_, time| time.elapsed() < self.config.dedup_window);
    }

    async fn update_health(&self, report: &DispatchReport) {
        let Some(health) = &self.health else {
            return;
        };
        if report.failed.is_empty() {
            health.set_healthy(components::NOTIFIER).await;
        } else {
            let failed: Vec<&str> = report.failed.iter().map(|e| e.sink()).collect();
            health
                .set_degraded(
                    components::NOTIFIER,
                    format!("delivery failed: {}", failed.join(", ")),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::notify::testing::{FailingSink, HangingSink, PanickingSink, RecordingSink};

    fn router(config: RouterConfig) -> AlertRouter {
        AlertRouter::new(config, StructuredLogger::new("test-host"))
    }

    fn cpu_alert() -> Alert {
        Alert::threshold_breach(Metric::Cpu, 90.0, 80.0)
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_other_sinks() {
        let recording = Arc::new(RecordingSink::new("recording"));
        let router = router(RouterConfig::default())
            .with_sink(Arc::new(FailingSink::new("failing")))
            .with_sink(recording.clone());

        let alert = cpu_alert();
        let report = router.dispatch(&alert).await;

        assert_eq!(recording.messages(), vec![alert.message.clone()]);
        assert_eq!(report.delivered, vec!["recording".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].sink(), "failing");
        assert!(!report.all_delivered());
    }

    #[tokio::test]
    async fn test_hung_sink_is_cut_off() {
        let recording = Arc::new(RecordingSink::new("recording"));
        let router = router(RouterConfig {
            sink_timeout: Duration::from_millis(100),
            ..RouterConfig::default()
        })
        .with_sink(Arc::new(HangingSink::new("hanging")))
        .with_sink(recording.clone());

        let start = Instant::now();
        let report = router.dispatch(&cpu_alert()).await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(recording.messages().len(), 1);
        assert!(matches!(
            report.failed.as_slice(),
            [DeliveryError::Timeout { .. }]
        ));
    }

    #[tokio::test]
    async fn test_panicking_sink_is_isolated() {
        let recording = Arc::new(RecordingSink::new("recording"));
        let router = router(RouterConfig::default())
            .with_sink(Arc::new(PanickingSink))
            .with_sink(recording.clone());

        let report = router.dispatch(&cpu_alert()).await;

        assert_eq!(recording.messages().len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].sink(), "panicking");
    }

    #[tokio::test]
    async fn test_no_sinks_is_noop() {
        let router = router(RouterConfig::default());
        let report = router.dispatch(&cpu_alert()).await;

        assert!(report.delivered.is_empty());
        assert!(report.all_delivered());
    }

    #[tokio::test]
    async fn test_dedup_window() {
        let recording = Arc::new(RecordingSink::new("recording"));
        let router = router(RouterConfig {
            dedup_window: Duration::from_millis(100),
            ..RouterConfig::default()
        })
        .with_sink(recording.clone());

        assert!(!router.dispatch(&cpu_alert()).await.suppressed);
        assert!(router.dispatch(&cpu_alert()).await.suppressed);

        // A different metric is not a repeat
        let disk = Alert::threshold_breach(Metric::Disk, 90.0, 85.0);
        assert!(!router.dispatch(&disk).await.suppressed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!router.dispatch(&cpu_alert()).await.suppressed);

        assert_eq!(recording.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_undelivered_alert_is_not_suppressed() {
        let router = router(RouterConfig {
            dedup_window: Duration::from_secs(60),
            ..RouterConfig::default()
        })
        .with_sink(Arc::new(FailingSink::new("failing")));

        let first = router.dispatch(&cpu_alert()).await;
        assert!(first.delivered.is_empty());
        assert_eq!(first.failed.len(), 1);

        let second = router.dispatch(&cpu_alert()).await;
        assert!(!second.suppressed);
        assert_eq!(second.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_window_dispatches_every_alert() {
        let recording = Arc::new(RecordingSink::new("recording"));
        let router = router(RouterConfig::default()).with_sink(recording.clone());

        for _ in 0..3 {
            router.dispatch(&cpu_alert()).await;
        }
        assert_eq!(recording.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_notifier_health_tracks_failures() {
        let health = HealthRegistry::new();
        let router = router(RouterConfig::default())
            .with_sink(Arc::new(FailingSink::new("failing")))
            .with_health(health.clone());

        router.dispatch(&cpu_alert()).await;

        let status = health.health().await;
        let notifier = &status.components[components::NOTIFIER];
        assert_eq!(notifier.status, ComponentStatus::Degraded);
        assert!(notifier.message.as_deref().unwrap_or("").contains("failing"));
    }
}
