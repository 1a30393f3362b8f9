//! Sample-evaluate-route loop
//!
//! Each cycle reads one sample, evaluates the static thresholds and the
//! CPU outlier model, dispatches the merged alerts (threshold alerts
//! first, anomaly last) concurrently, publishes the sample and sleeps for
//! the cadence. A cycle waits at most one sink timeout for its alerts.
//! The stop signal is checked at the top of every cycle and raced against
//! the sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use super::LatestSample;
use crate::anomaly::DetectorModel;
use crate::collector::MetricSource;
use crate::error::{MonitorError, SamplingError};
use crate::health::{components, HealthRegistry};
use crate::models::{Alert, Metric, Sample};
use crate::notify::{AlertRouter, DispatchReport};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::policy::{self, ThresholdConfig};

/// Default pause between cycles
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(5);

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Sleep between cycles (default: 5 seconds)
    pub cadence: Duration,
    /// Stop the loop after this many consecutive failed reads
    /// (default: never)
    pub max_consecutive_failures: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cadence: DEFAULT_CADENCE,
            max_consecutive_failures: None,
        }
    }
}

/// Result of one successful cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub sample: Sample,
    pub alerts: Vec<Alert>,
    pub reports: Vec<DispatchReport>,
}

/// Totals reported when the loop stops cleanly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub sampling_failures: u64,
    /// Alerts handed to the sinks; repeats suppressed by the router are
    /// not counted
    pub alerts_dispatched: u64,
}

/// The monitoring loop
pub struct MonitorLoop {
    source: Arc<dyn MetricSource>,
    model: Arc<DetectorModel>,
    thresholds: ThresholdConfig,
    router: Arc<AlertRouter>,
    latest: LatestSample,
    config: LoopConfig,
    health: HealthRegistry,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl MonitorLoop {
    /// Run until the shutdown signal fires (or its sender is dropped).
    ///
    /// Returns an error only when the metric source keeps failing past the
    /// configured limit.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<LoopSummary, MonitorError> {
        info!(
            cadence_secs = self.config.cadence.as_secs_f64(),
            "Starting monitoring loop"
        );

        let mut summary = LoopSummary::default();
        let mut consecutive_failures = 0u32;

        loop {
            if stop_requested(&mut shutdown) {
                info!("Shutdown requested before cycle start");
                break;
            }

            match self.run_cycle().await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    summary.cycles += 1;
                    summary.alerts_dispatched +=
                        outcome.reports.iter().filter(|r| !r.suppressed).count() as u64;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    summary.sampling_failures += 1;
                    warn!(
                        error = %err,
                        consecutive_failures,
                        "Sampling failed, skipping cycle"
                    );
                    self.metrics.inc_sampling_errors();

                    if let Some(limit) = self.config.max_consecutive_failures {
                        if consecutive_failures >= limit {
                            self.health
                                .set_unhealthy(components::SAMPLER, err.to_string())
                                .await;
                            return Err(MonitorError::SourceUnavailable {
                                failures: consecutive_failures,
                                last: err,
                            });
                        }
                    }
                    self.health
                        .set_degraded(components::SAMPLER, err.to_string())
                        .await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.cadence) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down monitoring loop");
                    break;
                }
            }
        }

        info!(
            cycles = summary.cycles,
            sampling_failures = summary.sampling_failures,
            alerts = summary.alerts_dispatched,
            "Monitoring loop stopped"
        );
        Ok(summary)
    }

    /// Run a single cycle without sleeping
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SamplingError> {
        let start = Instant::now();

        let sample = self.source.read().await?;
        self.logger.log_sample(&sample);
        self.metrics.record_sample(&sample);

        let alerts = self.evaluate(&sample);

        for alert in &alerts {
            self.logger.log_alert(alert);
            self.metrics.inc_alerts(alert);
        }
        let reports = self.dispatch_all(&alerts).await;

        self.latest.publish(sample);
        self.health.set_healthy(components::SAMPLER).await;
        self.health.set_ready(true).await;

        let elapsed = start.elapsed();
        self.metrics.observe_cycle_latency(elapsed.as_secs_f64());
        debug!(
            alerts = alerts.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Cycle complete"
        );

        Ok(CycleOutcome {
            sample,
            alerts,
            reports,
        })
    }

    /// Dispatch every alert at once; reports keep the alert order
    async fn dispatch_all(&self, alerts: &[Alert]) -> Vec<DispatchReport> {
        let handles: Vec<_> = alerts
            .iter()
            .cloned()
            .map(|alert| {
                let router = Arc::clone(&self.router);
                tokio::spawn(async move { router.dispatch(&alert).await })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(error = %e, "Alert dispatch task failed");
                    reports.push(DispatchReport::default());
                }
            }
        }
        reports
    }

    /// Threshold breaches first, then the CPU anomaly alert if any
    fn evaluate(&self, sample: &Sample) -> Vec<Alert> {
        let mut alerts = policy::evaluate(sample, &self.thresholds);

        let cpu = sample.cpu_percent;
        if self.model.score(cpu).is_anomalous() {
            alerts.push(Alert::anomaly(
                Metric::Cpu,
                cpu,
                self.model.anomaly_score(cpu),
            ));
        }

        alerts
    }

    pub fn latest(&self) -> LatestSample {
        self.latest.clone()
    }
}

fn stop_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

/// Builder for creating the monitoring loop
pub struct MonitorLoopBuilder {
    source: Option<Arc<dyn MetricSource>>,
    model: Option<Arc<DetectorModel>>,
    router: Option<Arc<AlertRouter>>,
    thresholds: ThresholdConfig,
    latest: LatestSample,
    config: LoopConfig,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl MonitorLoopBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            model: None,
            router: None,
            thresholds: ThresholdConfig::default(),
            latest: LatestSample::new(),
            config: LoopConfig::default(),
            health: HealthRegistry::new(),
            logger: StructuredLogger::new("unknown"),
        }
    }

    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn model(mut self, model: Arc<DetectorModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn router(mut self, router: Arc<AlertRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Slot the loop publishes into; share it with the snapshot server
    pub fn latest(mut self, latest: LatestSample) -> Self {
        self.latest = latest;
        self
    }

    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.config.cadence = cadence;
        self
    }

    pub fn max_consecutive_failures(mut self, limit: Option<u32>) -> Self {
        self.config.max_consecutive_failures = limit;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<MonitorLoop> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metric source is required"))?;
        let model = self
            .model
            .ok_or_else(|| anyhow::anyhow!("Detector model is required"))?;
        let router = self
            .router
            .ok_or_else(|| anyhow::anyhow!("Alert router is required"))?;

        if self.config.cadence.is_zero() {
            anyhow::bail!("Cadence must be greater than zero");
        }

        Ok(MonitorLoop {
            source,
            model,
            thresholds: self.thresholds,
            router,
            latest: self.latest,
            config: self.config,
            health: self.health,
            metrics: MonitorMetrics::new(),
            logger: self.logger,
        })
    }
}

impl Default for MonitorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
