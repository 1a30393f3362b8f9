//! Hostwatch - host resource monitor
//!
//! Samples CPU, memory and disk utilization on a fixed cadence, alerts on
//! static threshold breaches and CPU outliers, and serves the latest
//! sample over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use hostwatch_lib::{
    anomaly::OutlierDetector,
    api,
    collector::SysinfoSource,
    health::{components, HealthRegistry},
    monitor::{LatestSample, LoopSummary, MonitorLoopBuilder},
    notify::{AlertRouter, ChatWebhookSink, EmailSink},
    observability::StructuredLogger,
    MonitorError,
};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const HOSTWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AppConfig::load().context("failed to load configuration")?;

    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(HOSTWATCH_VERSION);

    // Train the CPU outlier model before anything starts
    let detector = OutlierDetector::new(config.detector_config());
    let model = detector
        .train(&config.detector.training_data)
        .context("failed to train anomaly model")?;
    logger.log_model_trained(
        config.detector.training_data.len(),
        model.tree_count(),
        model.threshold(),
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::NOTIFIER).await;

    let router = build_router(&config, logger.clone(), health_registry.clone())?;
    if router.sink_names().is_empty() {
        warn!("No notification sinks configured, alerts will only be logged");
    } else {
        info!(sinks = ?router.sink_names(), "Notification sinks configured");
    }

    let latest = LatestSample::new();
    let loop_config = config.loop_config()?;
    let monitor = MonitorLoopBuilder::new()
        .source(Arc::new(SysinfoSource::new(config.source_config())))
        .model(Arc::new(model))
        .router(Arc::new(router))
        .thresholds(config.thresholds()?)
        .latest(latest.clone())
        .cadence(loop_config.cadence)
        .max_consecutive_failures(loop_config.max_consecutive_failures)
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut monitor_handle = tokio::spawn(monitor.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry, latest));
    let addr = config.socket_addr()?;
    let mut api_handle = tokio::spawn(api::serve(addr, app_state, shutdown_tx.subscribe()));

    // Runs until SIGINT, unless the loop or the server stops first
    let exit = tokio::select! {
        result = &mut monitor_handle => Exit::Loop(result),
        result = &mut api_handle => Exit::Server(result),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
            Exit::Signal
        }
    };

    let _ = shutdown_tx.send(());

    let loop_result = match exit {
        Exit::Loop(result) => {
            await_server(api_handle).await;
            result
        }
        Exit::Server(result) => {
            logger.log_shutdown("API server stopped");
            log_server_result(result);
            let _ = monitor_handle.await;
            anyhow::bail!("API server stopped unexpectedly");
        }
        Exit::Signal => {
            await_server(api_handle).await;
            monitor_handle.await
        }
    };

    let summary = loop_result
        .context("monitoring loop panicked")?
        .context("monitoring loop stopped")?;
    info!(
        cycles = summary.cycles,
        sampling_failures = summary.sampling_failures,
        alerts = summary.alerts_dispatched,
        "Shutdown complete"
    );

    Ok(())
}

enum Exit {
    Loop(Result<Result<LoopSummary, MonitorError>, JoinError>),
    Server(Result<Result<()>, JoinError>),
    Signal,
}

async fn await_server(handle: JoinHandle<Result<()>>) {
    log_server_result(handle.await);
}

fn log_server_result(result: Result<Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task failed"),
    }
}

/// Build the alert router from whichever sinks are configured
fn build_router(
    config: &config::AppConfig,
    logger: StructuredLogger,
    health: HealthRegistry,
) -> Result<AlertRouter> {
    let timeout = config.sink_timeout();
    let mut router = AlertRouter::new(config.router_config(), logger).with_health(health);

    if let Some(email) = &config.notify.email {
        let sink = EmailSink::new(email, timeout).context("invalid email sink settings")?;
        router = router.with_sink(Arc::new(sink));
    }
    if let Some(chat) = &config.notify.chat {
        let sink = ChatWebhookSink::new(chat, timeout).context("invalid chat sink settings")?;
        router = router.with_sink(Arc::new(sink));
    }

    Ok(router)
}
