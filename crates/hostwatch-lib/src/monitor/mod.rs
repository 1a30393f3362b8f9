//! Monitoring loop
//!
//! The loop is the sole driver of the system: it samples the host, runs
//! the threshold policy and the outlier model, routes alerts and publishes
//! the sample for the snapshot server.

mod latest;
mod r#loop;

pub use latest::LatestSample;
pub use r#loop::{
    CycleOutcome, LoopConfig, LoopSummary, MonitorLoop, MonitorLoopBuilder, DEFAULT_CADENCE,
};
