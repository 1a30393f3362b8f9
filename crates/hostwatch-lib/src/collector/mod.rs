//! Host metrics collection
//!
//! This module provides the [`MetricSource`] abstraction the monitoring
//! loop samples from, and a sysinfo-backed implementation that reads the
//! OS counters for CPU, memory and disk utilization.

mod system;

pub use system::{SysinfoSource, SysinfoSourceConfig, DEFAULT_CPU_SETTLE};

use crate::error::SamplingError;
use crate::models::Sample;

pub use async_trait::async_trait;

/// Trait for host metric sources
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Take one complete sample.
    ///
    /// Callers must not read more often than the source's settle interval,
    /// otherwise CPU readings degrade to instantaneous values.
    async fn read(&self) -> Result<Sample, SamplingError>;
}
