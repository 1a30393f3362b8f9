//! sysinfo-backed metric source
//!
//! CPU utilization is an average over a settle window: the counters are
//! refreshed, the source waits, and the second refresh yields the usage
//! over the window. The wait runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tracing::debug;

use super::{async_trait, MetricSource};
use crate::error::SamplingError;
use crate::models::{Metric, Sample};

/// Default CPU measurement window
pub const DEFAULT_CPU_SETTLE: Duration = Duration::from_secs(1);

/// Shortest window that yields a meaningful CPU average
const MIN_CPU_SETTLE: Duration = Duration::from_millis(200);

/// Configuration for the sysinfo metric source
#[derive(Debug, Clone)]
pub struct SysinfoSourceConfig {
    /// CPU measurement window (default: 1 second)
    pub cpu_settle: Duration,
    /// Mount point whose disk usage is reported (default: "/")
    pub disk_mount: PathBuf,
}

impl Default for SysinfoSourceConfig {
    fn default() -> Self {
        Self {
            cpu_settle: DEFAULT_CPU_SETTLE,
            disk_mount: PathBuf::from("/"),
        }
    }
}

/// Metric source reading OS counters through sysinfo
pub struct SysinfoSource {
    system: Arc<Mutex<System>>,
    config: SysinfoSourceConfig,
}

impl SysinfoSource {
    pub fn new(mut config: SysinfoSourceConfig) -> Self {
        config.cpu_settle = config.cpu_settle.max(MIN_CPU_SETTLE);
        Self {
            system: Arc::new(Mutex::new(System::new())),
            config,
        }
    }

    /// Effective CPU measurement window
    pub fn cpu_settle(&self) -> Duration {
        self.config.cpu_settle
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new(SysinfoSourceConfig::default())
    }
}

#[async_trait]
impl MetricSource for SysinfoSource {
    async fn read(&self) -> Result<Sample, SamplingError> {
        let system = self.system.clone();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut sys = system
                .lock()
                .map_err(|_| SamplingError::Unavailable("system handle poisoned".to_string()))?;
            read_blocking(&mut sys, &config)
        })
        .await
        .map_err(|e| SamplingError::Task(e.to_string()))?
    }
}

fn read_blocking(sys: &mut System, config: &SysinfoSourceConfig) -> Result<Sample, SamplingError> {
    sys.refresh_cpu();
    std::thread::sleep(config.cpu_settle);
    sys.refresh_cpu();
    let cpu = f64::from(sys.global_cpu_info().cpu_usage());

    sys.refresh_memory();
    let memory = percent_used(sys.total_memory(), sys.available_memory())
        .ok_or_else(|| SamplingError::Unavailable("total memory reported as zero".to_string()))?;

    sys.refresh_disks_list();
    let disk = disk_percent(sys, &config.disk_mount)?;

    debug!(cpu, memory, disk, "Read host counters");

    // sysinfo can overshoot 100% by rounding on busy hosts
    Sample::new(clamp_rounding(cpu), memory, disk, Utc::now())
}

fn disk_percent(sys: &System, mount: &Path) -> Result<f64, SamplingError> {
    let disk = sys
        .disks()
        .iter()
        .find(|d| d.mount_point() == mount)
        .ok_or_else(|| SamplingError::DiskNotFound(mount.display().to_string()))?;

    percent_used(disk.total_space(), disk.available_space()).ok_or(
        SamplingError::InvalidReading {
            metric: Metric::Disk,
            value: 0.0,
        },
    )
}

/// Percentage of `total` that is not `available`
fn percent_used(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(used as f64 / total as f64 * 100.0)
}

fn clamp_rounding(value: f64) -> f64 {
    if value > 100.0 && value < 100.5 {
        100.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_used() {
        assert_eq!(percent_used(200, 50), Some(75.0));
        assert_eq!(percent_used(100, 100), Some(0.0));
        // available larger than total is reported by some filesystems
        assert_eq!(percent_used(100, 150), Some(0.0));
        assert_eq!(percent_used(0, 0), None);
    }

    #[test]
    fn test_settle_has_floor() {
        let source = SysinfoSource::new(SysinfoSourceConfig {
            cpu_settle: Duration::from_millis(10),
            disk_mount: PathBuf::from("/"),
        });
        assert_eq!(source.cpu_settle(), MIN_CPU_SETTLE);
    }

    #[test]
    fn test_clamp_rounding() {
        assert_eq!(clamp_rounding(100.2), 100.0);
        assert_eq!(clamp_rounding(42.0), 42.0);
        assert_eq!(clamp_rounding(250.0), 250.0);
    }

    #[test]
    fn test_default_config() {
        let config = SysinfoSourceConfig::default();
        assert_eq!(config.cpu_settle, DEFAULT_CPU_SETTLE);
        assert_eq!(config.disk_mount, PathBuf::from("/"));
    }
}
