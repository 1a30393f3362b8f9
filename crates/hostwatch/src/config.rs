//! Monitor configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `HOSTWATCH_*` environment variables (`__` separates nested keys, e.g.
//! `HOSTWATCH_THRESHOLDS__CPU=90`).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hostwatch_lib::{
    anomaly::{
        DetectorConfig, DEFAULT_CONTAMINATION, DEFAULT_MAX_SAMPLES, DEFAULT_TRAINING_DATA,
        DEFAULT_TREES,
    },
    collector::{SysinfoSourceConfig, DEFAULT_CPU_SETTLE},
    monitor::{LoopConfig, DEFAULT_CADENCE},
    notify::{ChatWebhookConfig, EmailConfig, RouterConfig, DEFAULT_SINK_TIMEOUT},
    policy::{ThresholdConfig, DEFAULT_CPU_LIMIT, DEFAULT_DISK_LIMIT, DEFAULT_MEMORY_LIMIT},
    ConfigError,
};
use serde::Deserialize;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "HOSTWATCH_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "hostwatch.toml";
const ENV_PREFIX: &str = "HOSTWATCH";

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Host name attached to log events
    #[serde(default = "default_host_name")]
    pub host_name: String,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub thresholds: ThresholdSettings,

    #[serde(default)]
    pub sampling: SamplingSettings,

    #[serde(default)]
    pub detector: DetectorSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

/// Snapshot server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Static limits in percent
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdSettings {
    #[serde(default = "default_cpu_limit")]
    pub cpu: f64,

    #[serde(default = "default_memory_limit")]
    pub memory: f64,

    #[serde(default = "default_disk_limit")]
    pub disk: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingSettings {
    /// Pause between cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// CPU measurement window
    #[serde(default = "default_cpu_settle_millis")]
    pub cpu_settle_millis: u64,

    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,

    /// Stop after this many failed reads in a row (unset: never stop)
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorSettings {
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    #[serde(default = "default_trees")]
    pub trees: usize,

    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    #[serde(default)]
    pub seed: Option<u64>,

    /// CPU readings the model is trained on at startup
    #[serde(default = "default_training_data")]
    pub training_data: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifySettings {
    /// Per-sink delivery timeout
    #[serde(default = "default_sink_timeout_secs")]
    pub timeout_secs: u64,

    /// Repeat suppression window (0 disables)
    #[serde(default)]
    pub dedup_window_secs: u64,

    #[serde(default)]
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub chat: Option<ChatWebhookConfig>,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cpu_limit() -> f64 {
    DEFAULT_CPU_LIMIT
}

fn default_memory_limit() -> f64 {
    DEFAULT_MEMORY_LIMIT
}

fn default_disk_limit() -> f64 {
    DEFAULT_DISK_LIMIT
}

fn default_interval_secs() -> u64 {
    DEFAULT_CADENCE.as_secs()
}

fn default_cpu_settle_millis() -> u64 {
    DEFAULT_CPU_SETTLE.as_millis() as u64
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from("/")
}

fn default_contamination() -> f64 {
    DEFAULT_CONTAMINATION
}

fn default_trees() -> usize {
    DEFAULT_TREES
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_training_data() -> Vec<f64> {
    DEFAULT_TRAINING_DATA.to_vec()
}

fn default_sink_timeout_secs() -> u64 {
    DEFAULT_SINK_TIMEOUT.as_secs()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            cpu: default_cpu_limit(),
            memory: default_memory_limit(),
            disk: default_disk_limit(),
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cpu_settle_millis: default_cpu_settle_millis(),
            disk_mount: default_disk_mount(),
            max_consecutive_failures: None,
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            trees: default_trees(),
            max_samples: default_max_samples(),
            seed: None,
            training_data: default_training_data(),
        }
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_sink_timeout_secs(),
            dedup_window_secs: 0,
            email: None,
            chat: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path, environment())
    }

    /// Load from an explicit file (missing is fine) and environment source
    pub fn load_from(path: &Path, env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        let app: AppConfig = config
            .try_deserialize()
            .context("invalid configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Reject settings the components would refuse later
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds()?;
        self.loop_config()?;
        self.socket_addr()?;
        if self.notify.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.detector.training_data.is_empty() {
            return Err(ConfigError::Missing("detector.training_data"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr =
            self.server
                .bind_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
                    value: self.server.bind_addr.clone(),
                    reason: e.to_string(),
                })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn thresholds(&self) -> Result<ThresholdConfig, ConfigError> {
        ThresholdConfig::new(
            self.thresholds.cpu,
            self.thresholds.memory,
            self.thresholds.disk,
        )
    }

    pub fn loop_config(&self) -> Result<LoopConfig, ConfigError> {
        if self.sampling.interval_secs == 0 {
            return Err(ConfigError::InvalidCadence);
        }
        Ok(LoopConfig {
            cadence: Duration::from_secs(self.sampling.interval_secs),
            max_consecutive_failures: self.sampling.max_consecutive_failures,
        })
    }

    pub fn source_config(&self) -> SysinfoSourceConfig {
        SysinfoSourceConfig {
            cpu_settle: Duration::from_millis(self.sampling.cpu_settle_millis),
            disk_mount: self.sampling.disk_mount.clone(),
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            contamination: self.detector.contamination,
            n_trees: self.detector.trees,
            max_samples: self.detector.max_samples,
            seed: self.detector.seed,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            sink_timeout: Duration::from_secs(self.notify.timeout_secs),
            dedup_window: Duration::from_secs(self.notify.dedup_window_secs),
        }
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.timeout_secs)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
