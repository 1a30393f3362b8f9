//! Anomaly detection for host utilization
//!
//! This module provides an isolation-forest outlier detector that is
//! trained once at startup on a seed dataset and then scores live values.
//! Only CPU utilization is scored; memory and disk are threshold-only.

mod isolation_forest;

pub use isolation_forest::{
    DetectorConfig, DetectorModel, OutlierDetector, Verdict, DEFAULT_CONTAMINATION,
    DEFAULT_MAX_SAMPLES, DEFAULT_TRAINING_DATA, DEFAULT_TREES,
};
