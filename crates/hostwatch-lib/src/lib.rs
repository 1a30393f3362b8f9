//! Host resource monitoring library
//!
//! This crate provides the core functionality for:
//! - Sampling CPU, memory and disk utilization
//! - Static threshold evaluation and isolation-forest anomaly detection
//! - Alert routing to email and chat webhook sinks
//! - The monitoring loop and its latest-sample publish slot
//! - The snapshot HTTP API, health checks and observability

pub mod anomaly;
pub mod api;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod policy;

pub use error::{ConfigError, DeliveryError, MonitorError, SamplingError, TrainingError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
