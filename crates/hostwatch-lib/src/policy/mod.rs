//! Static threshold policy

mod threshold;

pub use threshold::{
    evaluate, ThresholdConfig, DEFAULT_CPU_LIMIT, DEFAULT_DISK_LIMIT, DEFAULT_MEMORY_LIMIT,
};
