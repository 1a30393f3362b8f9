//! Latest-sample publish slot
//!
//! Single writer (the monitoring loop), many readers (HTTP handlers). The
//! whole sample is swapped under the write lock and copied out under the
//! read lock, so readers never see fields from two different readings.

use std::sync::{Arc, RwLock};

use crate::models::Sample;

/// Shared handle to the most recent sample
#[derive(Debug, Clone, Default)]
pub struct LatestSample {
    inner: Arc<RwLock<Option<Sample>>>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published sample
    pub fn publish(&self, sample: Sample) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(sample);
    }

    /// Copy of the published sample, if any
    pub fn get(&self) -> Option<Sample> {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
