//! Core types for Strata

use serde::{Deserialize, Serialize};

/// Timestamp in nanoseconds since Unix epoch
pub type Timestamp = u64;

/// 64-bit identifier of one time series
pub type SeriesId = u64;

/// A single decoded data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp in nanoseconds
    pub timestamp: Timestamp,
    /// Measured value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}
