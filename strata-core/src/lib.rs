//! Strata Core - Compression and Block Layout for Time-Series Storage
//!
//! Transforms a per-series stream of `(timestamp, f64)` samples into
//! self-describing fixed-size blocks and restores the original sequence
//! losslessly: timestamps byte-for-byte, values bit-for-bit.
//!
//! # Architecture
//!
//! The core is a stack of small codecs, leaves first:
//!
//! - **Varint stream**: bounds-checked base-128 primitive over a
//!   caller-owned byte region
//! - **Transforms**: composable delta / zig-zag / delta-of-delta /
//!   run-length filters
//! - **Float codec**: FCM-predicted XOR residuals with nibble-packed
//!   length flags
//! - **Block layer**: 16-sample chunked writer and reader bound to one
//!   fixed-capacity block
//!
//! Callers own every buffer. The core allocates only its predictor tables
//! and the 16-sample write buffers, and never on the `put`/`next` paths.

pub mod block;
pub mod compression;

mod error;
mod types;

pub use error::{Result, StrataError};
pub use types::{Sample, SeriesId, Timestamp};

/// Strata version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Block size handed out by block stores (4 KiB)
    pub const BLOCK_SIZE: usize = 4 * 1024;

    /// Entries in each FCM predictor table (1 KiB of u64 state)
    pub const PREDICTOR_TABLE_SIZE: usize = 128;
}
