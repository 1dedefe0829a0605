//! Lossless codecs for timestamp and value streams
//!
//! The varint stream is the byte-level primitive; integer transforms and
//! the FCM float codec stack on top of it. Everything here operates on
//! caller-owned byte regions and fails with the cursor restored when a
//! write would not fit.

pub mod float;
pub mod predictor;
pub mod transform;
pub mod varint;

pub use float::{FcmDecoder, FcmEncoder};
pub use predictor::{DfcmPredictor, FcmPredictor};
pub use transform::{IntReader, IntWriter};
pub use varint::{VarintReader, VarintWriter};

/// Samples per compressed chunk. Also the delta-of-delta stride and the
/// unit the float codec pairs its flag bytes over.
pub const CHUNK_SIZE: usize = 16;
