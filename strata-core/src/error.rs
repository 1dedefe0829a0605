//! Error types for Strata Core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Errors of the compression and block layer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrataError {
    /// A write would cross the end of the block; the cursor is left where
    /// it was. Commit the block and start a new one.
    #[error("out of space in block buffer")]
    OutOfSpace,

    /// A read hit the end of the region in the middle of a value
    #[error("compressed data is truncated")]
    Truncated,

    /// The block was written by an unknown format version
    #[error("unsupported block version: {0}")]
    Unsupported(u16),
}

impl StrataError {
    /// Check if the error indicates a damaged or foreign block rather than
    /// a full one
    pub fn is_corruption(&self) -> bool {
        matches!(self, StrataError::Truncated | StrataError::Unsupported(_))
    }
}
