//! Error types for signal primitives

use thiserror::Error;

/// Result type for DSP operations
pub type Result<T> = std::result::Result<T, DspError>;

/// Errors raised while constructing or running DSP primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// Filter order below one
    #[error("Invalid filter order: {0} (must be 1 or greater)")]
    InvalidOrder(usize),

    /// Cutoff outside (0, 0.5] of the sample rate
    #[error("Invalid cutoff fraction: {0} (must be in (0, 0.5])")]
    InvalidCutoff(f64),

    /// Bucket scanner without any samples
    #[error("Invalid bucket size: {0}")]
    InvalidBucketSize(String),

    /// The exact accumulator left its representable range
    #[error("Accumulator overflow: {0}")]
    AccumulatorOverflow(String),

    /// Any other invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
