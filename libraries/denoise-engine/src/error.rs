//! Error types for the noise-reduction engine

use denoise_dsp::DspError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while configuring or running noise reduction
#[derive(Error, Debug)]
pub enum EngineError {
    /// Filter, bucket or accumulator failure
    #[error("DSP error: {0}")]
    Dsp(#[from] DspError),

    /// Measurement or timing settings out of range
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Crossover configuration rejected
    #[error("Invalid crossover: {0}")]
    InvalidCrossover(String),

    /// Dynamics parameters or noise level rejected
    #[error("Invalid dynamics: {0}")]
    InvalidDynamics(String),

    /// A band filter was created without the metadata it depends on
    #[error("Missing metadata for {stage}: expected {expected}")]
    MissingMetadata {
        stage: &'static str,
        expected: &'static str,
    },

    /// Sample or marker buffer lengths disagree
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Buffer pool misuse (size change, empty request, closed handle)
    #[error("Buffer pool error: {0}")]
    Pool(String),

    /// Another worker failed and cancelled all waiters
    #[error("Buffer pool panicked: processing was cancelled")]
    PoolPanicked,

    /// No speaker layout for the channel count or mask
    #[error("Unsupported channel layout: {0}")]
    UnsupportedChannelLayout(String),

    /// Interleaved buffer is not a whole number of frames
    #[error("Invalid sample buffer: {0}")]
    InvalidBuffer(String),

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// One or more worker threads failed; every failure is listed
    #[error("{} worker(s) failed: {}", .0.len(), .0.join("; "))]
    Workers(Vec<String>),
}
