//! Per-band filter chain contract
//!
//! The band-split filter set runs an ordered list of [`FilterFactory`]
//! trait objects over each band. Every factory creates a stateful
//! [`BandFilter`] from the metadata the previous filter in the chain left
//! behind, so the chain can pass a peak level to the noise detector and a
//! noise level to the reduction stage without knowing the concrete types.

use crate::error::{EngineError, Result};
use std::fmt;

/// Marker bit for samples excluded from measurement
pub const MARKER_DISCARDED: u8 = 0x01;

/// Marker bit for samples in irregular (quiet but noisy) regions
pub const MARKER_IRREGULAR: u8 = 0x02;

/// Result a band filter hands to the next stage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BandMetadata {
    #[default]
    None,
    /// Peak RMS level observed in the band
    MaxRms(f64),
    /// Estimated noise floor (RMS) of the band
    NoiseLevel(f64),
}

impl BandMetadata {
    pub fn max_rms(self) -> Option<f64> {
        match self {
            BandMetadata::MaxRms(level) => Some(level),
            _ => None,
        }
    }

    pub fn noise_level(self) -> Option<f64> {
        match self {
            BandMetadata::NoiseLevel(level) => Some(level),
            _ => None,
        }
    }

    /// Peak level or a [`EngineError::MissingMetadata`] naming `stage`
    pub fn require_max_rms(self, stage: &'static str) -> Result<f64> {
        self.max_rms().ok_or(EngineError::MissingMetadata {
            stage,
            expected: "peak level",
        })
    }

    /// Noise level or a [`EngineError::MissingMetadata`] naming `stage`
    pub fn require_noise_level(self, stage: &'static str) -> Result<f64> {
        self.noise_level().ok_or(EngineError::MissingMetadata {
            stage,
            expected: "noise level",
        })
    }
}

/// Frequency range of one band in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub lower: f64,
    pub upper: f64,
}

impl FrequencyBand {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}-{:.0} Hz", self.lower, self.upper)
    }
}

/// A stateful filter applied to one band
pub trait BandFilter: Send {
    /// Filter `samples` in place
    ///
    /// `markers` covers the same window as `samples`; positions are indices
    /// into that window.
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()>;

    /// Metadata for the next stage, valid after `process`
    fn metadata(&self) -> BandMetadata;

    fn reset(&mut self);

    fn name(&self) -> &str;
}

/// Creates band filters and reports how they shift the processed window
pub trait FilterFactory: Send + Sync {
    /// Build a filter for `band`, given the previous stage's metadata
    fn create_filter(
        &self,
        metadata: BandMetadata,
        band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>>;

    /// Output delay in samples
    fn latency(&self) -> usize {
        0
    }

    /// Samples skipped at the start of the window
    fn start_offset(&self) -> usize {
        0
    }

    /// Samples skipped at the end of the window
    fn end_offset(&self) -> usize {
        0
    }

    fn name(&self) -> &str;
}

/// Fail unless markers and samples cover the same window
pub(crate) fn check_markers(samples: &[f64], markers: &[u8]) -> Result<()> {
    if samples.len() != markers.len() {
        return Err(EngineError::BufferSizeMismatch {
            expected: samples.len(),
            actual: markers.len(),
        });
    }
    Ok(())
}
