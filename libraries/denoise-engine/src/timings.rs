//! Frequency-dependent measurement, attack and release times
//!
//! Every time is configured as a range. Low bands get the largest value,
//! high bands the smallest; values in between are interpolated on a
//! logarithmic frequency axis:
//!
//! ```text
//! t(f) = largest * exp(rel(f) * ln(smallest / largest))
//! rel(f) = ln(f / lowest) / ln(highest / lowest)
//! ```
//!
//! where `lowest = min(20 Hz, lowest_crossover / 2)` and `highest` is the
//! highest crossover.

use crate::crossover::CrossoverInfo;
use crate::error::{EngineError, Result};
use crate::settings::{IrregularNoiseMode, NrMeasurementSettings};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configured time ranges in seconds, before binding to a crossover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_measurement_time")]
    pub measurement_time: Vec<f64>,

    #[serde(default = "default_attack_time")]
    pub attack_time: Vec<f64>,

    #[serde(default = "default_release_time")]
    pub release_time: Vec<f64>,
}

fn default_measurement_time() -> Vec<f64> {
    vec![0.025, 0.075]
}

fn default_attack_time() -> Vec<f64> {
    vec![0.0015, 0.010]
}

fn default_release_time() -> Vec<f64> {
    vec![0.075, 0.200]
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            measurement_time: default_measurement_time(),
            attack_time: default_attack_time(),
            release_time: default_release_time(),
        }
    }
}

impl TimingSettings {
    pub fn to_timings(&self, crossover: &CrossoverInfo) -> Result<DefaultTimings> {
        DefaultTimings::new(
            crossover,
            &self.measurement_time,
            &self.attack_time,
            &self.release_time,
        )
    }
}

/// A `[largest, smallest]` time pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub largest: f64,
    pub smallest: f64,
}

impl TimeRange {
    fn from_values(name: &str, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(EngineError::InvalidSettings(format!(
                "need at least one {} time",
                name
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(EngineError::InvalidSettings(format!(
                "{} time {} s must be positive",
                name, bad
            )));
        }
        let largest = values.iter().copied().fold(f64::MIN, f64::max);
        let smallest = values.iter().copied().fold(f64::MAX, f64::min);
        Ok(Self { largest, smallest })
    }

    fn interpolate(&self, relative: f64) -> f64 {
        self.largest * (relative * (self.smallest / self.largest).ln()).exp()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.largest == self.smallest {
            write!(f, "{:.3}s", self.largest)
        } else {
            write!(f, "[{:.3}-{:.3}]s", self.smallest, self.largest)
        }
    }
}

/// Time ranges bound to a crossover's frequency span
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultTimings {
    measurement: TimeRange,
    attack: TimeRange,
    release: TimeRange,
    lowest_frequency: f64,
    highest_frequency: f64,
}

impl DefaultTimings {
    pub fn new(
        crossover: &CrossoverInfo,
        measurement: &[f64],
        attack: &[f64],
        release: &[f64],
    ) -> Result<Self> {
        let lowest_frequency = 20.0_f64.min(0.5 * crossover.lowest());
        let highest_frequency = crossover.highest();

        Ok(Self {
            measurement: TimeRange::from_values("measurement", measurement)?,
            attack: TimeRange::from_values("attack", attack)?,
            release: TimeRange::from_values("release", release)?,
            lowest_frequency,
            highest_frequency,
        })
    }

    pub fn lowest_frequency(&self) -> f64 {
        self.lowest_frequency
    }

    pub fn highest_frequency(&self) -> f64 {
        self.highest_frequency
    }

    /// Largest of all configured times
    pub fn largest_time(&self) -> f64 {
        self.measurement
            .largest
            .max(self.attack.largest)
            .max(self.release.largest)
    }

    pub fn measurement_time(&self, band_frequency: f64) -> f64 {
        self.measurement.interpolate(self.relative(band_frequency))
    }

    pub fn attack_time(&self, band_frequency: f64) -> f64 {
        self.attack.interpolate(self.relative(band_frequency))
    }

    pub fn release_time(&self, band_frequency: f64) -> f64 {
        self.release.interpolate(self.relative(band_frequency))
    }

    /// Window used to re-measure irregular noise in a band
    pub fn effective_measurement_time(
        &self,
        settings: &NrMeasurementSettings,
        band_frequency: f64,
    ) -> f64 {
        let measurement = self.measurement_time(band_frequency);
        match settings.irregular_noise_mode {
            IrregularNoiseMode::RmsWindow => settings.rms_window,
            IrregularNoiseMode::MeasurementTime => measurement,
            IrregularNoiseMode::Shortest => settings.rms_window.min(measurement),
            // Empirically tuned; also used when the stage is off
            IrregularNoiseMode::GeometricMean | IrregularNoiseMode::Off => {
                (settings.rms_window * measurement).sqrt()
            }
        }
    }

    pub fn with_sample_rate(&self, sample_rate: f64) -> Result<RatedTimings> {
        RatedTimings::new(self.clone(), sample_rate)
    }

    fn relative(&self, band_frequency: f64) -> f64 {
        let range = (self.highest_frequency / self.lowest_frequency).ln();
        if range <= 0.0 {
            return 0.0;
        }
        let frequency = band_frequency
            .max(self.lowest_frequency)
            .min(self.highest_frequency);
        (frequency / self.lowest_frequency).ln() / range
    }
}

impl fmt::Display for DefaultTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timings(range=[{:.0}-{:.0}]Hz; level-measurement={}; attack={}; release={})",
            self.lowest_frequency, self.highest_frequency, self.measurement, self.attack, self.release
        )
    }
}

/// Timings bound to a sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct RatedTimings {
    timings: DefaultTimings,
    sample_rate: f64,
}

impl RatedTimings {
    /// Smallest sample count handed out for any time
    pub const MIN_SAMPLES: usize = 3;

    pub fn new(timings: DefaultTimings, sample_rate: f64) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate < 1.0 {
            return Err(EngineError::InvalidSettings(format!(
                "sample rate {} must be positive",
                sample_rate
            )));
        }
        Ok(Self {
            timings,
            sample_rate,
        })
    }

    pub fn timings(&self) -> &DefaultTimings {
        &self.timings
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn lowest_frequency(&self) -> f64 {
        self.timings.lowest_frequency()
    }

    /// Rounded sample count for `time`, at least [`Self::MIN_SAMPLES`]
    pub fn samples(&self, time: f64) -> usize {
        ((0.5 + self.sample_rate * time) as usize).max(Self::MIN_SAMPLES)
    }

    pub fn measurement_samples(&self, band_frequency: f64) -> usize {
        self.samples(self.timings.measurement_time(band_frequency))
    }

    pub fn attack_samples(&self, band_frequency: f64) -> usize {
        self.samples(self.timings.attack_time(band_frequency))
    }

    pub fn release_samples(&self, band_frequency: f64) -> usize {
        self.samples(self.timings.release_time(band_frequency))
    }

    pub fn effective_measurement_samples(
        &self,
        settings: &NrMeasurementSettings,
        band_frequency: f64,
    ) -> usize {
        self.samples(
            self.timings
                .effective_measurement_time(settings, band_frequency),
        )
    }
}
