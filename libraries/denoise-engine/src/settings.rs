//! Noise measurement settings
//!
//! [`NrMeasurementSettings`] holds the user-facing values in seconds and dB;
//! [`NrMeasurementValues`] binds them to a sample rate.

use crate::error::{EngineError, Result};
use denoise_dsp::decibel_to_value;
use serde::{Deserialize, Serialize};

/// Allowed minimum S/N ratio range in dB
pub const MIN_SN_RATIO_RANGE_DB: (f64, f64) = (20.0, 80.0);

/// Allowed maximum S/N ratio range in dB
pub const MAX_SN_RATIO_RANGE_DB: (f64, f64) = (40.0, 120.0);

/// How the irregular-noise stages re-measure quiet regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IrregularNoiseMode {
    /// No irregular-noise marker or corrector in the chain
    Off,
    /// Re-measure with the RMS window
    RmsWindow,
    /// Re-measure with the band's measurement time
    MeasurementTime,
    /// Re-measure with the shorter of both
    Shortest,
    /// Re-measure with the geometric mean of both
    GeometricMean,
}

impl IrregularNoiseMode {
    pub fn is_enabled(self) -> bool {
        self != IrregularNoiseMode::Off
    }
}

impl Default for IrregularNoiseMode {
    fn default() -> Self {
        IrregularNoiseMode::Shortest
    }
}

impl TryFrom<u8> for IrregularNoiseMode {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(IrregularNoiseMode::Off),
            1 => Ok(IrregularNoiseMode::RmsWindow),
            2 => Ok(IrregularNoiseMode::MeasurementTime),
            3 => Ok(IrregularNoiseMode::Shortest),
            4 => Ok(IrregularNoiseMode::GeometricMean),
            other => Err(EngineError::InvalidSettings(format!(
                "irregular noise mode {} (must be 0-4)",
                other
            ))),
        }
    }
}

impl From<IrregularNoiseMode> for u8 {
    fn from(mode: IrregularNoiseMode) -> Self {
        match mode {
            IrregularNoiseMode::Off => 0,
            IrregularNoiseMode::RmsWindow => 1,
            IrregularNoiseMode::MeasurementTime => 2,
            IrregularNoiseMode::Shortest => 3,
            IrregularNoiseMode::GeometricMean => 4,
        }
    }
}

/// Noise measurement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NrMeasurementSettings {
    /// Smallest S/N ratio (dB) a noise estimate may imply
    #[serde(default = "default_min_sn_ratio_db")]
    pub min_sn_ratio_db: f64,

    /// Largest S/N ratio (dB); anything quieter counts as a dropout
    #[serde(default = "default_max_sn_ratio_db")]
    pub max_sn_ratio_db: f64,

    /// Window for peak RMS detection (seconds)
    #[serde(default = "default_rms_window")]
    pub rms_window: f64,

    /// Window for noise-floor detection (seconds)
    #[serde(default = "default_noise_window")]
    pub noise_window: f64,

    /// Window for dropout detection (seconds)
    #[serde(default = "default_skip_window")]
    pub skip_window: f64,

    /// Leading time excluded from measurement (seconds)
    #[serde(default = "default_skip_edge")]
    pub skip_start: f64,

    /// Trailing time excluded from measurement (seconds)
    #[serde(default = "default_skip_edge")]
    pub skip_end: f64,

    #[serde(default)]
    pub irregular_noise_mode: IrregularNoiseMode,

    /// Use the level histogram instead of the minimum window
    #[serde(default)]
    pub frequency_scanning: bool,
}

fn default_min_sn_ratio_db() -> f64 {
    30.0
}

fn default_max_sn_ratio_db() -> f64 {
    75.0
}

fn default_rms_window() -> f64 {
    0.05
}

fn default_noise_window() -> f64 {
    0.3
}

fn default_skip_window() -> f64 {
    0.2
}

fn default_skip_edge() -> f64 {
    0.1
}

impl Default for NrMeasurementSettings {
    fn default() -> Self {
        Self {
            min_sn_ratio_db: default_min_sn_ratio_db(),
            max_sn_ratio_db: default_max_sn_ratio_db(),
            rms_window: default_rms_window(),
            noise_window: default_noise_window(),
            skip_window: default_skip_window(),
            skip_start: default_skip_edge(),
            skip_end: default_skip_edge(),
            irregular_noise_mode: IrregularNoiseMode::default(),
            frequency_scanning: false,
        }
    }
}

impl NrMeasurementSettings {
    /// Validate ranges; nothing is clamped
    pub fn validate(&self) -> Result<()> {
        check_range(
            "minimum S/N ratio",
            self.min_sn_ratio_db,
            MIN_SN_RATIO_RANGE_DB,
        )?;
        check_range(
            "maximum S/N ratio",
            self.max_sn_ratio_db,
            MAX_SN_RATIO_RANGE_DB,
        )?;
        check_positive("RMS window", self.rms_window)?;
        check_positive("noise window", self.noise_window)?;
        check_positive("skip window", self.skip_window)?;
        check_non_negative("skip start", self.skip_start)?;
        check_non_negative("skip end", self.skip_end)?;
        Ok(())
    }

    /// Bind to a sample rate
    pub fn with_sample_rate(&self, sample_rate: f64) -> Result<NrMeasurementValues> {
        NrMeasurementValues::new(self.clone(), sample_rate)
    }
}

fn check_range(name: &str, value: f64, (low, high): (f64, f64)) -> Result<()> {
    if !(low..=high).contains(&value) {
        return Err(EngineError::InvalidSettings(format!(
            "{} {} dB (must be between {} and {})",
            name, value, low, high
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::InvalidSettings(format!(
            "{} {} s (must be positive)",
            name, value
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidSettings(format!(
            "{} {} s (must not be negative)",
            name, value
        )));
    }
    Ok(())
}

/// Measurement settings bound to a sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct NrMeasurementValues {
    pub settings: NrMeasurementSettings,
    pub sample_rate: f64,
    pub rms_window_samples: usize,
    pub noise_window_samples: usize,
    pub skip_window_samples: usize,
    pub skip_start_samples: usize,
    pub skip_end_samples: usize,
    /// Linear ratio, never larger than `max_sn_ratio`
    pub min_sn_ratio: f64,
    pub max_sn_ratio: f64,
}

impl NrMeasurementValues {
    pub fn new(settings: NrMeasurementSettings, sample_rate: f64) -> Result<Self> {
        settings.validate()?;
        if !sample_rate.is_finite() || sample_rate < 1.0 {
            return Err(EngineError::InvalidSettings(format!(
                "sample rate {} (must be at least 1)",
                sample_rate
            )));
        }

        let samples = |seconds: f64| (0.5 + seconds * sample_rate) as usize;
        let rms_window_samples = samples(settings.rms_window);
        let noise_window_samples = samples(settings.noise_window);
        let skip_window_samples = samples(settings.skip_window);
        for (name, count) in [
            ("RMS window", rms_window_samples),
            ("noise window", noise_window_samples),
            ("skip window", skip_window_samples),
        ] {
            if count < 1 {
                return Err(EngineError::InvalidSettings(format!(
                    "{} yields no samples at {} Hz",
                    name, sample_rate
                )));
            }
        }

        let first = normalized_ratio(decibel_to_value(settings.min_sn_ratio_db), f32::MAX as f64)?;
        let second = normalized_ratio(decibel_to_value(settings.max_sn_ratio_db), f32::MAX as f64)?;

        Ok(Self {
            sample_rate,
            rms_window_samples,
            noise_window_samples,
            skip_window_samples,
            skip_start_samples: samples(settings.skip_start),
            skip_end_samples: samples(settings.skip_end),
            min_sn_ratio: first.min(second),
            max_sn_ratio: first.max(second),
            settings,
        })
    }

    pub fn samples_from_seconds(&self, seconds: f64) -> usize {
        (0.5 + seconds * self.sample_rate) as usize
    }
}

/// Map a ratio to a value of at least 1.0
///
/// Negative ratios are made positive and ratios below one are inverted; the
/// result is clamped to `maximum` (so ratios below `1/maximum` map to `maximum`).
pub fn normalized_ratio(ratio: f64, maximum: f64) -> Result<f64> {
    if !(1.0..=f32::MAX as f64).contains(&maximum) {
        return Err(EngineError::InvalidSettings(format!(
            "invalid maximum ratio {}",
            maximum
        )));
    }

    let result = ratio.abs();
    if result >= 1.0 {
        return Ok(result.min(maximum));
    }
    if result < 1.0 / maximum {
        return Ok(maximum);
    }
    Ok(1.0 / result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = NrMeasurementSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.irregular_noise_mode, IrregularNoiseMode::Shortest);
    }

    #[test]
    fn test_rejects_out_of_range_ratios() {
        let mut settings = NrMeasurementSettings::default();
        settings.min_sn_ratio_db = 10.0;
        assert!(settings.validate().is_err());

        let mut settings = NrMeasurementSettings::default();
        settings.max_sn_ratio_db = 130.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_windows() {
        let mut settings = NrMeasurementSettings::default();
        settings.noise_window = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = NrMeasurementSettings::default();
        settings.rms_window = 1e-6;
        assert!(settings.with_sample_rate(8000.0).is_err());
    }

    #[test]
    fn test_values_at_48k() {
        let values = NrMeasurementSettings::default()
            .with_sample_rate(48000.0)
            .unwrap();
        assert_eq!(values.rms_window_samples, 2400);
        assert_eq!(values.noise_window_samples, 14400);
        assert_eq!(values.skip_window_samples, 9600);
        assert_eq!(values.skip_start_samples, 4800);
        assert!((values.min_sn_ratio - 10f64.powf(1.5)).abs() < 1e-9);
        assert!((values.max_sn_ratio - 10f64.powf(3.75)).abs() < 1e-6);
    }

    #[test]
    fn test_swapped_ratios_are_ordered() {
        let settings = NrMeasurementSettings {
            min_sn_ratio_db: 70.0,
            max_sn_ratio_db: 50.0,
            ..Default::default()
        };
        let values = settings.with_sample_rate(44100.0).unwrap();
        assert!(values.min_sn_ratio < values.max_sn_ratio);
    }

    #[test]
    fn test_normalized_ratio() {
        assert_eq!(normalized_ratio(4.0, 100.0).unwrap(), 4.0);
        assert_eq!(normalized_ratio(-4.0, 100.0).unwrap(), 4.0);
        assert_eq!(normalized_ratio(0.25, 100.0).unwrap(), 4.0);
        assert_eq!(normalized_ratio(1000.0, 100.0).unwrap(), 100.0);
        assert_eq!(normalized_ratio(0.0001, 100.0).unwrap(), 100.0);
        assert!(normalized_ratio(2.0, 0.5).is_err());
    }

    #[test]
    fn test_irregular_mode_conversion() {
        assert_eq!(
            IrregularNoiseMode::try_from(4).unwrap(),
            IrregularNoiseMode::GeometricMean
        );
        assert!(IrregularNoiseMode::try_from(5).is_err());
        assert_eq!(u8::from(IrregularNoiseMode::Off), 0);
        assert!(!IrregularNoiseMode::Off.is_enabled());
    }
}
