//! Noise-reduction gain curves
//!
//! A curve maps the level of a band, relative to its noise threshold, to a
//! gain in `[0, 1]`:
//!
//! ```text
//! relative  = level / (noise_level * 10^(threshold_db / 20))
//! expansion   gain = clamp(relative, 0, 1)^ratio
//! subtraction gain = (relative - max(1, relative)^ratio) / relative
//! ```

use crate::error::{EngineError, Result};
use denoise_dsp::{decibel_to_value, value_to_decibel};
use std::fmt;

/// Allowed expansion ratio range
pub const EXPANSION_RATIO_RANGE: (f64, f64) = (1.25, 4.0);

/// Allowed subtraction ratio range
pub const SUBTRACTION_RATIO_RANGE: (f64, f64) = (0.0, 0.9);

/// Allowed subtraction threshold range in dB
pub const SUBTRACTION_THRESHOLD_RANGE_DB: (f64, f64) = (-20.0, 20.0);

/// Shape of the gain curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainCurve {
    /// Downward expansion below the threshold
    Expansion { ratio: f64 },
    /// Subtract a fraction of the noise from the level
    Subtraction { ratio: f64 },
}

impl GainCurve {
    fn gain(self, relative: f64) -> f64 {
        match self {
            GainCurve::Expansion { ratio } => relative.clamp(0.0, 1.0).powf(ratio),
            GainCurve::Subtraction { ratio } => (relative - relative.max(1.0).powf(ratio)) / relative,
        }
    }
}

/// Curve parameters waiting for a noise level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NrDynamicsFactory {
    curve: GainCurve,
    threshold_db: f64,
}

impl NrDynamicsFactory {
    /// Expansion with `threshold_db >= 0` and `ratio` in `[1.25, 4]`
    pub fn expansion(threshold_db: f64, ratio: f64) -> Result<Self> {
        if !threshold_db.is_finite() || threshold_db < 0.0 {
            return Err(EngineError::InvalidDynamics(format!(
                "expansion threshold {} dB must not be negative",
                threshold_db
            )));
        }
        check_ratio("expansion", ratio, EXPANSION_RATIO_RANGE)?;
        Ok(Self {
            curve: GainCurve::Expansion { ratio },
            threshold_db,
        })
    }

    /// Subtraction with `threshold_db` in `[-20, 20]` and `ratio` in `[0, 0.9]`
    pub fn subtraction(threshold_db: f64, ratio: f64) -> Result<Self> {
        let (low, high) = SUBTRACTION_THRESHOLD_RANGE_DB;
        if !(low..=high).contains(&threshold_db) {
            return Err(EngineError::InvalidDynamics(format!(
                "subtraction threshold {} dB must be between {} and {}",
                threshold_db, low, high
            )));
        }
        check_ratio("subtraction", ratio, SUBTRACTION_RATIO_RANGE)?;
        Ok(Self {
            curve: GainCurve::Subtraction { ratio },
            threshold_db,
        })
    }

    pub fn curve(&self) -> GainCurve {
        self.curve
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    /// Bind a noise level
    pub fn create(&self, noise_level: f64) -> Result<NrDynamics> {
        check_noise_level(noise_level)?;
        Ok(NrDynamics {
            curve: self.curve,
            threshold_db: self.threshold_db,
            noise_level,
            threshold: noise_level * decibel_to_value(self.threshold_db),
        })
    }
}

impl Default for NrDynamicsFactory {
    fn default() -> Self {
        Self {
            curve: GainCurve::Subtraction { ratio: 0.25 },
            threshold_db: 0.0,
        }
    }
}

impl fmt::Display for NrDynamicsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.curve {
            GainCurve::Expansion { ratio } => write!(
                f,
                "noise-dynamics(expansion): above-noise-level={:.1}dB; expansion-ratio={:.2}",
                self.threshold_db, ratio
            ),
            GainCurve::Subtraction { ratio } => write!(
                f,
                "noise-dynamics(subtraction): above-noise-level={:.1}dB; up-ratio={:.2}",
                self.threshold_db, ratio
            ),
        }
    }
}

fn check_ratio(name: &str, ratio: f64, (low, high): (f64, f64)) -> Result<()> {
    if !(low..=high).contains(&ratio) {
        return Err(EngineError::InvalidDynamics(format!(
            "{} ratio {} must be between {} and {}",
            name, ratio, low, high
        )));
    }
    Ok(())
}

fn check_noise_level(noise_level: f64) -> Result<()> {
    if !noise_level.is_finite() || noise_level <= 0.0 {
        return Err(EngineError::InvalidDynamics(format!(
            "noise level {} must be positive",
            noise_level
        )));
    }
    Ok(())
}

/// Gain curve bound to a noise level; immutable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NrDynamics {
    curve: GainCurve,
    threshold_db: f64,
    noise_level: f64,
    threshold: f64,
}

impl NrDynamics {
    /// Same curve with another noise level
    pub fn with_noise_level(&self, noise_level: f64) -> Result<Self> {
        check_noise_level(noise_level)?;
        Ok(Self {
            noise_level,
            threshold: noise_level * decibel_to_value(self.threshold_db),
            ..*self
        })
    }

    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }

    /// Absolute level where the curve reaches its knee
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn curve(&self) -> GainCurve {
        self.curve
    }

    /// Gain for an absolute RMS level
    #[inline]
    pub fn gain(&self, level: f64) -> f64 {
        if level < f32::MIN_POSITIVE as f64 {
            return 0.0;
        }
        self.curve.gain(level / self.threshold).clamp(0.0, 1.0)
    }
}

impl fmt::Display for NrDynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} noise-level={:.1}dB threshold={:.1}dB",
            self.curve,
            value_to_decibel(self.noise_level),
            value_to_decibel(self.threshold)
        )
    }
}
