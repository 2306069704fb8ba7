//! Crossover configuration for the band-split filter set

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single split at 4500 Hz
pub const DNL_CROSSOVERS: [f64; 1] = [4500.0];

/// Third-octave split points from 70 Hz up to 14287 Hz
pub const TERTZ_CROSSOVERS: [f64; 24] = [
    70.0, 89.0, 112.0, 141.0, 177.0, 223.0, 281.0, 354.0, 446.0, 563.0, 709.0, 893.0, 1125.0,
    1417.0, 1786.0, 2250.0, 2835.0, 3572.0, 4500.0, 5670.0, 7143.0, 9000.0, 11339.0, 14287.0,
];

/// Lowest and highest accepted filter order (doubled by the zero-phase split)
pub const MIN_ORDER: usize = 1;
pub const MAX_ORDER: usize = 4;

/// Frequencies for a named preset ("dnl" or "tertz", case-insensitive)
pub fn preset_frequencies(name: &str) -> Option<&'static [f64]> {
    match name.to_ascii_lowercase().as_str() {
        "dnl" => Some(&DNL_CROSSOVERS),
        "tertz" => Some(&TERTZ_CROSSOVERS),
        _ => None,
    }
}

/// Order in which bands are split off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Direction {
    /// Low-pass at ascending crossovers, lowest band first
    Upward,
    /// High-pass at descending crossovers, highest band first
    #[default]
    Downward,
}

impl Direction {
    /// Parse leniently: unknown names resolve to [`Direction::Downward`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "upward" | "up" => Direction::Upward,
            _ => Direction::Downward,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upward => "upward",
            Direction::Downward => "downward",
        }
    }
}

impl From<String> for Direction {
    fn from(name: String) -> Self {
        Direction::from_name(&name)
    }
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        direction.as_str().to_string()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable crossover description
///
/// The order is clamped to `1..=4`; frequencies are sorted ascending and
/// deduplicated. An empty list falls back to the single `dnl` split.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverInfo {
    order: usize,
    direction: Direction,
    frequencies: Vec<f64>,
}

impl CrossoverInfo {
    pub fn new(
        direction: Direction,
        order: usize,
        frequencies: impl IntoIterator<Item = f64>,
    ) -> Result<Self> {
        let mut frequencies: Vec<f64> = frequencies.into_iter().collect();
        if let Some(bad) = frequencies.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(EngineError::InvalidCrossover(format!(
                "crossover frequency {} Hz must be positive",
                bad
            )));
        }
        frequencies.sort_by(f64::total_cmp);
        frequencies.dedup();
        if frequencies.is_empty() {
            frequencies.extend_from_slice(&DNL_CROSSOVERS);
        }

        Ok(Self {
            order: order.clamp(MIN_ORDER, MAX_ORDER),
            direction,
            frequencies,
        })
    }

    /// Crossover built from a named preset
    pub fn from_preset(name: &str, direction: Direction, order: usize) -> Result<Self> {
        let frequencies = preset_frequencies(name).ok_or_else(|| {
            EngineError::InvalidCrossover(format!(
                "unknown preset '{}' (expected dnl or tertz)",
                name
            ))
        })?;
        Self::new(direction, order, frequencies.iter().copied())
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Number of crossovers; there is always at least one
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn lowest(&self) -> f64 {
        self.frequencies[0]
    }

    pub fn highest(&self) -> f64 {
        self.frequencies[self.frequencies.len() - 1]
    }

    /// Number of bands produced by a split
    pub fn band_count(&self) -> usize {
        self.frequencies.len() + 1
    }

    /// Reject sample rates that are not finite and positive, and crossovers
    /// at or above Nyquist
    pub fn validate_for_sample_rate(&self, sample_rate: f64) -> Result<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSettings(format!(
                "sample rate must be finite and positive, got {}",
                sample_rate
            )));
        }
        let nyquist = 0.5 * sample_rate;
        if self.highest() >= nyquist {
            return Err(EngineError::InvalidCrossover(format!(
                "crossover {} Hz is not below Nyquist ({} Hz)",
                self.highest(),
                nyquist
            )));
        }
        Ok(())
    }
}

impl Default for CrossoverInfo {
    fn default() -> Self {
        Self {
            order: MAX_ORDER,
            direction: Direction::Downward,
            frequencies: DNL_CROSSOVERS.to_vec(),
        }
    }
}

impl fmt::Display for CrossoverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "crossovers {{direction={}; filter-order=2x{}; frequencies={:?}}}",
            self.direction, self.order, self.frequencies
        )
    }
}
