//! Exponential integration (one-pole smoothing)
//!
//! An integrator with a characteristic count of `n` samples decays by
//! `e^(-1/n)` per sample; the input is weighted by `1 - e^(-1/n)` so a
//! constant input converges to itself.

/// Largest history factor: still distinguishable from one
pub const MAX_HISTORY: f64 = 1.0 - 10.0 * f64::EPSILON;

/// Smallest history factor worth integrating with
pub const MIN_HISTORY: f64 = 10.0 * f64::EPSILON;

/// Counts below this produce no history at all
pub fn min_count() -> f64 {
    -1.0 / MIN_HISTORY.ln()
}

/// Counts above this are clamped to [`MAX_HISTORY`]
pub fn max_count() -> f64 {
    -1.0 / MAX_HISTORY.ln()
}

/// History (decay) factor for a characteristic sample count
pub fn history_from_count(count: f64) -> f64 {
    if count < min_count() {
        0.0
    } else if count > max_count() {
        MAX_HISTORY
    } else {
        (-1.0 / count).exp()
    }
}

/// Characteristic sample count for a history factor
pub fn count_from_history(history: f64) -> f64 {
    -1.0 / history.ln()
}

/// Input weight for a history factor, scaled by `scale`
pub fn input_from_history(history: f64, scale: f64) -> f64 {
    scale * (1.0 - history)
}

/// Per-sample decay for an RC constant of `samples`; zero for tiny constants
pub fn characteristic_decay_per_sample(samples: f64) -> f64 {
    if samples < 1e-2 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

/// Input weight matching [`characteristic_decay_per_sample`]
pub fn characteristic_sample_multiplication(samples: f64) -> f64 {
    if samples < 1e-2 {
        1.0
    } else {
        1.0 - (-1.0 / samples).exp()
    }
}

/// History and input weights of a one-pole integrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationFactors {
    history: f64,
    input: f64,
}

impl Default for IntegrationFactors {
    /// Pass-through: no history, unit input
    fn default() -> Self {
        Self {
            history: 0.0,
            input: 1.0,
        }
    }
}

impl IntegrationFactors {
    pub fn new(count: f64) -> Self {
        Self::with_scale(count, 1.0)
    }

    pub fn with_scale(count: f64, scale: f64) -> Self {
        let history = history_from_count(count);
        Self {
            history,
            input: input_from_history(history, scale),
        }
    }

    pub fn history(&self) -> f64 {
        self.history
    }

    pub fn input(&self) -> f64 {
        self.input
    }

    pub fn count(&self) -> f64 {
        count_from_history(self.history)
    }

    #[inline]
    pub fn integrated(&self, previous: f64, input: f64) -> f64 {
        self.history * previous + self.input * input
    }
}

/// One-pole integrator
#[derive(Debug, Clone)]
pub struct Integrator {
    factors: IntegrationFactors,
    value: f64,
}

impl Integrator {
    pub fn new(factors: IntegrationFactors) -> Self {
        Self { factors, value: 0.0 }
    }

    pub fn integrate(&mut self, sample: f64) -> f64 {
        self.value = self.factors.integrated(self.value, sample);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn factors(&self) -> IntegrationFactors {
        self.factors
    }
}

/// Two cascaded one-pole integrators sharing the same factors
#[derive(Debug, Clone)]
pub struct DoubleIntegrator {
    factors: IntegrationFactors,
    first: f64,
    second: f64,
}

impl DoubleIntegrator {
    pub fn new(factors: IntegrationFactors) -> Self {
        Self {
            factors,
            first: 0.0,
            second: 0.0,
        }
    }

    pub fn integrate(&mut self, sample: f64) -> f64 {
        self.first = self.factors.integrated(self.first, sample);
        self.second = self.factors.integrated(self.second, self.first);
        self.second
    }

    pub fn value(&self) -> f64 {
        self.second
    }

    pub fn set_value(&mut self, value: f64) {
        self.first = value;
        self.second = value;
    }

    pub fn factors(&self) -> IntegrationFactors {
        self.factors
    }
}
