//! Peak followers: sample-and-hold maximum and smooth-release variants

use crate::integration::{DoubleIntegrator, IntegrationFactors};

/// Follows rising input immediately and holds each new maximum for
/// `hold_count` samples before following the input down again
#[derive(Debug, Clone)]
pub struct SampleAndHoldMaximum {
    hold_count: usize,
    count_down: usize,
    value: f64,
}

impl SampleAndHoldMaximum {
    pub fn new(hold_count: usize) -> Self {
        Self {
            hold_count,
            count_down: 0,
            value: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, sample: f64) -> f64 {
        if sample > self.value {
            self.value = sample;
            self.count_down = self.hold_count;
        } else if self.count_down > 0 {
            self.count_down -= 1;
        } else {
            self.value = sample;
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn hold_count(&self) -> usize {
        self.hold_count
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.count_down = 0;
    }
}

/// Sample-and-hold maximum that releases through a double integrator
/// instead of dropping straight to the input
#[derive(Debug, Clone)]
pub struct SampleAndHoldMaximumSmoothRelease {
    hold_count: usize,
    count_down: usize,
    release: DoubleIntegrator,
}

impl SampleAndHoldMaximumSmoothRelease {
    pub fn new(hold_count: usize, release: IntegrationFactors) -> Self {
        Self {
            hold_count,
            count_down: 0,
            release: DoubleIntegrator::new(release),
        }
    }

    pub fn process(&mut self, sample: f64) -> f64 {
        if sample > self.release.value() {
            self.release.set_value(sample);
            self.count_down = self.hold_count;
        } else if self.count_down > 0 {
            self.count_down -= 1;
        } else {
            self.release.integrate(sample);
        }
        self.release.value()
    }

    pub fn value(&self) -> f64 {
        self.release.value()
    }

    pub fn set_value(&mut self, value: f64) {
        self.release.set_value(value);
    }
}

/// Peak follower without hold: rises instantly, releases through two
/// integrators with independent time constants
#[derive(Debug, Clone)]
pub struct SmoothRelease {
    first: IntegrationFactors,
    second: IntegrationFactors,
    intermediate: f64,
    value: f64,
}

impl SmoothRelease {
    pub fn new(first_count: f64, second_count: f64) -> Self {
        Self {
            first: IntegrationFactors::new(first_count),
            second: IntegrationFactors::new(second_count),
            intermediate: 0.0,
            value: 0.0,
        }
    }

    pub fn process(&mut self, sample: f64) -> f64 {
        if sample > self.value {
            self.value = sample;
            self.intermediate = sample;
        } else {
            self.intermediate = self.first.integrated(self.intermediate, sample);
            self.value = self.second.integrated(self.value, self.intermediate);
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
        self.intermediate = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_keeps_peak_for_hold_count() {
        let mut hold = SampleAndHoldMaximum::new(3);
        assert_eq!(hold.process(1.0), 1.0);
        assert_eq!(hold.process(0.2), 1.0);
        assert_eq!(hold.process(0.2), 1.0);
        assert_eq!(hold.process(0.2), 1.0);
        assert_eq!(hold.process(0.2), 0.2);
    }

    #[test]
    fn test_hold_restarts_on_new_peak() {
        let mut hold = SampleAndHoldMaximum::new(2);
        hold.process(0.5);
        hold.process(0.1);
        assert_eq!(hold.process(0.7), 0.7);
        assert_eq!(hold.process(0.1), 0.7);
        assert_eq!(hold.process(0.1), 0.7);
        assert_eq!(hold.process(0.1), 0.1);
    }

    #[test]
    fn test_zero_hold_follows_input() {
        let mut hold = SampleAndHoldMaximum::new(0);
        assert_eq!(hold.process(0.5), 0.5);
        assert_eq!(hold.process(0.25), 0.25);
    }

    #[test]
    fn test_smooth_release_decays_gradually() {
        let mut hold = SampleAndHoldMaximumSmoothRelease::new(2, IntegrationFactors::new(10.0));
        hold.process(1.0);
        hold.process(0.0);
        hold.process(0.0);
        let first = hold.process(0.0);
        let second = hold.process(0.0);
        assert!(first < 1.0 && first > 0.0);
        assert!(second < first);
    }

    #[test]
    fn test_smooth_release_without_hold() {
        let mut follower = SmoothRelease::new(5.0, 5.0);
        assert_eq!(follower.process(0.8), 0.8);
        let released = follower.process(0.0);
        assert!(released < 0.8 && released > 0.0);
        assert_eq!(follower.process(0.9), 0.9);
    }
}
