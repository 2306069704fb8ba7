//! Look-ahead noise-reduction gain stage
//!
//! ```text
//!  input ─► DelayLine(latency - prediction) ─┬─► DelayLine(prediction) ─► × ─► output
//!                                            │                          ▲
//!                                            └─► Bucket RMS ─► Hold ─► Smooth ─► gain
//! ```
//!
//! The level is measured `prediction` samples ahead of the output, and the
//! held maximum keeps a transient's level for that long, so the gain is
//! already open when the transient reaches the output.

use crate::chain::{check_markers, BandFilter, BandMetadata, FilterFactory, FrequencyBand};
use crate::dynamics::{NrDynamics, NrDynamicsFactory};
use crate::error::Result;
use crate::settings::NrMeasurementSettings;
use crate::timings::RatedTimings;
use denoise_dsp::{BucketScanner, DelayLine, IntegrationFactors, SampleAndHoldMaximum};
use std::fmt;
use tracing::debug;

/// Noise level used when the previous stage did not provide a usable one
pub const FALLBACK_NOISE_LEVEL: f64 = 1e-3;

/// Sample counts of the gain stage for one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Times {
    pub measurement_samples: usize,
    pub attack_samples: usize,
    pub release_samples: usize,
    pub prediction_samples: usize,
}

impl Times {
    pub fn new(
        timings: &RatedTimings,
        settings: &NrMeasurementSettings,
        band_frequency: f64,
    ) -> Self {
        let measurement_samples = timings.measurement_samples(band_frequency);
        let attack_samples = timings.attack_samples(band_frequency);
        let release_samples = timings.release_samples(band_frequency);
        let rms_samples = timings.samples(0.5 * settings.rms_window);
        let window = measurement_samples.min(5 * attack_samples);
        let prediction_samples = rms_samples.min((window + 2 * attack_samples) / 2);

        Self {
            measurement_samples,
            attack_samples,
            release_samples,
            prediction_samples,
        }
    }
}

/// Attack/release-smoothed gain with look-ahead
pub struct NoiseReductionFilter {
    dynamics: NrDynamics,
    times: Times,
    sample_rate: f64,
    delay: DelayLine,
    prediction: DelayLine,
    scanner: BucketScanner,
    hold: SampleAndHoldMaximum,
    attack: IntegrationFactors,
    release: IntegrationFactors,
    level: f64,
}

impl NoiseReductionFilter {
    pub fn new(
        latency: usize,
        timings: &RatedTimings,
        settings: &NrMeasurementSettings,
        band_frequency: f64,
        dynamics: NrDynamics,
    ) -> Result<Self> {
        let times = Times::new(timings, settings, band_frequency);
        Ok(Self {
            dynamics,
            times,
            sample_rate: timings.sample_rate(),
            delay: DelayLine::new(latency.saturating_sub(times.prediction_samples)),
            prediction: DelayLine::new(times.prediction_samples),
            scanner: BucketScanner::new(times.measurement_samples)?,
            hold: SampleAndHoldMaximum::new(times.prediction_samples),
            attack: IntegrationFactors::new(times.attack_samples as f64),
            release: IntegrationFactors::new(times.release_samples as f64),
            level: 0.0,
        })
    }

    pub fn times(&self) -> Times {
        self.times
    }

    pub fn dynamics(&self) -> &NrDynamics {
        &self.dynamics
    }

    /// Total delay from input to output
    pub fn latency(&self) -> usize {
        self.delay.len() + self.prediction.len()
    }

    #[inline]
    pub fn filter(&mut self, input: f64) -> Result<f64> {
        let measured = self.delay.process(input);
        let output = self.prediction.process(measured);

        let rms = self.scanner.add_sample(measured)?;
        let held = self.hold.process(rms);
        let factors = if self.level < held {
            self.attack
        } else {
            self.release
        };
        self.level = factors.integrated(self.level, held);

        Ok(self.dynamics.gain(self.level) * output)
    }
}

impl fmt::Display for NoiseReductionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = |samples: usize| samples as f64 / self.sample_rate;
        write!(
            f,
            "noise-reduction: measurement-window={:.3}s; attack-time={:.3}s; release-time={:.3}s; prediction={:.3}s",
            seconds(self.times.measurement_samples),
            seconds(self.times.attack_samples),
            seconds(self.times.release_samples),
            seconds(self.times.prediction_samples)
        )
    }
}

impl BandFilter for NoiseReductionFilter {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        for sample in samples.iter_mut() {
            *sample = self.filter(*sample)?;
        }
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::None
    }

    fn reset(&mut self) {
        self.delay.reset();
        self.prediction.reset();
        self.scanner.reset();
        self.hold.reset();
        self.level = 0.0;
    }

    fn name(&self) -> &str {
        "noise-reduction"
    }
}

/// Creates [`NoiseReductionFilter`]s; all of them share one latency
pub struct NoiseReductionFactory {
    timings: RatedTimings,
    dynamics: NrDynamicsFactory,
    settings: NrMeasurementSettings,
    latency: usize,
}

impl NoiseReductionFactory {
    pub fn new(
        timings: RatedTimings,
        dynamics: NrDynamicsFactory,
        settings: NrMeasurementSettings,
    ) -> Self {
        let slowest = Times::new(&timings, &settings, timings.lowest_frequency());
        Self {
            latency: slowest.prediction_samples,
            timings,
            dynamics,
            settings,
        }
    }
}

impl FilterFactory for NoiseReductionFactory {
    fn create_filter(
        &self,
        metadata: BandMetadata,
        band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        let noise_level = metadata
            .noise_level()
            .filter(|level| level.is_finite() && *level > 0.0)
            .unwrap_or(FALLBACK_NOISE_LEVEL);
        let dynamics = self.dynamics.create(noise_level)?;
        let filter = NoiseReductionFilter::new(
            self.latency,
            &self.timings,
            &self.settings,
            band.lower,
            dynamics,
        )?;
        debug!(band = %band, "{}; {}", filter, dynamics);
        Ok(Box::new(filter))
    }

    fn latency(&self) -> usize {
        self.latency
    }

    fn name(&self) -> &str {
        "noise-reduction"
    }
}
