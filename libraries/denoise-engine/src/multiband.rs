//! Multi-band noise reduction of interleaved multi-channel signals

use crate::band_split::{BandReport, BandSplitFilterSet, ChannelOutput};
use crate::chain::FilterFactory;
use crate::crossover::CrossoverInfo;
use crate::detection::{
    DiscardFactory, IrregularCorrectorFactory, IrregularMarkerFactory, MaxRmsFactory,
    NoiseLevelDetectorFactory,
};
use crate::dynamics::NrDynamicsFactory;
use crate::error::{EngineError, Result};
use crate::pool::BufferSet;
use crate::reduction::NoiseReductionFactory;
use crate::settings::NrMeasurementSettings;
use crate::speakers::{channel_label, SpeakerLayout};
use crate::timings::DefaultTimings;
use serde::Serialize;
use std::thread;
use tracing::{debug, info};

/// Sample formats the filter reads and writes
pub trait Sample: Copy + Send + Sync {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// What was measured while filtering a signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseReport {
    pub sample_rate: f64,
    pub channels: usize,
    pub frames: usize,
    pub layout: Option<String>,
    pub latency_samples: usize,
    pub bands: Vec<BandReport>,
}

impl NoiseReport {
    pub fn channel_bands(&self, channel: usize) -> impl Iterator<Item = &BandReport> {
        self.bands.iter().filter(move |band| band.channel == channel)
    }

    /// Noise floor of all bands of `channel` together
    pub fn combined_noise_level(&self, channel: usize) -> Option<f64> {
        let mut levels = self
            .channel_bands(channel)
            .filter_map(|band| band.noise_level)
            .peekable();
        levels.peek()?;
        Some(levels.map(|level| level * level).sum::<f64>().sqrt())
    }
}

/// Splits every channel into bands, measures each band's noise floor and
/// reduces it
///
/// Band chain: max RMS, discard, noise level, then the irregular-noise
/// marker and corrector unless disabled, then the gain stage.
pub struct MultiBandNoiseFilter {
    crossover: CrossoverInfo,
    measurement: NrMeasurementSettings,
    dynamics: NrDynamicsFactory,
    timings: DefaultTimings,
    buffer_limit: Option<usize>,
}

impl MultiBandNoiseFilter {
    pub fn new(
        crossover: CrossoverInfo,
        measurement: NrMeasurementSettings,
        dynamics: NrDynamicsFactory,
        timings: DefaultTimings,
    ) -> Result<Self> {
        measurement.validate()?;
        Ok(Self {
            crossover,
            measurement,
            dynamics,
            timings,
            buffer_limit: None,
        })
    }

    /// Cap the number of band buffers alive at once
    pub fn with_buffer_limit(mut self, max_buffers: usize) -> Self {
        self.buffer_limit = Some(max_buffers);
        self
    }

    pub fn crossover(&self) -> &CrossoverInfo {
        &self.crossover
    }

    pub fn measurement(&self) -> &NrMeasurementSettings {
        &self.measurement
    }

    pub fn dynamics(&self) -> &NrDynamicsFactory {
        &self.dynamics
    }

    pub fn timings(&self) -> &DefaultTimings {
        &self.timings
    }

    /// Band filter chain for `sample_rate`, in processing order
    pub fn factories(&self, sample_rate: f64) -> Result<Vec<Box<dyn FilterFactory>>> {
        let values = self.measurement.with_sample_rate(sample_rate)?;
        let rated = self.timings.with_sample_rate(sample_rate)?;

        let mut factories: Vec<Box<dyn FilterFactory>> = vec![
            Box::new(MaxRmsFactory::new(&values)),
            Box::new(DiscardFactory::new(values.clone())),
            Box::new(NoiseLevelDetectorFactory::new(values.clone())),
        ];
        if self.measurement.irregular_noise_mode.is_enabled() {
            factories.push(Box::new(IrregularMarkerFactory::new(&values)));
            factories.push(Box::new(IrregularCorrectorFactory::new(
                rated.clone(),
                self.measurement.clone(),
            )));
        }
        factories.push(Box::new(NoiseReductionFactory::new(
            rated,
            self.dynamics,
            self.measurement.clone(),
        )));
        Ok(factories)
    }

    /// Filter interleaved `samples` in place
    ///
    /// Channels run in parallel. The samples are only written back if every
    /// channel succeeded; otherwise all failures are returned together.
    pub fn filter<S: Sample>(
        &self,
        samples: &mut [S],
        channels: usize,
        sample_rate: f64,
    ) -> Result<NoiseReport> {
        if channels == 0 {
            return Err(EngineError::InvalidBuffer(
                "channel count must be at least 1".to_string(),
            ));
        }
        if samples.len() % channels != 0 {
            return Err(EngineError::InvalidBuffer(format!(
                "{} samples are not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }
        let frames = samples.len() / channels;
        let factories = self.factories(sample_rate)?;
        let pool = match self.buffer_limit {
            Some(limit) => BufferSet::with_capacity(limit),
            None => BufferSet::new(),
        };
        let set = BandSplitFilterSet::new(pool, &factories, &self.crossover, sample_rate, frames)?;
        let layout = SpeakerLayout::for_channels(channels).ok();

        info!(
            channels,
            frames,
            sample_rate,
            layout = layout.map(|layout| layout.name()).unwrap_or("unknown"),
            crossover = %self.crossover,
            "Multi-band noise reduction"
        );
        debug!(
            dynamics = %self.dynamics,
            timings = %self.timings,
            offset = set.offset(),
            latency = set.latency(),
            "Band split parameters"
        );

        let mut report = NoiseReport {
            sample_rate,
            channels,
            frames,
            layout: layout.map(|layout| layout.to_string()),
            latency_samples: set.latency(),
            bands: Vec::new(),
        };
        if frames == 0 {
            return Ok(report);
        }

        let inputs: Vec<Vec<f64>> = (0..channels)
            .map(|channel| {
                samples
                    .iter()
                    .skip(channel)
                    .step_by(channels)
                    .map(|sample| sample.to_f64())
                    .collect()
            })
            .collect();

        let (outputs, failures) = thread::scope(|scope| {
            let mut workers = Vec::with_capacity(channels);
            let mut failures = Vec::new();
            for (channel, input) in inputs.iter().enumerate() {
                let set = &set;
                let spawned = thread::Builder::new()
                    .name(format!("channel {}", channel_label(channels, channel)))
                    .spawn_scoped(scope, move || set.filter_channel(channel, input));
                match spawned {
                    Ok(worker) => workers.push((channel, worker)),
                    Err(e) => failures.push(format!(
                        "channel {}: {}",
                        channel_label(channels, channel),
                        EngineError::from(e)
                    )),
                }
            }

            let mut outputs: Vec<(usize, ChannelOutput)> = Vec::with_capacity(channels);
            for (channel, worker) in workers {
                match worker.join() {
                    Ok(Ok(output)) => outputs.push((channel, output)),
                    Ok(Err(EngineError::Workers(list))) => failures.extend(list),
                    Ok(Err(e)) => failures.push(format!(
                        "channel {}: {}",
                        channel_label(channels, channel),
                        e
                    )),
                    Err(_) => failures.push(format!(
                        "channel {}: thread panicked",
                        channel_label(channels, channel)
                    )),
                }
            }
            (outputs, failures)
        });

        if !failures.is_empty() {
            return Err(EngineError::Workers(failures));
        }

        for (channel, output) in outputs {
            for (frame, &value) in samples
                .chunks_exact_mut(channels)
                .zip(output.samples.iter())
            {
                frame[channel] = S::from_f64(value);
            }
            report.bands.extend(output.bands);
        }
        report
            .bands
            .sort_by(|a, b| a.channel.cmp(&b.channel).then(a.lower_hz.total_cmp(&b.lower_hz)));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossover::Direction;
    use crate::timings::TimingSettings;

    fn filter(crossover: CrossoverInfo) -> MultiBandNoiseFilter {
        let timings = TimingSettings::default().to_timings(&crossover).unwrap();
        MultiBandNoiseFilter::new(
            crossover,
            NrMeasurementSettings::default(),
            NrDynamicsFactory::default(),
            timings,
        )
        .unwrap()
    }

    #[test]
    fn test_chain_depends_on_irregular_mode() {
        let crossover = CrossoverInfo::default();
        let names = |filter: &MultiBandNoiseFilter| -> Vec<String> {
            filter
                .factories(48000.0)
                .unwrap()
                .iter()
                .map(|factory| factory.name().to_string())
                .collect()
        };

        assert_eq!(
            names(&filter(crossover.clone())),
            vec![
                "max-rms",
                "discard",
                "noise-level",
                "irregular-marker",
                "irregular-corrector",
                "noise-reduction"
            ]
        );

        let timings = TimingSettings::default().to_timings(&crossover).unwrap();
        let without = MultiBandNoiseFilter::new(
            crossover,
            NrMeasurementSettings {
                irregular_noise_mode: crate::settings::IrregularNoiseMode::Off,
                ..Default::default()
            },
            NrDynamicsFactory::default(),
            timings,
        )
        .unwrap();
        assert_eq!(
            names(&without),
            vec!["max-rms", "discard", "noise-level", "noise-reduction"]
        );
    }

    #[test]
    fn test_rejects_partial_frames() {
        let filter = filter(CrossoverInfo::default());
        let mut samples = vec![0.0f32; 7];
        assert!(matches!(
            filter.filter(&mut samples, 2, 48000.0),
            Err(EngineError::InvalidBuffer(_))
        ));
        assert!(filter.filter(&mut samples, 0, 48000.0).is_err());
    }

    #[test]
    fn test_empty_signal_reports_no_bands() {
        let filter = filter(CrossoverInfo::default());
        let mut samples: Vec<f64> = Vec::new();
        let report = filter.filter(&mut samples, 2, 48000.0).unwrap();
        assert!(report.bands.is_empty());
        assert_eq!(report.layout.as_deref(), Some("stereo (FL FR)"));
    }

    #[test]
    fn test_stereo_reports_every_band_per_channel() {
        let crossover = CrossoverInfo::new(Direction::Downward, 2, [1000.0]).unwrap();
        let filter = filter(crossover);
        let mut samples: Vec<f32> = (0..48000)
            .map(|i| {
                let t = (i / 2) as f64 / 48000.0;
                (0.5 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as f32
            })
            .collect();

        let report = filter.filter(&mut samples, 2, 48000.0).unwrap();

        assert_eq!(report.frames, 24000);
        assert_eq!(report.bands.len(), 4);
        assert_eq!(report.channel_bands(1).count(), 2);
        assert!(report.bands.iter().all(|band| band.noise_level.is_some()));
        assert!(report.combined_noise_level(0).unwrap() > 0.0);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_report_json_shape() {
        let report = NoiseReport {
            sample_rate: 44100.0,
            channels: 1,
            frames: 10,
            layout: Some("mono (FC)".to_string()),
            latency_samples: 3,
            bands: vec![BandReport {
                channel: 0,
                lower_hz: 20.0,
                upper_hz: 4500.0,
                peak_level: Some(0.5),
                noise_level: None,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["layout"], "mono (FC)");
        assert_eq!(json["bands"][0]["upper_hz"], 4500.0);
        assert!(json["bands"][0]["noise_level"].is_null());
        assert_eq!(report.combined_noise_level(0), None);
    }

    #[test]
    fn test_invalid_sample_rate_leaves_samples_untouched() {
        let filter = filter(CrossoverInfo::default());
        let mut samples = vec![0.25f64; 100];
        assert!(filter.filter(&mut samples, 1, 8000.0).is_err());
        assert!(samples.iter().all(|&s| s == 0.25));
    }
}
