use crate::chain::{
    check_markers, BandFilter, BandMetadata, FilterFactory, FrequencyBand, MARKER_DISCARDED,
};
use crate::error::Result;
use crate::settings::NrMeasurementValues;
use denoise_dsp::{value_to_decibel, BucketScanner};
use tracing::trace;

/// Histogram resolution of [`WindowFrequencyDetector`]
pub const STEPS_PER_DB: f64 = 10.0;

/// Noise floor as the quietest noise window of the band
///
/// The level is clamped to `[max_rms / max_sn_ratio, max_rms / min_sn_ratio]`.
/// Until a whole window of measurable samples was seen, the geometric mean
/// of both bounds is reported instead.
pub struct MinimumWindowDetector {
    scanner: BucketScanner,
    max_rms: f64,
    absolute_minimum: f64,
    maximum_minimum: f64,
}

impl MinimumWindowDetector {
    pub fn new(values: &NrMeasurementValues, max_rms: f64) -> Result<Self> {
        Ok(Self {
            scanner: BucketScanner::new(values.noise_window_samples)?,
            max_rms,
            absolute_minimum: max_rms / values.max_sn_ratio,
            maximum_minimum: max_rms / values.min_sn_ratio,
        })
    }

    pub fn noise_level(&self) -> f64 {
        match self.scanner.min_rms() {
            Some(minimum) => minimum
                .max(self.absolute_minimum)
                .min(self.maximum_minimum),
            None => (self.absolute_minimum * self.maximum_minimum).sqrt(),
        }
    }
}

impl BandFilter for MinimumWindowDetector {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.reset();
        for (&sample, &marker) in samples.iter().zip(markers.iter()) {
            if marker & MARKER_DISCARDED == 0 {
                self.scanner.add_sample(sample)?;
            }
        }
        trace_level("minimum-window", self.noise_level(), self.max_rms, &self.scanner);
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::NoiseLevel(self.noise_level())
    }

    fn reset(&mut self) {
        self.scanner.reset();
    }

    fn name(&self) -> &str {
        "noise-level(minimum-window)"
    }
}

/// Noise floor as the most common quiet loudness of the band
///
/// Window RMS values are counted in bins of 0.1 dB above
/// `max_rms / max_sn_ratio`. Starting at the first non-empty bin the counts
/// are followed upward while they rise; the bin where they stop rising is
/// the reported noise floor (capped at `max_rms / min_sn_ratio`).
pub struct WindowFrequencyDetector {
    scanner: BucketScanner,
    histogram: Vec<u64>,
    max_rms: f64,
    min_rms: f64,
    maximum_minimum: f64,
}

impl WindowFrequencyDetector {
    pub fn new(values: &NrMeasurementValues, max_rms: f64) -> Result<Self> {
        let levels = (STEPS_PER_DB * value_to_decibel(values.max_sn_ratio) + 0.5).round();
        let levels = (levels.max(1.0)) as usize;
        Ok(Self {
            scanner: BucketScanner::new(values.noise_window_samples)?,
            histogram: vec![0; levels],
            max_rms,
            min_rms: max_rms / values.max_sn_ratio,
            maximum_minimum: max_rms / values.min_sn_ratio,
        })
    }

    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Bin index of `rms`, relative to the lowest measurable level
    fn bin(&self, rms: f64) -> usize {
        let relative = rms.max(self.min_rms) / self.min_rms;
        let step = (20.0 * STEPS_PER_DB * relative.log10()).round();
        (step.max(0.0) as usize).min(self.histogram.len() - 1)
    }

    /// First local maximum of the histogram above the empty low bins
    fn lowest_level_maximum(&self) -> usize {
        let Some(mut bin) = self.histogram.iter().position(|&count| count > 0) else {
            return 0;
        };
        while bin + 1 < self.histogram.len() && self.histogram[bin + 1] > self.histogram[bin] {
            bin += 1;
        }
        bin
    }

    pub fn noise_level(&self) -> f64 {
        if !self.scanner.is_whole_bucket_scanned() {
            return self.min_rms;
        }
        let bin = self.lowest_level_maximum() as f64;
        let measured = self.min_rms * 10f64.powf(bin / (20.0 * STEPS_PER_DB));
        measured.min(self.maximum_minimum)
    }
}

impl BandFilter for WindowFrequencyDetector {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.reset();
        let measurable = self.min_rms > 0.0;
        for (&sample, &marker) in samples.iter().zip(markers.iter()) {
            if marker & MARKER_DISCARDED != 0 {
                continue;
            }
            let rms = self.scanner.add_sample(sample)?;
            if measurable && self.scanner.is_whole_bucket_scanned() {
                let bin = self.bin(rms);
                self.histogram[bin] += 1;
            }
        }
        trace_level("window-frequency", self.noise_level(), self.max_rms, &self.scanner);
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::NoiseLevel(self.noise_level())
    }

    fn reset(&mut self) {
        self.scanner.reset();
        self.histogram.fill(0);
    }

    fn name(&self) -> &str {
        "noise-level(window-frequency)"
    }
}

fn trace_level(kind: &str, noise_level: f64, max_rms: f64, scanner: &BucketScanner) {
    trace!(
        kind,
        noise_db = value_to_decibel(noise_level),
        sn_db = value_to_decibel(max_rms / noise_level),
        window = scanner.bucket_size(),
        "Noise level detected"
    );
}

/// Creates the noise level detector selected by `frequency_scanning`
pub struct NoiseLevelDetectorFactory {
    values: NrMeasurementValues,
}

impl NoiseLevelDetectorFactory {
    pub fn new(values: NrMeasurementValues) -> Self {
        Self { values }
    }
}

impl FilterFactory for NoiseLevelDetectorFactory {
    fn create_filter(
        &self,
        metadata: BandMetadata,
        _band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        let max_rms = metadata.require_max_rms("noise-level")?;
        if self.values.settings.frequency_scanning {
            Ok(Box::new(WindowFrequencyDetector::new(&self.values, max_rms)?))
        } else {
            Ok(Box::new(MinimumWindowDetector::new(&self.values, max_rms)?))
        }
    }

    fn name(&self) -> &str {
        "noise-level"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::NrMeasurementSettings;

    /// 1 kHz sample rate, 10-sample noise window, S/N 30..75 dB
    fn values(frequency_scanning: bool) -> NrMeasurementValues {
        NrMeasurementSettings {
            noise_window: 0.01,
            frequency_scanning,
            ..Default::default()
        }
        .with_sample_rate(1000.0)
        .unwrap()
    }

    fn run(filter: &mut dyn BandFilter, samples: &[f64], markers: &mut [u8]) -> f64 {
        let mut samples = samples.to_vec();
        filter.process(&mut samples, markers).unwrap();
        filter.metadata().noise_level().unwrap()
    }

    #[test]
    fn test_minimum_window_finds_quiet_part() {
        let mut detector = MinimumWindowDetector::new(&values(false), 1.0).unwrap();
        let mut samples = vec![0.5; 100];
        samples.extend(std::iter::repeat(0.01).take(50));
        samples.extend(std::iter::repeat(0.5).take(100));
        let mut markers = vec![0u8; samples.len()];

        let level = run(&mut detector, &samples, &mut markers);
        assert!((level - 0.01).abs() < 1e-9, "level {}", level);
    }

    #[test]
    fn test_minimum_window_clamps() {
        let values = values(false);
        let mut detector = MinimumWindowDetector::new(&values, 1.0).unwrap();
        let samples = vec![0.5; 100];
        let mut markers = vec![0u8; 100];
        let level = run(&mut detector, &samples, &mut markers);
        assert!((level - 1.0 / values.min_sn_ratio).abs() < 1e-12);

        let samples = vec![0.0; 100];
        let level = run(&mut detector, &samples, &mut markers);
        assert!((level - 1.0 / values.max_sn_ratio).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_window_skips_discarded_samples() {
        let values = values(false);
        let mut detector = MinimumWindowDetector::new(&values, 1.0).unwrap();
        let mut samples = vec![0.02; 40];
        samples.extend(std::iter::repeat(0.0).take(40));
        let mut markers = vec![0u8; 80];
        for marker in markers[40..].iter_mut() {
            *marker = MARKER_DISCARDED;
        }
        let level = run(&mut detector, &samples, &mut markers);
        assert!((level - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_window_without_whole_bucket() {
        let values = values(false);
        let mut detector = MinimumWindowDetector::new(&values, 1.0).unwrap();
        let mut markers = vec![0u8; 5];
        let level = run(&mut detector, &[0.1; 5], &mut markers);
        let expected = (1.0 / (values.max_sn_ratio * values.min_sn_ratio)).sqrt();
        assert!((level - expected).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_reports_most_common_quiet_level() {
        let values = values(true);
        let mut detector = WindowFrequencyDetector::new(&values, 1.0).unwrap();
        // Long stretch at -50 dB and a shorter one at -40 dB
        let mut samples = vec![0.003_162_277_660_168_38; 400];
        samples.extend(std::iter::repeat(0.01).take(200));
        let mut markers = vec![0u8; samples.len()];

        let level = run(&mut detector, &samples, &mut markers);
        let db = value_to_decibel(level);
        assert!((db + 50.0).abs() < 0.1, "level {} dB", db);
    }

    #[test]
    fn test_histogram_bins() {
        let values = values(true);
        let detector = WindowFrequencyDetector::new(&values, 1.0).unwrap();
        let levels = detector.histogram().len();
        // 0.1 dB bins over 75 dB
        assert!((750..=751).contains(&levels));
        assert_eq!(detector.bin(0.0), 0);
        assert_eq!(detector.bin(detector.min_rms * 10.0), 200);
        assert_eq!(detector.bin(10.0), levels - 1);
    }

    #[test]
    fn test_histogram_before_whole_bucket() {
        let values = values(true);
        let mut detector = WindowFrequencyDetector::new(&values, 1.0).unwrap();
        let mut markers = vec![0u8; 3];
        let level = run(&mut detector, &[0.1; 3], &mut markers);
        assert!((level - 1.0 / values.max_sn_ratio).abs() < 1e-12);
    }

    #[test]
    fn test_silent_band_does_not_divide_by_zero() {
        let values = values(true);
        let mut detector = WindowFrequencyDetector::new(&values, 0.0).unwrap();
        let mut markers = vec![0u8; 50];
        let level = run(&mut detector, &[0.0; 50], &mut markers);
        assert_eq!(level, 0.0);
    }

    #[test]
    fn test_factory_selects_detector() {
        let band = FrequencyBand::new(20.0, 4500.0);
        let factory = NoiseLevelDetectorFactory::new(values(true));
        let filter = factory.create_filter(BandMetadata::MaxRms(1.0), band).unwrap();
        assert_eq!(filter.name(), "noise-level(window-frequency)");
        assert!(factory.create_filter(BandMetadata::None, band).is_err());

        let factory = NoiseLevelDetectorFactory::new(values(false));
        let filter = factory.create_filter(BandMetadata::MaxRms(1.0), band).unwrap();
        assert_eq!(filter.name(), "noise-level(minimum-window)");
    }
}
