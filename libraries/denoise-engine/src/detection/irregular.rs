use super::clear_marker_bit;
use crate::chain::{
    check_markers, BandFilter, BandMetadata, FilterFactory, FrequencyBand, MARKER_DISCARDED,
    MARKER_IRREGULAR,
};
use crate::error::Result;
use crate::settings::{NrMeasurementSettings, NrMeasurementValues};
use crate::timings::RatedTimings;
use denoise_dsp::{value_to_decibel, BucketScanner};
use tracing::{debug, info};

/// Windows below `noise_level * IRREGULAR_THRESHOLD_FACTOR` are marked
pub const IRREGULAR_THRESHOLD_FACTOR: f64 = 1.01;

/// Marks quiet regions around the noise floor for re-measurement
///
/// Discarded samples are skipped. On the first window below the threshold
/// the preceding `bucket_size` measurable samples are marked as well.
pub struct IrregularNoiseMarker {
    scanner: BucketScanner,
    noise_level: f64,
    threshold: f64,
    marking: bool,
    marks: usize,
}

impl IrregularNoiseMarker {
    pub fn new(bucket_size: usize, noise_level: f64) -> Result<Self> {
        Ok(Self {
            scanner: BucketScanner::new(bucket_size)?,
            noise_level,
            threshold: noise_level * IRREGULAR_THRESHOLD_FACTOR,
            marking: false,
            marks: 0,
        })
    }

    pub fn marks(&self) -> usize {
        self.marks
    }

    fn backfill(&mut self, markers: &mut [u8], position: usize) {
        let bucket_size = self.scanner.bucket_size();
        let mut marked = 0;
        for marker in markers[..=position].iter_mut().rev() {
            if marked == bucket_size {
                break;
            }
            if *marker & MARKER_DISCARDED == 0 {
                if *marker & MARKER_IRREGULAR == 0 {
                    self.marks += 1;
                }
                *marker |= MARKER_IRREGULAR;
                marked += 1;
            }
        }
    }
}

impl BandFilter for IrregularNoiseMarker {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.reset();
        clear_marker_bit(markers, MARKER_IRREGULAR);

        for (position, &sample) in samples.iter().enumerate() {
            if markers[position] & MARKER_DISCARDED != 0 {
                continue;
            }
            let rms = self.scanner.add_sample(sample)?;
            if !self.scanner.is_whole_bucket_scanned() {
                continue;
            }
            if self.marking {
                if rms < self.threshold {
                    markers[position] |= MARKER_IRREGULAR;
                    self.marks += 1;
                } else {
                    self.marking = false;
                }
            } else if rms < self.threshold {
                self.backfill(markers, position);
                self.marking = true;
            }
        }

        debug!(
            marks = self.marks,
            buckets = self.marks / self.scanner.bucket_size(),
            noise_db = value_to_decibel(self.noise_level),
            bucket_size = self.scanner.bucket_size(),
            "Marked samples for irregular noise measurement"
        );
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::NoiseLevel(self.noise_level)
    }

    fn reset(&mut self) {
        self.scanner.reset();
        self.marking = false;
        self.marks = 0;
    }

    fn name(&self) -> &str {
        "irregular-marker"
    }
}

/// Raises the noise level to the loudest window among marked samples
pub struct IrregularNoiseCorrector {
    scanner: BucketScanner,
    noise_level: f64,
    corrected: f64,
}

impl IrregularNoiseCorrector {
    pub fn new(bucket_size: usize, noise_level: f64) -> Result<Self> {
        Ok(Self {
            scanner: BucketScanner::new(bucket_size)?,
            noise_level,
            corrected: noise_level,
        })
    }

    pub fn corrected_noise_level(&self) -> f64 {
        self.corrected
    }
}

impl BandFilter for IrregularNoiseCorrector {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.reset();
        for (&sample, &marker) in samples.iter().zip(markers.iter()) {
            if marker & MARKER_IRREGULAR != 0 {
                self.scanner.add_sample(sample)?;
            }
        }

        if let Some(maximum) = self.scanner.max_rms() {
            self.corrected = maximum.max(self.noise_level);
        }
        if self.corrected > self.noise_level {
            info!(
                correction_db = format!("{:+.1}", value_to_decibel(self.corrected / self.noise_level)),
                bucket_size = self.scanner.bucket_size(),
                "Irregular noise level correction"
            );
        }
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::NoiseLevel(self.corrected)
    }

    fn reset(&mut self) {
        self.scanner.reset();
        self.corrected = self.noise_level;
    }

    fn name(&self) -> &str {
        "irregular-corrector"
    }
}

/// Creates [`IrregularNoiseMarker`]s with the noise window
pub struct IrregularMarkerFactory {
    bucket_size: usize,
}

impl IrregularMarkerFactory {
    pub fn new(values: &NrMeasurementValues) -> Self {
        Self {
            bucket_size: values.noise_window_samples.max(1),
        }
    }
}

impl FilterFactory for IrregularMarkerFactory {
    fn create_filter(
        &self,
        metadata: BandMetadata,
        _band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        let noise_level = metadata.require_noise_level("irregular-marker")?;
        Ok(Box::new(IrregularNoiseMarker::new(
            self.bucket_size,
            noise_level,
        )?))
    }

    fn name(&self) -> &str {
        "irregular-marker"
    }
}

/// Creates [`IrregularNoiseCorrector`]s with the band's effective
/// measurement window
pub struct IrregularCorrectorFactory {
    timings: RatedTimings,
    settings: NrMeasurementSettings,
}

impl IrregularCorrectorFactory {
    pub fn new(timings: RatedTimings, settings: NrMeasurementSettings) -> Self {
        Self { timings, settings }
    }
}

impl FilterFactory for IrregularCorrectorFactory {
    fn create_filter(
        &self,
        metadata: BandMetadata,
        band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        let noise_level = metadata.require_noise_level("irregular-corrector")?;
        let bucket_size = self
            .timings
            .effective_measurement_samples(&self.settings, band.lower);
        Ok(Box::new(IrregularNoiseCorrector::new(
            bucket_size,
            noise_level,
        )?))
    }

    fn name(&self) -> &str {
        "irregular-corrector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn irregular(markers: &[u8]) -> Vec<usize> {
        markers
            .iter()
            .enumerate()
            .filter(|(_, m)| **m & MARKER_IRREGULAR != 0)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_marks_quiet_region_with_backfill() {
        let mut marker = IrregularNoiseMarker::new(4, 0.1).unwrap();
        let mut samples = vec![0.5; 20];
        for s in samples[8..14].iter_mut() {
            *s = 0.1;
        }
        let mut markers = vec![0u8; 20];

        marker.process(&mut samples, &mut markers).unwrap();

        // Window 8..=11 is the first quiet one; it stays quiet through 13
        assert_eq!(irregular(&markers), (8..14).collect::<Vec<_>>());
        assert_eq!(marker.metadata(), BandMetadata::NoiseLevel(0.1));
        assert_eq!(marker.marks(), 6);
    }

    #[test]
    fn test_backfill_skips_discarded_and_stops_at_start() {
        let mut marker = IrregularNoiseMarker::new(4, 0.1).unwrap();
        let mut samples = vec![0.05; 6];
        let mut markers = vec![0u8, MARKER_DISCARDED, 0, 0, 0, 0];

        marker.process(&mut samples, &mut markers).unwrap();

        // First whole bucket at index 4 backfills 4, 3, 2 and 0
        assert_eq!(irregular(&markers), vec![0, 2, 3, 4, 5]);
        assert_eq!(markers[1], MARKER_DISCARDED);
    }

    #[test]
    fn test_corrector_raises_to_loudest_marked_window() {
        let mut corrector = IrregularNoiseCorrector::new(2, 0.1).unwrap();
        let mut samples = vec![1.0, 0.2, 0.2, 0.05, 0.05, 1.0];
        let mut markers = vec![0u8; 6];
        for marker in markers[1..5].iter_mut() {
            *marker = MARKER_IRREGULAR;
        }

        corrector.process(&mut samples, &mut markers).unwrap();

        let level = corrector.metadata().noise_level().unwrap();
        assert!((level - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_corrector_never_lowers() {
        let mut corrector = IrregularNoiseCorrector::new(2, 0.1).unwrap();
        let mut samples = vec![0.01; 10];
        let mut markers = vec![MARKER_IRREGULAR; 10];
        corrector.process(&mut samples, &mut markers).unwrap();
        assert_eq!(corrector.corrected_noise_level(), 0.1);

        // Too few marked samples for a whole window
        let mut markers = vec![0u8; 10];
        markers[0] = MARKER_IRREGULAR;
        corrector.process(&mut samples, &mut markers).unwrap();
        assert_eq!(corrector.corrected_noise_level(), 0.1);
    }

    #[test]
    fn test_factories_require_noise_level() {
        let band = FrequencyBand::new(20.0, 4500.0);
        let values = NrMeasurementSettings::default()
            .with_sample_rate(48000.0)
            .unwrap();
        let factory = IrregularMarkerFactory::new(&values);
        assert!(factory.create_filter(BandMetadata::MaxRms(1.0), band).is_err());
        assert!(factory
            .create_filter(BandMetadata::NoiseLevel(0.01), band)
            .is_ok());
    }
}
