use crate::chain::{check_markers, BandFilter, BandMetadata, FilterFactory, FrequencyBand};
use crate::error::Result;
use crate::settings::NrMeasurementValues;
use denoise_dsp::{value_to_decibel, BucketScanner};
use tracing::trace;

/// Pass-through stage that records the loudest RMS window of a band
pub struct MaxRmsDetector {
    scanner: BucketScanner,
}

impl MaxRmsDetector {
    pub fn new(bucket_size: usize) -> Result<Self> {
        Ok(Self {
            scanner: BucketScanner::new(bucket_size)?,
        })
    }

    /// Loudest window RMS; the partial-window RMS if the band is shorter
    /// than one window
    pub fn max_rms(&self) -> f64 {
        self.scanner.max_rms().unwrap_or_else(|| self.scanner.rms())
    }
}

impl BandFilter for MaxRmsDetector {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.scanner.reset();
        for &sample in samples.iter() {
            self.scanner.add_sample(sample)?;
        }
        let max_rms = self.max_rms();
        trace!(
            max_rms,
            decibel = value_to_decibel(max_rms),
            "Max RMS detected"
        );
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::MaxRms(self.max_rms())
    }

    fn reset(&mut self) {
        self.scanner.reset();
    }

    fn name(&self) -> &str {
        "max-rms"
    }
}

/// Creates [`MaxRmsDetector`]s with the RMS window
pub struct MaxRmsFactory {
    bucket_size: usize,
}

impl MaxRmsFactory {
    pub fn new(values: &NrMeasurementValues) -> Self {
        Self {
            bucket_size: values.rms_window_samples.max(1),
        }
    }
}

impl FilterFactory for MaxRmsFactory {
    fn create_filter(
        &self,
        _metadata: BandMetadata,
        _band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        Ok(Box::new(MaxRmsDetector::new(self.bucket_size)?))
    }

    fn name(&self) -> &str {
        "max-rms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_loudest_window() {
        let mut detector = MaxRmsDetector::new(4).unwrap();
        let mut samples = vec![0.1, -0.1, 0.1, -0.1, 0.5, -0.5, 0.5, -0.5, 0.1, 0.1];
        let original = samples.clone();
        let mut markers = vec![0u8; samples.len()];

        detector.process(&mut samples, &mut markers).unwrap();

        assert_eq!(samples, original);
        let level = detector.metadata().max_rms().unwrap();
        assert!((level - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_band_uses_partial_window() {
        let mut detector = MaxRmsDetector::new(100).unwrap();
        let mut samples = vec![1.0; 25];
        let mut markers = vec![0u8; 25];
        detector.process(&mut samples, &mut markers).unwrap();
        // 25 of 100 squared ones
        assert!((detector.max_rms() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_mismatched_markers() {
        let mut detector = MaxRmsDetector::new(4).unwrap();
        let mut samples = vec![0.0; 8];
        let mut markers = vec![0u8; 7];
        assert!(detector.process(&mut samples, &mut markers).is_err());
    }
}
