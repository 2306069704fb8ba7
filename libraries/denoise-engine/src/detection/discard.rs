use super::clear_marker_bit;
use crate::chain::{
    check_markers, BandFilter, BandMetadata, FilterFactory, FrequencyBand, MARKER_DISCARDED,
};
use crate::error::Result;
use crate::settings::NrMeasurementValues;
use denoise_dsp::BucketScanner;
use tracing::{trace, warn};

/// Marks samples that must not take part in noise measurement
///
/// The first `skip_start` and last `skip_end` samples of the window are
/// always marked. Elsewhere a window whose mean-square drops below
/// `(max_rms / max_sn_ratio)²` is a dropout: the whole window is marked on
/// first detection, then every following low sample until the level
/// recovers.
pub struct DiscardFilter {
    scanner: BucketScanner,
    max_rms: f64,
    threshold_squared: f64,
    skip_start: usize,
    skip_end: usize,
    wiping: bool,
    ignored: usize,
}

impl DiscardFilter {
    pub fn new(values: &NrMeasurementValues, max_rms: f64) -> Result<Self> {
        let threshold = max_rms / values.max_sn_ratio;
        Ok(Self {
            scanner: BucketScanner::new(values.skip_window_samples)?,
            max_rms,
            threshold_squared: threshold * threshold,
            skip_start: values.skip_start_samples,
            skip_end: values.skip_end_samples,
            wiping: false,
            ignored: 0,
        })
    }

    /// Samples marked during the last `process`
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    fn mark(&mut self, marker: &mut u8) {
        if *marker & MARKER_DISCARDED == 0 {
            *marker |= MARKER_DISCARDED;
            self.ignored += 1;
        }
    }
}

impl BandFilter for DiscardFilter {
    fn process(&mut self, samples: &mut [f64], markers: &mut [u8]) -> Result<()> {
        check_markers(samples, markers)?;
        self.reset();
        clear_marker_bit(markers, MARKER_DISCARDED);

        let len = samples.len();
        let end = len.saturating_sub(self.skip_end);
        let bucket_size = self.scanner.bucket_size();

        for (position, &sample) in samples.iter().enumerate() {
            if position < self.skip_start || position >= end {
                self.mark(&mut markers[position]);
                continue;
            }
            self.scanner.add_sample(sample)?;
            if !self.scanner.is_whole_bucket_scanned() {
                continue;
            }

            let low = self.scanner.mean_squared() < self.threshold_squared;
            if self.wiping {
                if low {
                    self.mark(&mut markers[position]);
                } else {
                    self.wiping = false;
                }
            } else if low {
                let first = (position + 1).saturating_sub(bucket_size);
                for marker in markers[first..=position].iter_mut() {
                    self.mark(marker);
                }
                self.wiping = true;
            }
        }

        if len > 0 && self.ignored * 10 >= len {
            warn!(
                ignored = self.ignored,
                total = len,
                "Discarded at least 10% of band samples from noise measurement"
            );
        } else {
            trace!(ignored = self.ignored, total = len, "Discarded samples");
        }
        Ok(())
    }

    fn metadata(&self) -> BandMetadata {
        BandMetadata::MaxRms(self.max_rms)
    }

    fn reset(&mut self) {
        self.scanner.reset();
        self.wiping = false;
        self.ignored = 0;
    }

    fn name(&self) -> &str {
        "discard"
    }
}

/// Creates [`DiscardFilter`]s; needs the peak level from [`super::MaxRmsDetector`]
pub struct DiscardFactory {
    values: NrMeasurementValues,
}

impl DiscardFactory {
    pub fn new(values: NrMeasurementValues) -> Self {
        Self { values }
    }
}

impl FilterFactory for DiscardFactory {
    fn create_filter(
        &self,
        metadata: BandMetadata,
        _band: FrequencyBand,
    ) -> Result<Box<dyn BandFilter>> {
        let max_rms = metadata.require_max_rms("discard")?;
        Ok(Box::new(DiscardFilter::new(&self.values, max_rms)?))
    }

    fn name(&self) -> &str {
        "discard"
    }
}
