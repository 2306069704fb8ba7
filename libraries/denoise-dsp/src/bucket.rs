//! Sliding-window level statistics
//!
//! A [`BucketScanner`] keeps the last `bucket_size` squared samples and reports
//! their mean (and the minimum/maximum of that mean over time). Samples are
//! quantized to integers and summed exactly, so adding and removing millions
//! of samples never accumulates floating-point drift.

use crate::error::{DspError, Result};

/// Highest sample rate the quantization scale is designed for
pub const MAX_SAMPLE_RATE: f64 = 192_000.0;

/// Longest window (in seconds) at [`MAX_SAMPLE_RATE`] whose full-scale sum fits in 63 bits
pub const MAX_WINDOW_SECONDS: f64 = 1.0;

/// Quantization scale: a full-scale squared sample becomes `SCALE` units
pub const SCALE: f64 = i64::MAX as f64 / (MAX_SAMPLE_RATE * MAX_WINDOW_SECONDS);

/// Exact signed accumulator for quantized samples
///
/// Holds 127 bits of magnitude: with [`SCALE`] that is room for about
/// 3.5e24 full-scale squared samples, far beyond any window length. Leaving
/// that range is reported as [`DspError::AccumulatorOverflow`] instead of
/// wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExactSum(i128);

impl ExactSum {
    pub const ZERO: ExactSum = ExactSum(0);

    pub fn add(&mut self, value: i128) -> Result<()> {
        self.0 = self.0.checked_add(value).ok_or_else(|| {
            DspError::AccumulatorOverflow(format!("{} + {} exceeds 127 bits", self.0, value))
        })?;
        Ok(())
    }

    pub fn subtract(&mut self, value: i128) -> Result<()> {
        self.0 = self.0.checked_sub(value).ok_or_else(|| {
            DspError::AccumulatorOverflow(format!("{} - {} exceeds 127 bits", self.0, value))
        })?;
        Ok(())
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

/// Quantize a squared sample to accumulator units
fn quantize_squared(sample: f64) -> Result<i128> {
    let scaled = (sample * sample * SCALE).round();
    if !scaled.is_finite() || scaled >= i128::MAX as f64 {
        return Err(DspError::AccumulatorOverflow(format!(
            "sample {} cannot be quantized",
            sample
        )));
    }
    Ok(scaled as i128)
}

/// Sliding window of squared samples with exact running sum
#[derive(Debug, Clone)]
pub struct BucketScanner {
    bucket: Vec<i128>,
    sample_number: u64,
    sum: ExactSum,
    divisor: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl BucketScanner {
    /// Create a scanner over `bucket_size` samples
    pub fn new(bucket_size: usize) -> Result<Self> {
        if bucket_size < 1 {
            return Err(DspError::InvalidBucketSize(
                "bucket must hold at least one sample".to_string(),
            ));
        }

        Ok(Self {
            bucket: vec![0; bucket_size],
            sample_number: 0,
            sum: ExactSum::ZERO,
            divisor: SCALE * bucket_size as f64,
            minimum: None,
            maximum: None,
        })
    }

    /// Create a scanner covering `seconds` at `sample_rate`
    pub fn from_duration(sample_rate: f64, seconds: f64) -> Result<Self> {
        let samples = (seconds * sample_rate).round();
        if !samples.is_finite() || samples < 1.0 {
            return Err(DspError::InvalidBucketSize(format!(
                "{} s at {} Hz yields no samples",
                seconds, sample_rate
            )));
        }
        if samples > u32::MAX as f64 {
            return Err(DspError::InvalidBucketSize(format!(
                "{} s at {} Hz is too large: {} samples",
                seconds, sample_rate, samples
            )));
        }
        Self::new(samples as usize)
    }

    /// Add a sample; returns the RMS of the current window
    pub fn add_sample(&mut self, sample: f64) -> Result<f64> {
        let position = (self.sample_number % self.bucket.len() as u64) as usize;
        let quantized = quantize_squared(sample)?;

        self.sum.subtract(self.bucket[position])?;
        self.sum.add(quantized)?;
        self.bucket[position] = quantized;
        self.sample_number += 1;

        let mean_squared = self.mean_squared();
        if self.is_whole_bucket_scanned() {
            self.minimum = Some(self.minimum.map_or(mean_squared, |m| m.min(mean_squared)));
            self.maximum = Some(self.maximum.map_or(mean_squared, |m| m.max(mean_squared)));
        }

        Ok(mean_squared.sqrt())
    }

    pub fn reset(&mut self) {
        self.bucket.fill(0);
        self.sample_number = 0;
        self.sum = ExactSum::ZERO;
        self.minimum = None;
        self.maximum = None;
    }

    /// True once `bucket_size` samples were added since the last reset
    pub fn is_whole_bucket_scanned(&self) -> bool {
        self.sample_number >= self.bucket.len() as u64
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket.len()
    }

    /// Exact quantized sum of the window
    pub fn sum(&self) -> ExactSum {
        self.sum
    }

    /// Mean of the squared samples in the window
    pub fn mean_squared(&self) -> f64 {
        self.sum.as_f64() / self.divisor
    }

    pub fn rms(&self) -> f64 {
        self.mean_squared().sqrt()
    }

    /// Lowest window mean-square seen over complete windows
    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    /// Highest window mean-square seen over complete windows
    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    pub fn min_rms(&self) -> Option<f64> {
        self.minimum.map(f64::sqrt)
    }

    pub fn max_rms(&self) -> Option<f64> {
        self.maximum.map(f64::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_bucket() {
        assert!(BucketScanner::new(0).is_err());
        assert!(BucketScanner::from_duration(48000.0, 0.000001).is_err());
        assert_eq!(
            BucketScanner::from_duration(48000.0, 0.3).unwrap().bucket_size(),
            14400
        );
    }

    #[test]
    fn test_whole_bucket_flag() {
        let mut scanner = BucketScanner::new(4).unwrap();
        for _ in 0..3 {
            scanner.add_sample(0.5).unwrap();
            assert!(!scanner.is_whole_bucket_scanned());
            assert_eq!(scanner.minimum(), None);
        }
        scanner.add_sample(0.5).unwrap();
        assert!(scanner.is_whole_bucket_scanned());

        scanner.reset();
        assert!(!scanner.is_whole_bucket_scanned());
        assert_eq!(scanner.sum(), ExactSum::ZERO);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let mut scanner = BucketScanner::new(100).unwrap();
        let mut rms = 0.0;
        for _ in 0..250 {
            rms = scanner.add_sample(-0.25).unwrap();
        }
        assert!((rms - 0.25).abs() < 1e-9, "rms {} should be 0.25", rms);
        assert!((scanner.max_rms().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_track_window_levels() {
        let mut scanner = BucketScanner::new(10).unwrap();
        for _ in 0..20 {
            scanner.add_sample(0.1).unwrap();
        }
        for _ in 0..20 {
            scanner.add_sample(0.8).unwrap();
        }
        for _ in 0..20 {
            scanner.add_sample(0.1).unwrap();
        }
        assert!((scanner.min_rms().unwrap() - 0.1).abs() < 1e-9);
        assert!((scanner.max_rms().unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_returns_to_exact_zero() {
        let mut scanner = BucketScanner::new(7).unwrap();
        for i in 0..1000 {
            scanner.add_sample(((i * 37) % 101) as f64 / 101.0).unwrap();
        }
        for _ in 0..7 {
            scanner.add_sample(0.0).unwrap();
        }
        assert_eq!(scanner.sum().value(), 0);
        assert_eq!(scanner.mean_squared(), 0.0);
    }

    #[test]
    fn test_non_finite_sample_is_an_error() {
        let mut scanner = BucketScanner::new(4).unwrap();
        assert!(matches!(
            scanner.add_sample(f64::INFINITY),
            Err(DspError::AccumulatorOverflow(_))
        ));
        assert!(scanner.add_sample(f64::NAN).is_err());
    }

    #[test]
    fn test_exact_sum_overflow_is_reported() {
        let mut sum = ExactSum::ZERO;
        sum.add(i128::MAX).unwrap();
        assert!(matches!(sum.add(1), Err(DspError::AccumulatorOverflow(_))));
        let mut low = ExactSum::ZERO;
        low.subtract(i128::MAX).unwrap();
        assert!(low.subtract(2).is_err());
    }
}
