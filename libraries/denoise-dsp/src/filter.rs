//! Recursive (IIR) filters in direct form
//!
//! Both filter types evaluate
//!
//! ```text
//! y[n] = c0*x[n] + c1*x[n-1] + ... + cN*x[n-N] - (d1*y[n-1] + ... + dN*y[n-N])
//! ```
//!
//! `DirectForm<N>` keeps its history on the stack and is used for the
//! common orders 1-4; `NthOrderFilter` handles any order.
//!
//! ```
//! use denoise_dsp::{DirectForm, Filter};
//!
//! // One-pole smoother: y[n] = 0.5 x[n] + 0.5 y[n-1]
//! let mut smoother = DirectForm::<1>::new(&[0.5, 0.0], &[1.0, -0.5])?;
//! assert_eq!(smoother.filter(1.0), 0.5);
//! assert_eq!(smoother.filter(1.0), 0.75);
//! smoother.reset();
//! assert_eq!(smoother.filter(0.0), 0.0);
//! # Ok::<(), denoise_dsp::DspError>(())
//! ```

use crate::error::{DspError, Result};

/// A stateful single-sample filter
pub trait Filter: Send {
    /// Filter one sample
    fn filter(&mut self, sample: f64) -> f64;

    /// Zero all history, keeping coefficients
    fn reset(&mut self);

    /// Filter order (number of history taps)
    fn order(&self) -> usize;
}

fn check_coefficients(c: &[f64], d: &[f64], order: usize) -> Result<()> {
    if order == 0 {
        return Err(DspError::InvalidOrder(0));
    }
    if c.len() != order + 1 || d.len() != order + 1 {
        return Err(DspError::InvalidArgument(format!(
            "order {} needs {} c and d coefficients, got {} and {}",
            order,
            order + 1,
            c.len(),
            d.len()
        )));
    }
    Ok(())
}

/// Direct-form filter with a compile-time order
#[derive(Debug, Clone)]
pub struct DirectForm<const N: usize> {
    c0: f64,
    c: [f64; N],
    d: [f64; N],
    x: [f64; N],
    y: [f64; N],
}

impl<const N: usize> DirectForm<N> {
    /// Create from `N + 1` feed-forward (c) and feedback (d) coefficients.
    ///
    /// `d[0]` is the implicit output weight and is ignored.
    pub fn new(c: &[f64], d: &[f64]) -> Result<Self> {
        check_coefficients(c, d, N)?;

        let mut cs = [0.0; N];
        let mut ds = [0.0; N];
        cs.copy_from_slice(&c[1..]);
        ds.copy_from_slice(&d[1..]);

        Ok(Self {
            c0: c[0],
            c: cs,
            d: ds,
            x: [0.0; N],
            y: [0.0; N],
        })
    }
}

impl<const N: usize> Filter for DirectForm<N> {
    #[inline]
    fn filter(&mut self, sample: f64) -> f64 {
        let mut output = self.c0 * sample;
        for i in 0..N {
            output += self.c[i] * self.x[i] - self.d[i] * self.y[i];
        }

        self.x.copy_within(0..N - 1, 1);
        self.y.copy_within(0..N - 1, 1);
        self.x[0] = sample;
        self.y[0] = output;

        output
    }

    fn reset(&mut self) {
        self.x = [0.0; N];
        self.y = [0.0; N];
    }

    fn order(&self) -> usize {
        N
    }
}

/// Direct-form filter of arbitrary order
#[derive(Debug, Clone)]
pub struct NthOrderFilter {
    c: Vec<f64>,
    d: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl NthOrderFilter {
    /// Create from `order + 1` c and d coefficients
    pub fn new(c: Vec<f64>, d: Vec<f64>) -> Result<Self> {
        let order = c.len().saturating_sub(1);
        check_coefficients(&c, &d, order)?;

        Ok(Self {
            c,
            d,
            x: vec![0.0; order],
            y: vec![0.0; order],
        })
    }
}

impl Filter for NthOrderFilter {
    fn filter(&mut self, sample: f64) -> f64 {
        let order = self.x.len();
        let mut output = self.c[0] * sample;
        for i in 0..order {
            output += self.c[i + 1] * self.x[i] - self.d[i + 1] * self.y[i];
        }

        self.x.copy_within(0..order - 1, 1);
        self.y.copy_within(0..order - 1, 1);
        self.x[0] = sample;
        self.y[0] = output;

        output
    }

    fn reset(&mut self) {
        self.x.fill(0.0);
        self.y.fill(0.0);
    }

    fn order(&self) -> usize {
        self.x.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_coefficient_count() {
        assert!(DirectForm::<2>::new(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
        assert!(NthOrderFilter::new(vec![1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_moving_average_as_fir() {
        // c = [0.5, 0.5], no feedback: two-tap average
        let mut filter = DirectForm::<1>::new(&[0.5, 0.5], &[1.0, 0.0]).unwrap();
        assert_eq!(filter.filter(1.0), 0.5);
        assert_eq!(filter.filter(1.0), 1.0);
        assert_eq!(filter.filter(0.0), 0.5);
    }

    #[test]
    fn test_direct_form_matches_nth_order() {
        let c = [0.1, 0.3, 0.3, 0.1];
        let d = [1.0, -0.5, 0.2, -0.05];
        let mut fixed = DirectForm::<3>::new(&c, &d).unwrap();
        let mut generic = NthOrderFilter::new(c.to_vec(), d.to_vec()).unwrap();

        for i in 0..200 {
            let x = ((i * 7) % 13) as f64 / 13.0 - 0.5;
            let a = fixed.filter(x);
            let b = generic.filter(x);
            assert!((a - b).abs() < 1e-12, "sample {}: {} != {}", i, a, b);
        }
    }

    #[test]
    fn test_reset_clears_every_tap() {
        let c = [0.2, 0.2, 0.2, 0.2, 0.2];
        let d = [1.0, 0.1, 0.1, 0.1, 0.1];
        let mut filter = DirectForm::<4>::new(&c, &d).unwrap();
        for _ in 0..10 {
            filter.filter(1.0);
        }
        filter.reset();
        // With all four x and y taps zeroed, silence in gives silence out
        for _ in 0..8 {
            assert_eq!(filter.filter(0.0), 0.0);
        }
    }
}
