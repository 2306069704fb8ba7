//! Butterworth low-pass and high-pass filter design
//!
//! Coefficients follow the bilinear-transform design: the denominator is the
//! product of `n` first-order complex binomials built from the pre-warped
//! pole angles, the numerator is the binomial expansion of `(1 + z^-1)^n`
//! (alternating signs for high-pass) scaled so that the pass band has a gain
//! of exactly one.

use crate::error::{DspError, Result};
use crate::filter::{DirectForm, Filter, NthOrderFilter};
use std::f64::consts::PI;

/// Filter response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    LowPass,
    HighPass,
}

impl std::fmt::Display for PassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassType::LowPass => write!(f, "low-pass"),
            PassType::HighPass => write!(f, "high-pass"),
        }
    }
}

/// Butterworth filter of any order
///
/// Orders 1-4 use stack-allocated direct-form filters, anything higher uses
/// the generic [`NthOrderFilter`].
#[derive(Debug, Clone)]
pub enum Butterworth {
    First(DirectForm<1>),
    Second(DirectForm<2>),
    Third(DirectForm<3>),
    Fourth(DirectForm<4>),
    Nth(NthOrderFilter),
}

/// Create a Butterworth filter
///
/// # Arguments
/// * `cutoff` - Cutoff frequency as a fraction of the sample rate, in (0, 0.5]
/// * `order` - Filter order, at least 1
/// * `pass_type` - Low-pass or high-pass response
pub fn create(cutoff: f64, order: usize, pass_type: PassType) -> Result<Butterworth> {
    validate(cutoff, order)?;

    let (c, d) = coefficients(cutoff, order, pass_type);
    tracing::trace!(
        "Butterworth {} order {} at {:.6} fs: c={:?} d={:?}",
        pass_type,
        order,
        cutoff,
        c,
        d
    );

    let filter = match order {
        1 => Butterworth::First(DirectForm::new(&c, &d)?),
        2 => Butterworth::Second(DirectForm::new(&c, &d)?),
        3 => Butterworth::Third(DirectForm::new(&c, &d)?),
        4 => Butterworth::Fourth(DirectForm::new(&c, &d)?),
        _ => Butterworth::Nth(NthOrderFilter::new(c, d)?),
    };

    Ok(filter)
}

impl Filter for Butterworth {
    #[inline]
    fn filter(&mut self, sample: f64) -> f64 {
        match self {
            Butterworth::First(f) => f.filter(sample),
            Butterworth::Second(f) => f.filter(sample),
            Butterworth::Third(f) => f.filter(sample),
            Butterworth::Fourth(f) => f.filter(sample),
            Butterworth::Nth(f) => f.filter(sample),
        }
    }

    fn reset(&mut self) {
        match self {
            Butterworth::First(f) => f.reset(),
            Butterworth::Second(f) => f.reset(),
            Butterworth::Third(f) => f.reset(),
            Butterworth::Fourth(f) => f.reset(),
            Butterworth::Nth(f) => f.reset(),
        }
    }

    fn order(&self) -> usize {
        match self {
            Butterworth::First(f) => f.order(),
            Butterworth::Second(f) => f.order(),
            Butterworth::Third(f) => f.order(),
            Butterworth::Fourth(f) => f.order(),
            Butterworth::Nth(f) => f.order(),
        }
    }
}

fn validate(cutoff: f64, order: usize) -> Result<()> {
    if order < 1 {
        return Err(DspError::InvalidOrder(order));
    }
    if !cutoff.is_finite() || cutoff <= 0.0 || cutoff > 0.5 {
        return Err(DspError::InvalidCutoff(cutoff));
    }
    Ok(())
}

/// Feed-forward (c) and feedback (d) coefficients, each `order + 1` long
pub fn coefficients(cutoff: f64, order: usize, pass_type: PassType) -> (Vec<f64>, Vec<f64>) {
    let d = d_coefficients(order, cutoff);
    let scale = match pass_type {
        PassType::LowPass => low_pass_scaling_factor(order, cutoff),
        PassType::HighPass => high_pass_scaling_factor(order, cutoff),
    };
    let c = binomial_coefficients(order)
        .into_iter()
        .enumerate()
        .map(|(k, b)| {
            let sign = if pass_type == PassType::HighPass && k % 2 == 1 {
                -1.0
            } else {
                1.0
            };
            sign * scale * b
        })
        .collect();

    (c, d)
}

/// Multiply `n` complex binomials `(z + p_k)` given as interleaved re/im pairs.
///
/// Returns the `n` non-leading coefficients of the product, interleaved.
fn binomial_multiply(poles: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut a = vec![(0.0, 0.0); poles.len()];

    for (i, &(pr, pi)) in poles.iter().enumerate() {
        for j in (1..=i).rev() {
            let (ar, ai) = a[j - 1];
            a[j].0 += pr * ar - pi * ai;
            a[j].1 += pr * ai + pi * ar;
        }
        a[0].0 += pr;
        a[0].1 += pi;
    }

    a
}

fn d_coefficients(order: usize, cutoff: f64) -> Vec<f64> {
    let theta = 2.0 * PI * cutoff;
    let (st, ct) = theta.sin_cos();

    let poles: Vec<(f64, f64)> = (0..order)
        .map(|k| {
            let parg = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            let (sparg, cparg) = parg.sin_cos();
            let a = 1.0 + st * sparg;
            (-ct / a, -st * cparg / a)
        })
        .collect();

    let product = binomial_multiply(&poles);

    let mut d = Vec::with_capacity(order + 1);
    d.push(1.0);
    d.extend(product.iter().map(|&(re, _)| re));
    d
}

fn binomial_coefficients(order: usize) -> Vec<f64> {
    let mut c = vec![0.0; order + 1];
    c[0] = 1.0;
    for k in 1..=order {
        c[k] = c[k - 1] * (order - k + 1) as f64 / k as f64;
    }
    c
}

fn pole_product(order: usize, omega: f64) -> f64 {
    let fomega = omega.sin();
    let parg0 = PI / (2 * order) as f64;
    (0..order / 2)
        .map(|k| 1.0 + fomega * ((2 * k + 1) as f64 * parg0).sin())
        .product()
}

fn low_pass_scaling_factor(order: usize, cutoff: f64) -> f64 {
    let omega = 2.0 * PI * cutoff;
    let (half_sin, half_cos) = (omega / 2.0).sin_cos();

    let mut sf = pole_product(order, omega);
    if order % 2 == 1 {
        sf *= half_sin + half_cos;
    }
    half_sin.powi(order as i32) / sf
}

fn high_pass_scaling_factor(order: usize, cutoff: f64) -> f64 {
    let omega = 2.0 * PI * cutoff;
    let (half_sin, half_cos) = (omega / 2.0).sin_cos();

    let mut sf = pole_product(order, omega);
    if order % 2 == 1 {
        sf *= half_cos + half_sin;
    }
    half_cos.powi(order as i32) / sf
}
