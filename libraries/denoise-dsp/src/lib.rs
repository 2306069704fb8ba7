//! Signal primitives for the Denoiser noise-reduction engine
//!
//! This crate provides:
//! - Butterworth low-pass/high-pass IIR filters (orders 1-4 unrolled, order N generic)
//! - A fixed-length delay line
//! - A sliding-window bucket scanner with an exact integer accumulator
//! - One-pole and two-pole integrators for attack/release smoothing
//! - Sample-and-hold maximum detectors
//!
//! The engine's gain stage combines [`SampleAndHoldMaximum`] with
//! [`IntegrationFactors`]. [`Integrator`], [`DoubleIntegrator`],
//! [`SmoothRelease`] and [`SampleAndHoldMaximumSmoothRelease`] are complete
//! envelope followers for callers that build their own detectors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ Coefficients │ ──► │  Butterworth  │ ──► │ Filter trait │
//! └──────────────┘     └───────────────┘     └──────────────┘
//!
//! Level detection:
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │   Samples    │ ──► │ BucketScanner │ ──► │ Hold/Integr. │
//! └──────────────┘     └───────────────┘     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use denoise_dsp::{butterworth, Filter, PassType};
//!
//! let mut low_pass = butterworth::create(1000.0 / 48000.0, 2, PassType::LowPass)?;
//! let y = low_pass.filter(1.0);
//! assert!(y > 0.0);
//! # Ok::<(), denoise_dsp::DspError>(())
//! ```

#![deny(unsafe_code)]

pub mod bucket;
pub mod butterworth;
mod delay;
mod error;
mod filter;
pub mod hold;
pub mod integration;
mod level;

pub use bucket::{BucketScanner, ExactSum};
pub use butterworth::{Butterworth, PassType};
pub use delay::DelayLine;
pub use error::{DspError, Result};
pub use filter::{DirectForm, Filter, NthOrderFilter};
pub use hold::{SampleAndHoldMaximum, SampleAndHoldMaximumSmoothRelease, SmoothRelease};
pub use integration::{DoubleIntegrator, IntegrationFactors, Integrator};
pub use level::{decibel_to_value, value_to_decibel};
