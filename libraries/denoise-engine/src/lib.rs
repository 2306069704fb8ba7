//! Denoiser Engine
//!
//! Multi-band noise detection and reduction for recorded audio.
//!
//! This crate provides:
//! - Zero-phase band splitting at configurable crossovers
//! - Per-band noise floor detection (minimum window or level histogram)
//! - Irregular-noise re-measurement of quiet regions
//! - Look-ahead gain reduction with expansion or subtraction curves
//! - A bounded buffer pool shared by all channel and band workers
//!
//! # Example
//!
//! ```rust
//! use denoise_engine::{
//!     CrossoverInfo, MultiBandNoiseFilter, NrDynamicsFactory, NrMeasurementSettings,
//!     TimingSettings,
//! };
//!
//! # fn example() -> denoise_engine::Result<()> {
//! let crossover = CrossoverInfo::default();
//! let timings = TimingSettings::default().to_timings(&crossover)?;
//! let filter = MultiBandNoiseFilter::new(
//!     crossover,
//!     NrMeasurementSettings::default(),
//!     NrDynamicsFactory::default(),
//!     timings,
//! )?;
//!
//! let mut samples = vec![0.0f32; 2 * 48000];
//! let report = filter.filter(&mut samples, 2, 48000.0)?;
//! assert_eq!(report.channels, 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(unsafe_code)]

pub mod band_split;
pub mod chain;
pub mod crossover;
pub mod detection;
pub mod dynamics;
mod error;
pub mod multiband;
pub mod pool;
pub mod reduction;
pub mod settings;
pub mod speakers;
pub mod timings;

pub use band_split::{BandReport, BandSplitFilterSet, ChannelOutput};
pub use chain::{BandFilter, BandMetadata, FilterFactory, FrequencyBand};
pub use crossover::{CrossoverInfo, Direction};
pub use dynamics::{GainCurve, NrDynamics, NrDynamicsFactory};
pub use error::{EngineError, Result};
pub use multiband::{MultiBandNoiseFilter, NoiseReport, Sample};
pub use pool::{Buffer, BufferSet, Handle};
pub use reduction::{NoiseReductionFactory, NoiseReductionFilter};
pub use settings::{IrregularNoiseMode, NrMeasurementSettings, NrMeasurementValues};
pub use speakers::{SpeakerLayout, SpeakerLocation};
pub use timings::{DefaultTimings, RatedTimings, TimingSettings};
