//! Command-line arguments

use crate::config::{DenoiseConfig, DynamicsMode};
use clap::Parser;
use denoise_engine::{Direction, IrregularNoiseMode};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "denoiser", version)]
#[command(about = "Multi-band noise reduction for WAV files", long_about = None)]
pub struct Cli {
    /// WAV file to clean up
    #[arg(required_unless_present = "print_config")]
    pub input: Option<PathBuf>,

    /// Where to write the result (same format as the input)
    #[arg(required_unless_present = "print_config")]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "DENOISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the per-band noise report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Smallest S/N ratio in dB
    #[arg(long)]
    pub min_sn_ratio: Option<f64>,

    /// Largest S/N ratio in dB
    #[arg(long)]
    pub max_sn_ratio: Option<f64>,

    /// Peak RMS window in seconds
    #[arg(long)]
    pub rms_window: Option<f64>,

    /// Noise floor window in seconds
    #[arg(long)]
    pub noise_window: Option<f64>,

    /// Dropout detection window in seconds
    #[arg(long)]
    pub skip_window: Option<f64>,

    /// Seconds at the start excluded from measurement
    #[arg(long)]
    pub skip_start: Option<f64>,

    /// Seconds at the end excluded from measurement
    #[arg(long)]
    pub skip_end: Option<f64>,

    /// Irregular noise mode: 0 off, 1 RMS window, 2 measurement time,
    /// 3 shortest, 4 geometric mean
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub irregular_mode: Option<u8>,

    /// Estimate the noise floor from a level histogram
    #[arg(long)]
    pub frequency_scanning: bool,

    /// Measurement times in seconds, lowest to highest band
    #[arg(long, value_delimiter = ',')]
    pub measurement_time: Vec<f64>,

    /// Attack times in seconds
    #[arg(long, value_delimiter = ',')]
    pub attack_time: Vec<f64>,

    /// Release times in seconds
    #[arg(long, value_delimiter = ',')]
    pub release_time: Vec<f64>,

    /// Crossover frequencies in Hz
    #[arg(long, value_delimiter = ',', conflicts_with = "preset")]
    pub crossovers: Vec<f64>,

    /// Crossover preset: dnl or tertz
    #[arg(long)]
    pub preset: Option<String>,

    /// Crossover filter order (1-4)
    #[arg(long)]
    pub order: Option<usize>,

    /// Band split direction: upward or downward
    #[arg(long)]
    pub direction: Option<String>,

    /// Use expansion with this ratio (1.25-4)
    #[arg(long, conflicts_with = "subtraction")]
    pub expansion: Option<f64>,

    /// Use subtraction with this ratio (0-0.9)
    #[arg(long)]
    pub subtraction: Option<f64>,

    /// Gain curve threshold above the noise level in dB
    #[arg(long, allow_hyphen_values = true)]
    pub threshold: Option<f64>,
}

impl Cli {
    /// Apply explicit flags on top of `config`
    pub fn apply(&self, config: &mut DenoiseConfig) -> anyhow::Result<()> {
        let measurement = &mut config.measurement;
        set(&mut measurement.min_sn_ratio_db, self.min_sn_ratio);
        set(&mut measurement.max_sn_ratio_db, self.max_sn_ratio);
        set(&mut measurement.rms_window, self.rms_window);
        set(&mut measurement.noise_window, self.noise_window);
        set(&mut measurement.skip_window, self.skip_window);
        set(&mut measurement.skip_start, self.skip_start);
        set(&mut measurement.skip_end, self.skip_end);
        if let Some(mode) = self.irregular_mode {
            measurement.irregular_noise_mode = IrregularNoiseMode::try_from(mode)?;
        }
        if self.frequency_scanning {
            measurement.frequency_scanning = true;
        }

        let timings = &mut config.timings;
        set_list(&mut timings.measurement_time, &self.measurement_time);
        set_list(&mut timings.attack_time, &self.attack_time);
        set_list(&mut timings.release_time, &self.release_time);

        let crossover = &mut config.crossover;
        if let Some(preset) = &self.preset {
            crossover.preset = preset.clone();
            crossover.frequencies.clear();
        }
        set_list(&mut crossover.frequencies, &self.crossovers);
        set(&mut crossover.order, self.order);
        if let Some(direction) = &self.direction {
            crossover.direction = Direction::from_name(direction);
        }

        let dynamics = &mut config.dynamics;
        if let Some(ratio) = self.expansion {
            dynamics.mode = DynamicsMode::Expansion;
            dynamics.ratio = Some(ratio);
        }
        if let Some(ratio) = self.subtraction {
            dynamics.mode = DynamicsMode::Subtraction;
            dynamics.ratio = Some(ratio);
        }
        if self.threshold.is_some() {
            dynamics.threshold_db = self.threshold;
        }
        Ok(())
    }
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_list(target: &mut Vec<f64>, values: &[f64]) {
    if !values.is_empty() {
        *target = values.to_vec();
    }
}
