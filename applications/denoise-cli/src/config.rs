//! Denoiser configuration: defaults, TOML file, environment, then CLI flags

use anyhow::{bail, Context, Result};
use denoise_engine::{
    CrossoverInfo, Direction, MultiBandNoiseFilter, NrDynamicsFactory, NrMeasurementSettings,
    TimingSettings,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables are `DENOISE_<SECTION>__<KEY>`
pub const ENV_PREFIX: &str = "DENOISE";

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: [&str; 4] = [
    "crossover.frequencies",
    "timings.measurement_time",
    "timings.attack_time",
    "timings.release_time",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DenoiseConfig {
    #[serde(default)]
    pub measurement: NrMeasurementSettings,

    #[serde(default)]
    pub timings: TimingSettings,

    #[serde(default)]
    pub crossover: CrossoverSettings,

    #[serde(default)]
    pub dynamics: DynamicsSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CrossoverSettings {
    /// Named frequency set, used when `frequencies` is empty
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default)]
    pub frequencies: Vec<f64>,

    #[serde(default = "default_order")]
    pub order: usize,

    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicsMode {
    Expansion,
    #[default]
    Subtraction,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct DynamicsSettings {
    #[serde(default)]
    pub mode: DynamicsMode,

    /// Knee above the noise level (dB); mode default when absent
    #[serde(default)]
    pub threshold_db: Option<f64>,

    /// Expansion or subtraction ratio; mode default when absent
    #[serde(default)]
    pub ratio: Option<f64>,
}

fn default_preset() -> String {
    "dnl".to_string()
}

fn default_order() -> usize {
    4
}

impl Default for CrossoverSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            frequencies: Vec::new(),
            order: default_order(),
            direction: Direction::default(),
        }
    }
}

impl DynamicsMode {
    /// `(threshold_db, ratio)` when nothing else is configured
    pub fn defaults(self) -> (f64, f64) {
        match self {
            DynamicsMode::Expansion => (6.0, 2.0),
            DynamicsMode::Subtraction => (0.0, 0.25),
        }
    }
}

impl DenoiseConfig {
    /// Load defaults, then the optional TOML file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!("configuration file {} does not exist", path.display());
            }
            settings = settings.add_source(config::File::from(PathBuf::from(path)));
        }

        let mut environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .try_parsing(true);
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        settings = settings.add_source(environment);

        settings
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn crossover_info(&self) -> Result<CrossoverInfo> {
        let crossover = &self.crossover;
        let info = if crossover.frequencies.is_empty() {
            CrossoverInfo::from_preset(&crossover.preset, crossover.direction, crossover.order)?
        } else {
            CrossoverInfo::new(
                crossover.direction,
                crossover.order,
                crossover.frequencies.iter().copied(),
            )?
        };
        Ok(info)
    }

    pub fn dynamics_factory(&self) -> Result<NrDynamicsFactory> {
        let (threshold, ratio) = self.dynamics.mode.defaults();
        let threshold = self.dynamics.threshold_db.unwrap_or(threshold);
        let ratio = self.dynamics.ratio.unwrap_or(ratio);
        let factory = match self.dynamics.mode {
            DynamicsMode::Expansion => NrDynamicsFactory::expansion(threshold, ratio)?,
            DynamicsMode::Subtraction => NrDynamicsFactory::subtraction(threshold, ratio)?,
        };
        Ok(factory)
    }

    /// Validate everything and assemble the engine
    pub fn build_filter(&self) -> Result<MultiBandNoiseFilter> {
        let crossover = self.crossover_info()?;
        let timings = self
            .timings
            .to_timings(&crossover)
            .context("invalid timing settings")?;
        let dynamics = self.dynamics_factory()?;
        let filter = MultiBandNoiseFilter::new(crossover, self.measurement.clone(), dynamics, timings)
            .context("invalid measurement settings")?;
        Ok(filter)
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}
