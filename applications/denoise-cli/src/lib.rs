//! Denoiser command-line front end
//!
//! Reads a WAV file, runs [`denoise_engine::MultiBandNoiseFilter`] over it
//! and writes the result in the input's format. Settings come from built-in
//! defaults, an optional TOML file, `DENOISE_*` environment variables and
//! finally command-line flags.

pub mod cli;
pub mod config;
pub mod wav;

use anyhow::{Context, Result};
use cli::Cli;
use config::DenoiseConfig;
use denoise_dsp::value_to_decibel;
use denoise_engine::{NoiseReport, SpeakerLayout};
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};

/// Effective configuration for `cli`
pub fn load_config(cli: &Cli) -> Result<DenoiseConfig> {
    let mut config = DenoiseConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config)?;
    Ok(config)
}

/// Filter the input file into the output file
pub fn run(cli: &Cli) -> Result<NoiseReport> {
    let input = cli.input.as_deref().context("no input file given")?;
    let output = cli.output.as_deref().context("no output file given")?;
    let config = load_config(cli)?;
    let filter = config.build_filter()?;

    let mut audio = wav::read_wav(input)?;
    match SpeakerLayout::for_channels(audio.channels()) {
        Ok(layout) => info!(layout = %layout, "Speaker layout"),
        Err(_) => warn!(
            channels = audio.channels(),
            "No speaker layout for channel count; channels are numbered"
        ),
    }
    info!(
        input = %input.display(),
        frames = audio.frames(),
        sample_rate = audio.spec.sample_rate,
        "Filtering"
    );

    let channels = audio.channels();
    let sample_rate = audio.sample_rate();
    let report = filter
        .filter(&mut audio.samples, channels, sample_rate)
        .with_context(|| format!("noise reduction of {} failed", input.display()))?;

    for band in &report.bands {
        info!(
            channel = band.channel,
            "{:.0}-{:.0} Hz: peak {:.1} dB, noise {:.1} dB",
            band.lower_hz,
            band.upper_hz,
            band.peak_level.map_or(f64::NEG_INFINITY, value_to_decibel),
            band.noise_level.map_or(f64::NEG_INFINITY, value_to_decibel)
        );
    }

    wav::write_wav(output, audio.spec, &audio.samples)?;
    if let Some(path) = &cli.report {
        write_report(path, &report)?;
    }
    info!(output = %output.display(), "Done");
    Ok(report)
}

fn write_report(path: &std::path::Path, report: &NoiseReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("failed to write report {}", path.display()))
}
