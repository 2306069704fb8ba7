//! Denoiser - multi-band noise reduction for WAV files

use clap::Parser;
use denoise_cli::cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "denoiser=debug,denoise_cli=debug,denoise_engine=debug"
    } else {
        "denoiser=info,denoise_cli=info,denoise_engine=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.print_config {
        let config = denoise_cli::load_config(&cli)?;
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    denoise_cli::run(&cli)?;
    Ok(())
}
