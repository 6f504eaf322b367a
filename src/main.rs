use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_seg_rs::{Cli, ImageProcessor, ProgressReporter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the progress protocol, so logs go to stderr
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("avatar_seg_rs={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.into_settings().context("Invalid configuration")?;

    let processor = ImageProcessor::with_onnx_model(&settings).with_context(|| {
        format!(
            "Failed to load segmentation model: {}",
            settings.model.path.display()
        )
    })?;

    let summary = processor
        .run(&settings.mode, &mut ProgressReporter::stdout())
        .context("Processing aborted")?;

    tracing::debug!(?summary, "run finished");
    Ok(())
}
