//! Gantry push CLI entry point.

mod app;
mod bridge;
mod cli;
mod format;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Progress goes to stdout; diagnostics go through tracing.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let failed = rt.block_on(app::run(cli))?;

    if failed > 0 {
        tracing::error!(failed, "some uploads did not complete");
        std::process::exit(1);
    }
    Ok(())
}
