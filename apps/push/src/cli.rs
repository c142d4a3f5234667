use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "gantry-push",
    version,
    about = "Push large files to a gantry upload gateway",
    after_help = "\
Files already known to the gateway are skipped; interrupted uploads
resume from the chunks the gateway is still holding.

Environment variables:
  RUST_LOG    Log filter for diagnostics (overrides -v)"
)]
pub(crate) struct Cli {
    /// Gateway WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:9044")]
    pub gateway: String,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
