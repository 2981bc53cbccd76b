//! CLI argument parsing for bridges.

use std::path::PathBuf;

/// Common CLI arguments for all bridges.
///
/// Flatten into a bridge-specific parser with `#[command(flatten)]`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
