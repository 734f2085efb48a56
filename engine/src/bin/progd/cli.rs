//! Command-line arguments

use clap::Parser;
use progd_engine::constants::cli::DEFAULT_CONFIG_PATH;
use std::path::PathBuf;

/// Process supervisor agent driven by a remote controller over gRPC
#[derive(Parser, Debug, Clone)]
#[command(name = "progd")]
#[command(about = "Supervise local programs from a YAML desired state and a gRPC control stream")]
pub struct Args {
    /// Path to the desired-state YAML file
    #[arg(
        short = 'c',
        long = "configuration",
        env = "PROGD_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub configuration: PathBuf,
}
