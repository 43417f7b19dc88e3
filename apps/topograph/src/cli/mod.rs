//! # Topograph CLI Module
//!
//! ## Available Commands
//!
//! - `agent` - Run the host agent until Ctrl-C
//! - `reclassify` - Re-key an `lshw -json` document by class
//! - `inspect` - Decode a snapshot blob

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use topograph_core::TopologyError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Topograph - live Ceph topology agent
///
/// Renders the Ceph daemons and hardware of a host into a topology graph.
#[derive(Parser, Debug)]
#[command(name = "topograph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the host agent until interrupted
    Agent {
        /// Path to the agent configuration (TOML); defaults to $TOPOGRAPH_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Re-key a hardware description by class
    Reclassify {
        /// Path to the `lshw -json` output
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Decode a snapshot blob and print it as JSON
    Inspect {
        /// The blob, or `-` to read it from stdin
        blob: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TopologyError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Agent { config } => cmd_agent(config.as_deref(), json_mode).await,
        Commands::Reclassify { file } => cmd_reclassify(&file),
        Commands::Inspect { blob } => cmd_inspect(&blob),
    }
}
