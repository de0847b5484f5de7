//! storage-shield: inspect policies and replay guarded calls
//!
//! ## Features
//!
//! - **analyze**: List the valid jump destinations of contract code
//! - **policy**: Import, list, show and validate stored policies
//! - **replay**: Run a scripted call through the write guard
//!
//! ## Example Usage
//!
//! ```bash
//! # Jump destinations of a code blob
//! storage-shield analyze 0x5b600056
//!
//! # Store a policy, then replay a call against it
//! storage-shield policy import transfer.json
//! storage-shield replay scenario.json --json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod shield_cli;

use shield_cli::{analyze::AnalyzeCmd, policy::PolicyCmd, replay::ReplayCmd};

#[derive(Parser)]
#[command(
    name = "storage-shield",
    author,
    version,
    about = "Runtime storage-write firewall for EVM contracts",
    long_about = "Guards contract storage writes with per-selector policies.\n\n\
                  Provides code analysis, policy management, and scenario replay."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Policy store directory (default: $STORAGE_SHIELD_HOME or ~/.storage-shield)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List valid jump destinations of contract code
    Analyze(AnalyzeCmd),

    /// Manage stored policies
    Policy(PolicyCmd),

    /// Replay a scripted call against stored policies
    Replay(ReplayCmd),
}

fn main() -> Result<()> {
    let Cli {
        command,
        store,
        json,
        verbose,
    } = Cli::parse();
    shield_cli::logging::init(verbose);

    let store = store.unwrap_or_else(shield_cli::store_home);

    match command {
        Commands::Analyze(cmd) => cmd.execute(json),
        Commands::Policy(cmd) => cmd.execute(&store, json),
        Commands::Replay(cmd) => cmd.execute(&store, json, verbose),
    }
}
