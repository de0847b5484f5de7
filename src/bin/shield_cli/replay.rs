//! Replay command - run a scenario through the write guard

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use shield_core::{PackedSnapshot, PolicyPersistence, ShieldConfig};
use shield_policy_store::FsPolicyStore;
use storage_shield::scenario::{run_scenario, Scenario};

use super::output::format_report;

#[derive(Args, Debug)]
pub struct ReplayCmd {
    /// Scenario JSON file
    pub scenario: PathBuf,

    /// Engine config JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Compare packed fields against the last observed value instead of a live read
    #[arg(long, default_value_t = false)]
    pub cached_snapshots: bool,

    /// Write extended policies back to the store after a successful call
    #[arg(long, default_value_t = false)]
    pub write_back: bool,

    /// Exit with non-zero status if the frame halts
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

impl ReplayCmd {
    pub fn execute(&self, store_root: &Path, json_output: bool, verbose: bool) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => ShieldConfig::from_json_file(path)?,
            None => ShieldConfig::default(),
        };
        if self.cached_snapshots {
            config = config.with_packed_snapshot(PackedSnapshot::Cached);
        }
        if self.write_back {
            config = config.with_persistence(PolicyPersistence::WriteBack);
        }

        let scenario = Scenario::from_json_file(&self.scenario)?;
        let store = FsPolicyStore::new(store_root)?;
        let report = run_scenario(&scenario, &store, &config)?;

        if json_output {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", format_report(&report, verbose));
        }

        if self.strict {
            if let Some(halt) = &report.halt {
                bail!("Frame halted: {}", halt.message);
            }
        }
        Ok(())
    }
}
