//! Engine configuration.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Where the packed-field guard takes the "before" value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackedSnapshot {
    /// Read the cell from state immediately before each comparison.
    #[default]
    LiveRead,
    /// Compare against the value last seen by an SLOAD or an allowed write.
    Cached,
}

/// What happens to trees extended during an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPersistence {
    /// Discovered children and grown sets die with the frame.
    #[default]
    PerInvocation,
    /// The frame may write its extended trees back to the policy provider.
    WriteBack,
}

/// Configuration for the storage policy engine.
///
/// # Example
///
/// ```
/// use shield_core::config::{PackedSnapshot, ShieldConfig};
///
/// let config = ShieldConfig::default()
///     .with_preimage_recording(true)
///     .with_packed_snapshot(PackedSnapshot::Cached)
///     .with_max_dynamic_cells(Some(4096));
/// assert!(config.record_preimages);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Report `(hash, preimage)` pairs computed by the dynamic resolver to the
    /// state collaborator (default: false).
    pub record_preimages: bool,

    /// Source of the packed-field comparison value (default: live read).
    pub packed_snapshot: PackedSnapshot,

    /// Upper bound on cells visited by one dynamic scan (default: unbounded).
    ///
    /// The scan relies on contiguous allocation and stops at the first empty
    /// cell; the cap only matters for hostile or corrupted layouts.
    pub max_dynamic_cells: Option<usize>,

    /// Whether extended trees may be saved back (default: per invocation).
    pub persistence: PolicyPersistence,
}

impl ShieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preimage_recording(mut self, enabled: bool) -> Self {
        self.record_preimages = enabled;
        self
    }

    pub fn with_packed_snapshot(mut self, snapshot: PackedSnapshot) -> Self {
        self.packed_snapshot = snapshot;
        self
    }

    pub fn with_max_dynamic_cells(mut self, cap: Option<usize>) -> Self {
        self.max_dynamic_cells = cap;
        self
    }

    pub fn with_persistence(mut self, persistence: PolicyPersistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
        serde_json::from_str(&json)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", path.display(), e))
    }
}
