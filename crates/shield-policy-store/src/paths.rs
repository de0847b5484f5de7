//! Path utilities for the sharded policy layout.

use anyhow::{anyhow, Result};
use shield_types::Selector;
use std::path::{Path, PathBuf};

/// Directory under the store root holding every shard.
pub fn policies_dir(root: &Path) -> PathBuf {
    root.join("policies")
}

/// Shard component (aa) of a selector.
pub fn selector_shard(selector: &Selector) -> String {
    format!("{:02x}", selector.0[0])
}

/// Full path of a selector's policy document.
pub fn policy_path(root: &Path, selector: &Selector) -> PathBuf {
    policies_dir(root)
        .join(selector_shard(selector))
        .join(format!("{}.json", selector.to_hex()))
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to a sibling `.tmp`, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a pretty-printed JSON file atomically. Policies are edited by hand,
/// so they are kept readable.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}
