//! Filesystem-backed [`PolicyProvider`].

use anyhow::{anyhow, Result};
use chrono::Utc;
use shield_core::policy::{PolicyDocument, PolicyProvider};
use shield_types::Selector;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::paths::{atomic_write_json, policies_dir, policy_path};

/// Policy store with a sharded directory layout.
pub struct FsPolicyStore {
    root: Arc<Path>,
}

impl FsPolicyStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| anyhow!("Failed to create store root {}: {}", root.display(), e))?;
        Ok(Self {
            root: Arc::from(root),
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove a selector's policy. Returns false if none was stored.
    pub fn remove(&self, selector: Selector) -> Result<bool> {
        let path = policy_path(&self.root, &selector);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .map_err(|e| anyhow!("Failed to remove policy file {}: {}", path.display(), e))?;
        Ok(true)
    }
}

impl PolicyProvider for FsPolicyStore {
    fn load(&self, selector: Selector) -> Result<Option<PolicyDocument>> {
        let path = policy_path(&self.root, &selector);

        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("Failed to read policy file {}: {}", path.display(), e))?;
        let doc = PolicyDocument::from_json_str(&json)
            .map_err(|e| anyhow!("{}: {}", path.display(), e))?;

        Ok(Some(doc))
    }

    fn save(&self, doc: &PolicyDocument) -> Result<()> {
        let path = policy_path(&self.root, &doc.selector);
        let mut stamped = doc.clone();
        stamped.updated_at = Some(Utc::now());

        atomic_write_json(&path, &stamped)?;
        debug!(selector = %doc.selector, path = %path.display(), "policy store: saved");

        Ok(())
    }

    fn selectors(&self) -> Result<Vec<Selector>> {
        let dir = policies_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut selectors = Vec::new();
        for shard in std::fs::read_dir(&dir)
            .map_err(|e| anyhow!("Failed to list {}: {}", dir.display(), e))?
        {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&shard)
                .map_err(|e| anyhow!("Failed to list {}: {}", shard.display(), e))?
            {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match stem.parse::<Selector>() {
                    Ok(selector) => selectors.push(selector),
                    Err(e) => warn!(path = %path.display(), error = %e, "policy store: skipping file"),
                }
            }
        }
        selectors.sort();
        Ok(selectors)
    }
}
