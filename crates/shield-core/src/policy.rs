//! Policy documents and the provider seam.
//!
//! A policy is keyed by function selector and holds two variable lists: the
//! shield list gates writes, the allow list is only kept up to date. How
//! documents are stored is up to the [`PolicyProvider`] implementation.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shield_types::Selector;
use tracing::warn;

use crate::variable::StorageVariable;

/// One selector's protection policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub selector: Selector,

    /// Variables whose cells may not be written
    #[serde(default)]
    pub shield: Vec<StorageVariable>,

    /// Variables tracked for discovery only
    #[serde(default)]
    pub allow: Vec<StorageVariable>,

    /// Last time the document was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PolicyDocument {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            shield: Vec::new(),
            allow: Vec::new(),
            updated_at: None,
        }
    }

    pub fn with_shield(mut self, variable: StorageVariable) -> Self {
        self.shield.push(variable);
        self
    }

    pub fn with_allow(mut self, variable: StorageVariable) -> Self {
        self.allow.push(variable);
        self
    }

    /// Validate every tree in both lists.
    pub fn validate(&self) -> Result<()> {
        for (list, vars) in [("shield", &self.shield), ("allow", &self.allow)] {
            for (idx, var) in vars.iter().enumerate() {
                var.validate()
                    .with_context(|| format!("{} entry {} ({})", list, idx, var.label()))?;
            }
        }
        Ok(())
    }

    /// Reset tracked cells of every node to their declared slot.
    pub fn initialize(&mut self) {
        self.shield
            .iter_mut()
            .chain(self.allow.iter_mut())
            .for_each(StorageVariable::initialize);
    }

    /// Total nodes across both lists.
    pub fn node_count(&self) -> usize {
        self.shield
            .iter()
            .chain(self.allow.iter())
            .map(StorageVariable::node_count)
            .sum()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse policy JSON: {}", e))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize policy {}: {}", self.selector, e))
    }
}

/// Source of policy documents.
pub trait PolicyProvider: Send + Sync {
    /// Load the policy for a selector. `Ok(None)` means the selector is
    /// unprotected.
    fn load(&self, selector: Selector) -> Result<Option<PolicyDocument>>;

    /// Store a policy, replacing any existing document for its selector.
    fn save(&self, doc: &PolicyDocument) -> Result<()>;

    /// Every selector with a stored policy.
    fn selectors(&self) -> Result<Vec<Selector>>;

    /// Check if a readable policy exists (without keeping it).
    fn has(&self, selector: Selector) -> bool {
        match self.load(selector) {
            Ok(doc) => doc.is_some(),
            Err(e) => {
                warn!(selector = %selector, error = %e, "policy: stored document unreadable");
                false
            }
        }
    }
}

/// In-memory provider for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    docs: RwLock<HashMap<Selector, PolicyDocument>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PolicyProvider::save`].
    pub fn with_policy(self, doc: PolicyDocument) -> Self {
        self.docs.write().insert(doc.selector, doc);
        self
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl PolicyProvider for MemoryPolicyStore {
    fn load(&self, selector: Selector) -> Result<Option<PolicyDocument>> {
        Ok(self.docs.read().get(&selector).cloned())
    }

    fn save(&self, doc: &PolicyDocument) -> Result<()> {
        self.docs.write().insert(doc.selector, doc.clone());
        Ok(())
    }

    fn selectors(&self) -> Result<Vec<Selector>> {
        let mut selectors: Vec<Selector> = self.docs.read().keys().copied().collect();
        selectors.sort();
        Ok(selectors)
    }
}
