//! Policy command - import, list, show and validate stored policies

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shield_core::policy::{PolicyDocument, PolicyProvider};
use shield_policy_store::FsPolicyStore;
use shield_types::Selector;

use super::output::format_policy;

#[derive(Parser, Debug)]
pub struct PolicyCmd {
    #[command(subcommand)]
    pub action: PolicyAction,
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    /// Print the stored policy for a selector
    Show {
        /// Function selector (0x-prefixed, 4 bytes)
        selector: String,
    },
    /// Check a policy file (or a stored selector) for layout errors
    Validate {
        /// Policy JSON file, or a selector already in the store
        target: String,
    },
    /// List every stored selector
    List,
    /// Validate a policy file and add it to the store
    Import {
        /// Policy JSON file
        file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct PolicySummary {
    selector: Selector,
    shield: usize,
    allow: usize,
    nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

impl PolicySummary {
    fn of(doc: &PolicyDocument) -> Self {
        Self {
            selector: doc.selector,
            shield: doc.shield.len(),
            allow: doc.allow.len(),
            nodes: doc.node_count(),
            updated_at: doc.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl PolicyCmd {
    pub fn execute(&self, store_root: &Path, json_output: bool) -> Result<()> {
        match &self.action {
            PolicyAction::Show { selector } => show(store_root, selector, json_output),
            PolicyAction::Validate { target } => validate(store_root, target, json_output),
            PolicyAction::List => list(store_root, json_output),
            PolicyAction::Import { file } => import(store_root, file, json_output),
        }
    }
}

fn load_stored(store_root: &Path, selector: &str) -> Result<PolicyDocument> {
    let selector: Selector = selector.parse()?;
    let store = FsPolicyStore::new(store_root)?;
    store
        .load(selector)?
        .ok_or_else(|| anyhow!("No policy stored for {} in {}", selector, store_root.display()))
}

fn read_policy_file(path: &Path) -> Result<PolicyDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;
    PolicyDocument::from_json_str(&json).with_context(|| path.display().to_string())
}

fn show(store_root: &Path, selector: &str, json_output: bool) -> Result<()> {
    let doc = load_stored(store_root, selector)?;
    if json_output {
        println!("{}", doc.to_json_pretty()?);
    } else {
        print!("{}", format_policy(&doc));
    }
    Ok(())
}

fn validate(store_root: &Path, target: &str, json_output: bool) -> Result<()> {
    let path = Path::new(target);
    let doc = if path.exists() {
        read_policy_file(path)?
    } else {
        load_stored(store_root, target)?
    };
    doc.validate()
        .with_context(|| format!("Policy {} is invalid", doc.selector))?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "valid": true,
                "policy": PolicySummary::of(&doc),
            }))?
        );
    } else {
        println!(
            "\x1b[32m✓ Policy {} is valid\x1b[0m ({} nodes)",
            doc.selector,
            doc.node_count()
        );
    }
    Ok(())
}

fn list(store_root: &Path, json_output: bool) -> Result<()> {
    let store = FsPolicyStore::new(store_root)?;
    let mut summaries = Vec::new();
    for selector in store.selectors()? {
        if let Some(doc) = store.load(selector)? {
            summaries.push(PolicySummary::of(&doc));
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No policies in {}", store_root.display());
        return Ok(());
    }
    println!("\x1b[1mPolicies in {}:\x1b[0m", store_root.display());
    for s in &summaries {
        println!(
            "  \x1b[36m{}\x1b[0m  shield {}  allow {}  nodes {}",
            s.selector, s.shield, s.allow, s.nodes
        );
    }
    Ok(())
}

fn import(store_root: &Path, file: &Path, json_output: bool) -> Result<()> {
    let doc = read_policy_file(file)?;
    doc.validate()
        .with_context(|| format!("Refusing to import invalid policy {}", doc.selector))?;
    let store = FsPolicyStore::new(store_root)?;
    let replaced = store.has(doc.selector);
    store.save(&doc)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "imported": true,
                "replaced": replaced,
                "policy": PolicySummary::of(&doc),
            }))?
        );
    } else {
        println!(
            "Imported policy {} ({} shield, {} allow){}",
            doc.selector,
            doc.shield.len(),
            doc.allow.len(),
            if replaced { ", replacing previous" } else { "" }
        );
    }
    Ok(())
}
