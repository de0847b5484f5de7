//! Output formatting for storage-shield CLI

use shield_core::policy::PolicyDocument;
use shield_core::variable::{Layout, StorageVariable};
use shield_types::encoding::format_word;
use storage_shield::scenario::ScenarioReport;

/// Format a replay report for display.
pub fn format_report(report: &ScenarioReport, verbose: bool) -> String {
    let mut out = String::new();

    match &report.halt {
        None => out.push_str("\x1b[32m✓ Call completed\x1b[0m\n\n"),
        Some(halt) => {
            let at = halt
                .step
                .map(|s| format!(" at step {}", s))
                .unwrap_or_default();
            out.push_str(&format!("\x1b[31m✗ Call halted{}: {}\x1b[0m\n\n", at, halt.message));
        }
    }

    match report.selector {
        Some(selector) => out.push_str(&format!("Policy: {}\n", selector)),
        None => out.push_str("Policy: none (unprotected)\n"),
    }
    out.push_str(&format!("Steps executed: {}\n", report.steps_executed));
    out.push_str(&format!("Gas remaining: {}\n", report.gas_remaining));
    out.push_str(&format!("Writes committed: {}\n", report.writes_committed));
    if report.persisted {
        out.push_str("Policy written back\n");
    }
    out.push('\n');

    if !report.loads.is_empty() {
        out.push_str("\x1b[1mLoads:\x1b[0m\n");
        for entry in &report.loads {
            out.push_str(&format!(
                "  {} = {}\n",
                format_word(&entry.cell),
                format_word(&entry.value)
            ));
        }
        out.push('\n');
    }

    if verbose {
        out.push_str("\x1b[1mStorage:\x1b[0m\n");
        for entry in &report.storage {
            out.push_str(&format!(
                "  {} = {}\n",
                format_word(&entry.cell),
                format_word(&entry.value)
            ));
        }
        out.push('\n');
        out.push_str(&report.metrics.format_report());
        out.push('\n');
    }

    out
}

/// Format a policy as an indented tree.
pub fn format_policy(doc: &PolicyDocument) -> String {
    let mut out = format!("\x1b[1mPolicy {}\x1b[0m\n", doc.selector);
    if let Some(updated) = doc.updated_at {
        out.push_str(&format!("Updated: {}\n", updated.to_rfc3339()));
    }
    for (title, vars) in [("Shield", &doc.shield), ("Allow", &doc.allow)] {
        out.push_str(&format!("\n{} ({}):\n", title, vars.len()));
        for var in vars {
            push_variable(&mut out, var, 1);
        }
    }
    out
}

fn push_variable(out: &mut String, var: &StorageVariable, indent: usize) {
    let pad = "  ".repeat(indent);
    let detail = match &var.layout {
        Layout::Plain => "plain".to_string(),
        Layout::Packed(field) => format!(
            "packed bytes {}..{}",
            field.offset,
            usize::from(field.offset) + usize::from(field.width)
        ),
        Layout::Dynamic(range) => match range.base {
            Some(base) => format!("dynamic, length at {}", format_word(&base)),
            None => "dynamic".to_string(),
        },
        Layout::Mapping(mapping) if mapping.leaf_hashes.is_empty() => {
            format!("mapping depth {} of {}", mapping.depth, mapping.value_type)
        }
        Layout::Mapping(mapping) => format!(
            "mapping depth {} of {}, {} known keys",
            mapping.depth,
            mapping.value_type,
            mapping.leaf_hashes.len()
        ),
    };
    out.push_str(&format!(
        "{}\x1b[36m{}\x1b[0m  slot {}  {}\n",
        pad,
        var.label(),
        format_word(&var.slot),
        detail
    ));
    for child in var.children() {
        push_variable(out, child, indent + 1);
    }
}
