//! Counters for guard and analysis activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Thread-safe counters, shared by every frame of one call tree.
#[derive(Debug, Clone, Default)]
pub struct ShieldMetrics {
    writes_checked: Arc<AtomicU64>,
    writes_denied: Arc<AtomicU64>,
    hashes_observed: Arc<AtomicU64>,
    mapping_children: Arc<AtomicU64>,
    leaf_hashes: Arc<AtomicU64>,
    dynamic_cells: Arc<AtomicU64>,
    analysis_hits: Arc<AtomicU64>,
    analysis_misses: Arc<AtomicU64>,
    local_analyses: Arc<AtomicU64>,
}

impl ShieldMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write passed to the guard.
    pub fn record_write_checked(&self) {
        self.writes_checked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write the guard refused.
    pub fn record_write_denied(&self) {
        self.writes_denied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a hash reported by the interpreter.
    pub fn record_hash_observed(&self) {
        self.hashes_observed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new nested mapping child.
    pub fn record_mapping_child(&self) {
        self.mapping_children.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a hash newly tracked by a mapping leaf.
    pub fn record_leaf_hash(&self) {
        self.leaf_hashes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record cells added by a dynamic scan.
    pub fn record_dynamic_cells(&self, count: usize) {
        self.dynamic_cells
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a shared-cache analysis hit.
    pub fn record_analysis_hit(&self) {
        self.analysis_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a shared-cache analysis miss.
    pub fn record_analysis_miss(&self) {
        self.analysis_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an analysis kept local to its frame.
    pub fn record_local_analysis(&self) {
        self.local_analyses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writes_checked: self.writes_checked.load(Ordering::Relaxed),
            writes_denied: self.writes_denied.load(Ordering::Relaxed),
            hashes_observed: self.hashes_observed.load(Ordering::Relaxed),
            mapping_children: self.mapping_children.load(Ordering::Relaxed),
            leaf_hashes: self.leaf_hashes.load(Ordering::Relaxed),
            dynamic_cells: self.dynamic_cells.load(Ordering::Relaxed),
            analysis_hits: self.analysis_hits.load(Ordering::Relaxed),
            analysis_misses: self.analysis_misses.load(Ordering::Relaxed),
            local_analyses: self.local_analyses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ShieldMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub writes_checked: u64,
    pub writes_denied: u64,
    pub hashes_observed: u64,
    pub mapping_children: u64,
    pub leaf_hashes: u64,
    pub dynamic_cells: u64,
    pub analysis_hits: u64,
    pub analysis_misses: u64,
    pub local_analyses: u64,
}

impl MetricsSnapshot {
    /// Fraction of shared-cache lookups served without analysis.
    pub fn analysis_hit_rate(&self) -> f64 {
        let total = self.analysis_hits + self.analysis_misses;
        if total == 0 {
            return 0.0;
        }
        self.analysis_hits as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Shield Metrics".to_string());
        lines.push("=".repeat(40));
        lines.push(format!("  Writes checked:   {}", self.writes_checked));
        lines.push(format!("  Writes denied:    {}", self.writes_denied));
        lines.push(format!("  Hashes observed:  {}", self.hashes_observed));
        lines.push(format!("  Mapping children: {}", self.mapping_children));
        lines.push(format!("  Leaf hashes:      {}", self.leaf_hashes));
        lines.push(format!("  Dynamic cells:    {}", self.dynamic_cells));
        lines.push(format!(
            "  Analysis cache:   {} hit / {} miss / {} local ({:.1}%)",
            self.analysis_hits,
            self.analysis_misses,
            self.local_analyses,
            self.analysis_hit_rate() * 100.0
        ));
        lines.join("\n")
    }
}
