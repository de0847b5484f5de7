//! Allow-list refresh.
//!
//! Allow-list trees never veto a write. They are kept current so that their
//! tracked cells stay accurate for later identification and inspection.

use crate::env::ShieldEnv;
use crate::variable::{is_dynamic_type, Layout, StorageVariable};

impl StorageVariable {
    /// Refresh dynamic cells of this node and of children holding dynamic
    /// values. Returns the number of newly tracked cells.
    pub fn refresh_allowed(&mut self, env: &mut ShieldEnv<'_>) -> usize {
        let mut added = 0;
        if self.is_dynamic() {
            added += self.refresh_dynamic(env);
        }
        if let Layout::Mapping(mapping) = &mut self.layout {
            if mapping.depth > 0 && is_dynamic_type(&mapping.value_type) {
                for child in &mut mapping.children {
                    added += child.refresh_allowed(env);
                }
            }
        }
        added
    }
}
