//! Mapping identification from observed hashes.
//!
//! Mapping cells are `keccak(key . slot)`, so they cannot be listed ahead of
//! execution. Instead the interpreter reports every hash it computes, and the
//! identifier attributes `(preimage slot, hash)` pairs to mapping nodes:
//! a match on an inner node grows the tree by one child per distinct key, a
//! match on a leaf protects the hash itself.

use shield_types::Word;
use tracing::debug;

use crate::env::ShieldEnv;
use crate::variable::{is_dynamic_type, Layout, StorageVariable};

/// Effect of one observation on a tree.
///
/// Ordered by significance so results over several subtrees combine with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Discovery {
    /// No mapping node matched the preimage slot.
    Unmatched,
    /// Matched, but the hash was already known.
    Known,
    /// A leaf started tracking the hash.
    Leaf,
    /// A new nested mapping child was created for the hash.
    Child,
}

impl StorageVariable {
    /// Attribute one observed hash to this subtree.
    pub fn identify(
        &mut self,
        preimage_slot: Word,
        hash: Word,
        env: &mut ShieldEnv<'_>,
    ) -> Discovery {
        let slot = self.slot;
        let Layout::Mapping(mapping) = &mut self.layout else {
            return Discovery::Unmatched;
        };

        if preimage_slot != slot {
            if mapping.depth == 0 {
                return Discovery::Unmatched;
            }
            return mapping
                .children
                .iter_mut()
                .map(|child| child.identify(preimage_slot, hash, env))
                .max()
                .unwrap_or(Discovery::Unmatched);
        }

        if mapping.depth > 0 {
            if mapping.children.iter().any(|child| child.slot == hash) {
                return Discovery::Known;
            }
            let child = StorageVariable::mapping_child(
                hash,
                mapping.depth - 1,
                mapping.value_type.clone(),
            );
            mapping.children.push(child);
            env.metrics.record_mapping_child();
            debug!(
                variable = %self.name.as_deref().unwrap_or("-"),
                parent = %slot,
                child = %hash,
                "identify: new mapping child"
            );
            return Discovery::Child;
        }

        mapping.leaf_hashes.insert(hash);
        let dynamic_value = is_dynamic_type(&mapping.value_type);
        if dynamic_value {
            mapping.dynamic_bases.insert(hash);
        }
        let inserted = self.tracked.insert(hash);
        if inserted {
            env.metrics.record_leaf_hash();
            debug!(
                variable = %self.label(),
                hash = %hash,
                dynamic = dynamic_value,
                "identify: leaf hash tracked"
            );
        }
        if dynamic_value {
            self.refresh_dynamic(env);
        }
        if inserted {
            Discovery::Leaf
        } else {
            Discovery::Known
        }
    }
}
