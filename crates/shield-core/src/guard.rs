//! Write guard.
//!
//! Decides whether a pending SSTORE may touch a cell. Mapping children are
//! all evaluated and combined with logical AND: one denying child blocks the
//! write.

use shield_types::Word;
use tracing::trace;

use crate::config::PackedSnapshot;
use crate::env::ShieldEnv;
use crate::variable::{Layout, StorageVariable, VariableKind};

impl StorageVariable {
    /// True if writing `new_value` to `cell` is permitted by this subtree.
    pub fn can_write(&mut self, cell: Word, new_value: Word, env: &mut ShieldEnv<'_>) -> bool {
        let allowed = match self.kind() {
            VariableKind::Packed => self.packed_allows(cell, new_value, env),
            VariableKind::Mapping => self.mapping_allows(cell, new_value, env),
            VariableKind::Dynamic => {
                self.refresh_dynamic(env);
                !self.tracked.contains(&cell)
            }
            VariableKind::Plain => !self.tracked.contains(&cell),
        };
        trace!(
            variable = %self.label(),
            cell = %cell,
            allowed,
            "guard: evaluated write"
        );
        allowed
    }

    fn packed_allows(&mut self, cell: Word, new_value: Word, env: &mut ShieldEnv<'_>) -> bool {
        if cell != self.slot {
            return true;
        }
        let Layout::Packed(field) = &mut self.layout else {
            return true;
        };
        let current = match env.config.packed_snapshot {
            PackedSnapshot::LiveRead => {
                let live = env.read(cell);
                field.last_observed = live;
                live
            }
            PackedSnapshot::Cached => field.last_observed,
        };
        !field.changes_field(&current, &new_value)
    }

    fn mapping_allows(&mut self, cell: Word, new_value: Word, env: &mut ShieldEnv<'_>) -> bool {
        if self.is_dynamic() {
            self.refresh_dynamic(env);
        }
        if self.tracked.contains(&cell) {
            return false;
        }
        let Layout::Mapping(mapping) = &mut self.layout else {
            return true;
        };
        mapping
            .children
            .iter_mut()
            .fold(true, |allowed, child| {
                child.can_write(cell, new_value, env) && allowed
            })
    }

    /// Record the value now held by `cell` in packed nodes of this subtree
    /// that live in that slot.
    pub fn observe_value(&mut self, cell: Word, value: Word) {
        if cell != self.slot {
            return;
        }
        if let Layout::Packed(field) = &mut self.layout {
            field.last_observed = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::hasher::KeccakScratch;
    use crate::identify::Discovery;
    use crate::metrics::ShieldMetrics;
    use crate::state::MemoryState;
    use shield_types::Address;

    fn w(n: u64) -> Word {
        Word::from(n)
    }

    fn addr() -> Address {
        Address::repeat_byte(0x0b)
    }

    struct Harness {
        state: MemoryState,
        hasher: KeccakScratch,
        config: ShieldConfig,
        metrics: ShieldMetrics,
    }

    impl Harness {
        fn new(state: MemoryState, config: ShieldConfig) -> Self {
            Self {
                state,
                hasher: KeccakScratch::new(),
                config,
                metrics: ShieldMetrics::new(),
            }
        }

        fn env(&mut self) -> ShieldEnv<'_> {
            ShieldEnv {
                state: &mut self.state,
                address: addr(),
                hasher: &mut self.hasher,
                config: &self.config,
                metrics: &self.metrics,
            }
        }
    }

    #[test]
    fn test_plain_denies_tracked_cell_only() {
        let mut h = Harness::new(MemoryState::new(), ShieldConfig::default());
        let mut var = StorageVariable::plain(w(1));
        var.initialize();
        assert!(!var.can_write(w(1), w(42), &mut h.env()));
        assert!(var.can_write(w(2), w(42), &mut h.env()));
    }

    #[test]
    fn test_packed_live_read() {
        // field is the lowest byte of slot 0
        let state = MemoryState::new().with_storage(addr(), w(0), w(0x1100));
        let mut h = Harness::new(state, ShieldConfig::default());
        let mut var = StorageVariable::packed(w(0), 31, 1);
        var.initialize();

        // only the neighbouring byte changes
        assert!(var.can_write(w(0), w(0x2200), &mut h.env()));
        // field byte changes
        assert!(!var.can_write(w(0), w(0x1101), &mut h.env()));
        // field and neighbour change together
        assert!(!var.can_write(w(0), w(0x2201), &mut h.env()));
        // other slots are not this field's business
        assert!(var.can_write(w(1), w(0xff), &mut h.env()));
    }

    #[test]
    fn test_packed_cached_snapshot() {
        let state = MemoryState::new().with_storage(addr(), w(0), w(0x05));
        let config = ShieldConfig::default().with_packed_snapshot(PackedSnapshot::Cached);
        let mut h = Harness::new(state, config);
        let mut var = StorageVariable::packed(w(0), 31, 1);
        var.initialize();

        // nothing observed yet: snapshot is zero, so the live 0x05 looks like a change
        assert!(!var.can_write(w(0), w(0x05), &mut h.env()));
        var.observe_value(w(0), w(0x05));
        assert!(var.can_write(w(0), w(0x05), &mut h.env()));
        assert!(!var.can_write(w(0), w(0x06), &mut h.env()));
    }

    #[test]
    fn test_mapping_children_aggregate_with_and() {
        let mut h = Harness::new(MemoryState::new(), ShieldConfig::default());
        let mut var = StorageVariable::mapping(w(5), 1, "uint256");
        var.initialize();
        assert_eq!(var.identify(w(5), w(100), &mut h.env()), Discovery::Child);
        assert_eq!(var.identify(w(5), w(200), &mut h.env()), Discovery::Child);

        // first child denies, last child allows: the write is still blocked
        assert!(!var.can_write(w(100), w(1), &mut h.env()));
        assert!(!var.can_write(w(200), w(1), &mut h.env()));
        assert!(var.can_write(w(300), w(1), &mut h.env()));
    }

    #[test]
    fn test_dynamic_refreshes_before_check() {
        let slot = w(4);
        let first = KeccakScratch::new().hash_word(&slot);
        let mut h = Harness::new(MemoryState::new(), ShieldConfig::default());
        let mut var = StorageVariable::dynamic(slot);
        var.initialize();

        assert!(var.can_write(first, w(1), &mut h.env()));
        h.state.set_storage(addr(), first, w(9));
        assert!(!var.can_write(first, w(1), &mut h.env()));
        assert!(!var.can_write(slot, w(1), &mut h.env()));
    }

    #[test]
    fn test_dynamic_mapping_leaf_refreshes_before_check() {
        let hash = w(0xabc);
        let first = KeccakScratch::new().hash_word(&hash);
        let mut h = Harness::new(MemoryState::new(), ShieldConfig::default());
        let mut var = StorageVariable::mapping(w(2), 0, "uint256[]");
        var.initialize();
        var.identify(w(2), hash, &mut h.env());
        assert!(var.can_write(first, w(1), &mut h.env()));

        // the array grew after discovery
        h.state.set_storage(addr(), first, w(1));
        assert!(!var.can_write(first, w(1), &mut h.env()));
    }
}
