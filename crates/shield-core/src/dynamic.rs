//! Dynamic length resolution.
//!
//! Solidity stores a dynamic array or long string's length at a base cell `S`
//! and its elements at `keccak(S)`, `keccak(S) + 1`, ... The resolver walks
//! that run until it reads an empty cell. Sparse layouts (elements deleted
//! from the middle) end the scan early; that limitation is accepted.

use shield_types::Word;
use tracing::{trace, warn};

use crate::env::ShieldEnv;
use crate::variable::{Layout, StorageVariable};

impl StorageVariable {
    /// Re-scan every dynamic container owned by this node.
    ///
    /// Returns the number of cells newly added to `tracked`. Non-dynamic nodes
    /// are left alone.
    pub fn refresh_dynamic(&mut self, env: &mut ShieldEnv<'_>) -> usize {
        let bases: Vec<Word> = match &self.layout {
            Layout::Dynamic(range) => vec![range.base.unwrap_or(self.slot)],
            Layout::Mapping(mapping) => mapping.dynamic_bases.iter().copied().collect(),
            Layout::Plain | Layout::Packed(_) => return 0,
        };
        let mut added = 0;
        for base in bases {
            let first = env.data_start(&base);
            added += self.enumerate(first, env);
        }
        added
    }

    /// Track `start, start + 1, ...` while storage is non-empty.
    pub fn enumerate(&mut self, start: Word, env: &mut ShieldEnv<'_>) -> usize {
        let mut cell = start;
        let mut scanned = 0usize;
        let mut added = 0usize;
        loop {
            if let Some(cap) = env.config.max_dynamic_cells {
                if scanned >= cap {
                    warn!(
                        variable = %self.label(),
                        cap,
                        "dynamic scan hit cell cap"
                    );
                    break;
                }
            }
            if env.read(cell).is_zero() {
                break;
            }
            if self.tracked.insert(cell) {
                added += 1;
            }
            scanned += 1;
            cell = cell.wrapping_add(Word::from(1u64));
        }
        env.metrics.record_dynamic_cells(added);
        trace!(
            variable = %self.label(),
            start = %start,
            scanned,
            added,
            "dynamic: enumerated container"
        );
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::hasher::KeccakScratch;
    use crate::metrics::ShieldMetrics;
    use crate::state::{MemoryState, StateView};
    use shield_types::{word_to_bytes32, Address};
    use std::collections::BTreeSet;

    fn w(n: u64) -> Word {
        Word::from(n)
    }

    fn addr() -> Address {
        Address::repeat_byte(0xcc)
    }

    fn with_env<R>(
        state: &mut MemoryState,
        config: &ShieldConfig,
        f: impl FnOnce(&mut ShieldEnv<'_>) -> R,
    ) -> R {
        let mut hasher = KeccakScratch::new();
        let metrics = ShieldMetrics::new();
        let mut env = ShieldEnv {
            state,
            address: addr(),
            hasher: &mut hasher,
            config,
            metrics: &metrics,
        };
        f(&mut env)
    }

    #[test]
    fn test_enumerate_registers_contiguous_run() {
        let start = w(1000);
        let mut state = MemoryState::new();
        for i in 0..3u64 {
            state.set_storage(addr(), start + w(i), w(7));
        }
        state.set_storage(addr(), start + w(4), w(7)); // after the gap

        let mut var = StorageVariable::dynamic(w(9));
        let added = with_env(&mut state, &ShieldConfig::default(), |env| {
            var.enumerate(start, env)
        });

        assert_eq!(added, 3);
        assert_eq!(var.tracked, BTreeSet::from([w(1000), w(1001), w(1002)]));
    }

    #[test]
    fn test_enumerate_empty_start_adds_nothing() {
        let mut state = MemoryState::new();
        let mut var = StorageVariable::dynamic(w(9));
        let added = with_env(&mut state, &ShieldConfig::default(), |env| {
            var.enumerate(w(50), env)
        });
        assert_eq!(added, 0);
        assert!(var.tracked.is_empty());
    }

    #[test]
    fn test_refresh_uses_hashed_base_and_records_preimage() {
        let slot = w(4);
        let first = KeccakScratch::new().hash_word(&slot);
        let mut state = MemoryState::new()
            .with_storage(addr(), slot, w(2))
            .with_storage(addr(), first, w(0xaa))
            .with_storage(addr(), first + w(1), w(0xbb));

        let mut var = StorageVariable::dynamic(slot);
        var.initialize();
        let config = ShieldConfig::default().with_preimage_recording(true);
        let added = with_env(&mut state, &config, |env| var.refresh_dynamic(env));

        assert_eq!(added, 2);
        assert!(var.is_tracked(&slot));
        assert!(var.is_tracked(&first));
        assert!(var.is_tracked(&(first + w(1))));
        assert_eq!(state.preimages().len(), 1);
        assert!(state
            .preimages()
            .values()
            .any(|p| p.as_slice() == word_to_bytes32(&slot)));
    }

    #[test]
    fn test_refresh_picks_up_growth() {
        let slot = w(4);
        let first = KeccakScratch::new().hash_word(&slot);
        let mut state = MemoryState::new().with_storage(addr(), first, w(1));
        let mut var = StorageVariable::dynamic(slot);
        var.initialize();
        let config = ShieldConfig::default();

        assert_eq!(with_env(&mut state, &config, |env| var.refresh_dynamic(env)), 1);
        state.set_storage(addr(), first + w(1), w(1));
        assert_eq!(with_env(&mut state, &config, |env| var.refresh_dynamic(env)), 1);
        assert_eq!(with_env(&mut state, &config, |env| var.refresh_dynamic(env)), 0);
        assert!(state.storage(&addr(), first + w(2)).is_zero());
    }

    #[test]
    fn test_scan_cap() {
        let start = w(10);
        let mut state = MemoryState::new();
        for i in 0..10u64 {
            state.set_storage(addr(), start + w(i), w(1));
        }
        let mut var = StorageVariable::dynamic(w(9));
        let config = ShieldConfig::default().with_max_dynamic_cells(Some(4));
        let added = with_env(&mut state, &config, |env| var.enumerate(start, env));
        assert_eq!(added, 4);
    }

    #[test]
    fn test_plain_node_is_not_refreshed() {
        let mut state = MemoryState::new();
        let mut var = StorageVariable::plain(w(1));
        var.initialize();
        let added = with_env(&mut state, &ShieldConfig::default(), |env| {
            var.refresh_dynamic(env)
        });
        assert_eq!(added, 0);
        assert_eq!(var.tracked.len(), 1);
    }
}
