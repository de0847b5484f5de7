//! Frame-scoped write buffer over [`MemoryState`].

use std::collections::BTreeMap;

use shield_core::state::{MemoryState, StateView};
use shield_types::{Address, Word, B256};

/// Reads see committed storage overlaid with the frame's pending writes.
/// Nothing reaches the committed state until [`JournalState::commit`].
#[derive(Debug)]
pub struct JournalState<'a> {
    committed: &'a mut MemoryState,
    pending: BTreeMap<(Address, Word), Word>,
    preimages: Vec<(B256, Vec<u8>)>,
}

impl<'a> JournalState<'a> {
    pub fn new(committed: &'a mut MemoryState) -> Self {
        Self {
            committed,
            pending: BTreeMap::new(),
            preimages: Vec::new(),
        }
    }

    /// Buffer a write.
    pub fn write(&mut self, address: Address, cell: Word, value: Word) {
        self.pending.insert((address, cell), value);
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Apply buffered writes and recorded preimages to the committed state.
    pub fn commit(self) -> usize {
        let count = self.pending.len();
        for ((address, cell), value) in self.pending {
            self.committed.set_storage(address, cell, value);
        }
        for (hash, preimage) in self.preimages {
            self.committed.record_preimage(hash, &preimage);
        }
        count
    }
}

impl StateView for JournalState<'_> {
    fn storage(&self, address: &Address, cell: Word) -> Word {
        self.pending
            .get(&(*address, cell))
            .copied()
            .unwrap_or_else(|| self.committed.storage(address, cell))
    }

    fn record_preimage(&mut self, hash: B256, preimage: &[u8]) {
        self.preimages.push((hash, preimage.to_vec()));
    }
}
