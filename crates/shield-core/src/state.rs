//! The storage collaborator seen by the policy engine.

use std::collections::{BTreeMap, HashMap};

use shield_types::{Address, Word, B256};

/// Read access to contract storage plus the preimage side channel.
///
/// Reads must reflect committed plus pending writes of the running
/// transaction. An empty cell reads as zero.
pub trait StateView {
    /// Current value of `cell` in the storage of `address`.
    fn storage(&self, address: &Address, cell: Word) -> Word;

    /// Record a hash preimage for later audit. Only called when preimage
    /// recording is enabled in the config.
    fn record_preimage(&mut self, hash: B256, preimage: &[u8]) {
        let _ = (hash, preimage);
    }
}

/// In-memory state, used by the scenario harness and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    storage: HashMap<Address, BTreeMap<Word, Word>>,
    preimages: HashMap<B256, Vec<u8>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell. Writing zero clears it.
    pub fn set_storage(&mut self, address: Address, cell: Word, value: Word) {
        let account = self.storage.entry(address).or_default();
        if value.is_zero() {
            account.remove(&cell);
        } else {
            account.insert(cell, value);
        }
    }

    /// Builder form of [`MemoryState::set_storage`].
    pub fn with_storage(mut self, address: Address, cell: Word, value: Word) -> Self {
        self.set_storage(address, cell, value);
        self
    }

    /// Non-empty cells of one account, ordered by cell.
    pub fn account_storage(&self, address: &Address) -> BTreeMap<Word, Word> {
        self.storage.get(address).cloned().unwrap_or_default()
    }

    /// Preimages recorded so far.
    pub fn preimages(&self) -> &HashMap<B256, Vec<u8>> {
        &self.preimages
    }
}

impl StateView for MemoryState {
    fn storage(&self, address: &Address, cell: Word) -> Word {
        self.storage
            .get(address)
            .and_then(|account| account.get(&cell))
            .copied()
            .unwrap_or(Word::ZERO)
    }

    fn record_preimage(&mut self, hash: B256, preimage: &[u8]) {
        self.preimages.insert(hash, preimage.to_vec());
    }
}
