//! Borrowed view of a frame handed to tree traversals.

use shield_types::{b256_to_word, word_to_bytes32, Address, Word};

use crate::config::ShieldConfig;
use crate::hasher::KeccakScratch;
use crate::metrics::ShieldMetrics;
use crate::state::StateView;

/// What a traversal needs from the running frame: storage reads for the
/// active contract, the frame's hash scratch state, config and counters.
pub struct ShieldEnv<'a> {
    pub state: &'a mut dyn StateView,
    pub address: Address,
    pub hasher: &'a mut KeccakScratch,
    pub config: &'a ShieldConfig,
    pub metrics: &'a ShieldMetrics,
}

impl ShieldEnv<'_> {
    /// Current value of `cell` for the active contract.
    pub fn read(&self, cell: Word) -> Word {
        self.state.storage(&self.address, cell)
    }

    /// First element cell of the dynamic container whose length is at `base`.
    pub fn data_start(&mut self, base: &Word) -> Word {
        let preimage = word_to_bytes32(base);
        let digest = self.hasher.hash(&preimage);
        if self.config.record_preimages {
            self.state.record_preimage(digest, &preimage);
        }
        b256_to_word(&digest)
    }
}
