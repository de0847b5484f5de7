//! Reusable Keccak-256 scratch state.

use sha3::{Digest, Keccak256};
use shield_types::{b256_to_word, word_to_bytes32, Word, B256};

/// A Keccak-256 hasher that is reset after every digest so one instance can
/// serve every hash a frame computes.
#[derive(Clone, Default)]
pub struct KeccakScratch {
    state: Keccak256,
}

impl KeccakScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `data` and leave the state ready for the next use.
    pub fn hash(&mut self, data: &[u8]) -> B256 {
        self.state.update(data);
        let digest = self.state.finalize_reset();
        B256::from_slice(&digest)
    }

    /// Hash the 32-byte big-endian encoding of a word.
    pub fn hash_word(&mut self, word: &Word) -> Word {
        b256_to_word(&self.hash(&word_to_bytes32(word)))
    }

    /// Solidity mapping slot: `keccak256(key . slot)`.
    pub fn mapping_slot(&mut self, key: &Word, slot: &Word) -> Word {
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(&word_to_bytes32(key));
        preimage[32..].copy_from_slice(&word_to_bytes32(slot));
        b256_to_word(&self.hash(&preimage))
    }
}

impl std::fmt::Debug for KeccakScratch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeccakScratch").finish_non_exhaustive()
    }
}

/// One-shot Keccak-256.
pub fn keccak256(data: &[u8]) -> B256 {
    KeccakScratch::new().hash(data)
}
