//! Shared types for the storage-shield workspace.
//!
//! Everything that crosses a crate boundary (storage words, contract
//! addresses, code hashes, function selectors) lives here so that the
//! policy engine, the policy store and the CLI agree on one representation.

pub mod encoding;
pub mod selector;

pub use alloy_primitives::{Address, B256, U256};
pub use selector::Selector;

/// A 256-bit storage word. Cells, values and hashes are all words.
pub type Word = U256;

/// Big-endian 32-byte encoding of a word, the layout the EVM hashes.
pub fn word_to_bytes32(word: &Word) -> [u8; 32] {
    word.to_be_bytes::<32>()
}

/// Interpret 32 big-endian bytes as a word.
pub fn word_from_bytes32(bytes: [u8; 32]) -> Word {
    Word::from_be_bytes(bytes)
}

/// Convert a hash into the word used as a storage cell.
pub fn b256_to_word(hash: &B256) -> Word {
    Word::from_be_bytes(hash.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_bytes_are_big_endian() {
        let word = Word::from(0x0102u64);
        let bytes = word_to_bytes32(&word);
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert_eq!(word_from_bytes32(bytes), word);
    }

    #[test]
    fn test_b256_conversion_is_big_endian() {
        let mut bytes = [0u8; 32];
        bytes[31] = 7;
        assert_eq!(b256_to_word(&B256::from(bytes)), Word::from(7u64));
    }
}
