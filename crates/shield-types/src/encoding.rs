//! Hex parsing and formatting helpers.
//!
//! Used at the edges where raw hex arrives from files and CLI arguments.

use anyhow::{anyhow, Result};

use crate::Word;

/// Decode hex (an optional `0x` prefix is accepted). `context` names the
/// value in the error message.
pub fn parse_hex_bytes(hex_str: &str, context: &str) -> Result<Vec<u8>> {
    let trimmed = hex_str.trim();
    let digits = strip_hex_prefix(trimmed);
    hex::decode(digits).map_err(|e| anyhow!("Invalid {} hex '{}': {}", context, trimmed, e))
}

/// Compact lowercase hex for a word (`0x0` for zero, no padding).
pub fn format_word(word: &Word) -> String {
    format!("{:#x}", word)
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
