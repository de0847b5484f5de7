//! Four-byte function selectors.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The leading four bytes of call input that pick the contract function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector of a call, or `None` when the input is shorter than four bytes.
    pub fn from_input(input: &[u8]) -> Option<Self> {
        let head: [u8; 4] = input.get(..4)?.try_into().ok()?;
        Some(Self(head))
    }

    /// Lowercase hex without prefix, used as a file stem by policy stores.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True when `input` starts with this selector.
    pub fn matches(&self, input: &[u8]) -> bool {
        input.starts_with(&self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for Selector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| anyhow!("Invalid selector '{}': {}", trimmed, e))?;
        if bytes.len() != 4 {
            bail!(
                "Invalid selector '{}': expected 4 bytes, got {}",
                trimmed,
                bytes.len()
            );
        }
        let mut out = [0u8; 4];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input() {
        let input = [0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01];
        let selector = Selector::from_input(&input).unwrap();
        assert_eq!(selector, Selector([0xa9, 0x05, 0x9c, 0xbb]));
        assert!(selector.matches(&input));
        assert!(Selector::from_input(&[0xa9, 0x05]).is_none());
    }

    #[test]
    fn test_parse_and_display() {
        let selector: Selector = "0xA9059CBB".parse().unwrap();
        assert_eq!(selector.to_string(), "0xa9059cbb");
        assert!("0xa9059c".parse::<Selector>().is_err());
        assert!("nothex!!".parse::<Selector>().is_err());
    }

    #[test]
    fn test_serde_roundtrip_uses_bare_hex() {
        let selector = Selector([0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&selector).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Selector = serde_json::from_str("\"0xdeadbeef\"").unwrap();
        assert_eq!(back, selector);
    }
}
