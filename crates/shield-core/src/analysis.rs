//! Jump-destination analysis.
//!
//! A [`CodeBitmap`] marks every code byte that starts an instruction. Bytes
//! that are PUSH operands are data and can never be jump targets, even when
//! they happen to equal the JUMPDEST opcode.
//!
//! Bitmaps are shared across call frames through a [`JumpDestCache`] keyed by
//! code hash. Frames running code without a stable hash (init code that is not
//! in the state yet) keep a private bitmap instead so the shared cache only
//! ever grows with deployed code.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shield_types::B256;

/// Halts execution. Also returned for reads past the end of code.
pub const STOP: u8 = 0x00;
/// The only valid target of JUMP / JUMPI.
pub const JUMPDEST: u8 = 0x5b;
/// First push opcode carrying immediate data (1 byte).
pub const PUSH1: u8 = 0x60;
/// Last push opcode carrying immediate data (32 bytes).
pub const PUSH32: u8 = 0x7f;

/// Number of immediate data bytes following `op`.
pub fn push_data_len(op: u8) -> usize {
    if (PUSH1..=PUSH32).contains(&op) {
        usize::from(op - PUSH1) + 1
    } else {
        0
    }
}

/// One bit per code byte; set means the byte is an instruction boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl CodeBitmap {
    fn new_empty(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Scan `code` left to right, skipping push data.
    pub fn analyze(code: &[u8]) -> Self {
        let mut bitmap = Self::new_empty(code.len());
        let mut pc = 0usize;
        while pc < code.len() {
            bitmap.set(pc);
            pc += 1 + push_data_len(code[pc]);
        }
        bitmap
    }

    fn set(&mut self, idx: usize) {
        if idx >= self.len {
            return;
        }
        self.bits[idx / 64] |= 1_u64 << (idx % 64);
    }

    /// True if `pc` is an instruction boundary. Out of range is never code.
    pub fn is_code_segment(&self, pc: u64) -> bool {
        let Ok(idx) = usize::try_from(pc) else {
            return false;
        };
        if idx >= self.len {
            return false;
        }
        (self.bits[idx / 64] >> (idx % 64)) & 1 == 1
    }

    /// Number of code bytes covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Offsets in `code` that are valid jump destinations.
pub fn jump_destinations(code: &[u8]) -> Vec<usize> {
    let bitmap = CodeBitmap::analyze(code);
    code.iter()
        .enumerate()
        .filter(|(pc, op)| **op == JUMPDEST && bitmap.is_code_segment(*pc as u64))
        .map(|(pc, _)| pc)
        .collect()
}

/// Shared, insert-once cache of bitmaps keyed by code hash.
///
/// Cloning the cache clones the handle, not the map: a child frame built from
/// a parent frame sees (and populates) the same entries.
#[derive(Debug, Clone, Default)]
pub struct JumpDestCache {
    inner: Arc<RwLock<HashMap<B256, Arc<CodeBitmap>>>>,
}

impl JumpDestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing analysis.
    pub fn get(&self, code_hash: &B256) -> Option<Arc<CodeBitmap>> {
        self.inner.read().get(code_hash).cloned()
    }

    /// Return the cached bitmap for `code_hash`, analyzing `code` on a miss.
    ///
    /// The boolean is true on a cache hit.
    pub fn get_or_analyze(&self, code_hash: B256, code: &[u8]) -> (Arc<CodeBitmap>, bool) {
        let cached = self.get(&code_hash);
        if let Some(bitmap) = cached {
            return (bitmap, true);
        }
        let mut map = self.inner.write();
        let mut analyzed = false;
        let bitmap = map
            .entry(code_hash)
            .or_insert_with(|| {
                analyzed = true;
                Arc::new(CodeBitmap::analyze(code))
            })
            .clone();
        // Another frame may have inserted between the read and write lock.
        (bitmap, !analyzed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// True if both handles point at the same underlying map.
    pub fn shares_storage_with(&self, other: &JumpDestCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
