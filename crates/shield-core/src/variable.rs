//! Protected storage variables.
//!
//! A [`StorageVariable`] is one node of a policy tree. Top-level nodes come
//! from a policy document; nested mapping children are synthesized at runtime
//! when the mapping identifier sees a new key hash. Every node owns its
//! children, so traversal is plain recursion bounded by the declared nesting
//! depth.
//!
//! # Document shape
//!
//! ```json
//! { "name": "balances", "slot": "0x3", "kind": "mapping",
//!   "depth": 0, "value_type": "uint256" }
//! { "name": "paused", "slot": "0x0", "kind": "packed", "offset": 11, "width": 1 }
//! { "name": "holders", "slot": "0x4", "kind": "dynamic" }
//! { "name": "owner", "slot": "0x1", "kind": "plain" }
//! ```

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use shield_types::encoding::format_word;
use shield_types::Word;

/// One declared or discovered protected variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVariable {
    /// Human-readable label, used in logs and denial errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Declared base cell, or the key hash identifying a mapping child
    pub slot: Word,

    #[serde(flatten)]
    pub layout: Layout,

    /// Cells currently protected by this node. Rebuilt by
    /// [`StorageVariable::initialize`] and never persisted.
    #[serde(skip)]
    pub tracked: BTreeSet<Word>,
}

/// Storage layout of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// A full-slot value.
    Plain,
    /// A field sharing its slot with other fields.
    Packed(PackedField),
    /// An array or string whose elements follow `keccak(base)`.
    Dynamic(DynamicRange),
    /// A (possibly nested) mapping.
    Mapping(MappingLayout),
}

/// Position of a packed field inside its slot.
///
/// `offset` counts bytes from the most significant end of the 32-byte
/// big-endian slot encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedField {
    pub offset: u8,
    pub width: u8,
    /// Most recent full-slot value seen for this field's slot
    #[serde(default)]
    pub last_observed: Word,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRange {
    /// Cell holding the length; defaults to the variable's slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Word>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingLayout {
    /// Remaining nesting below this node; 0 means values live here
    pub depth: u32,
    /// Type tag of the innermost value
    #[serde(default)]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StorageVariable>,
    /// Key hashes observed at this leaf
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub leaf_hashes: BTreeSet<Word>,
    /// Length cells of dynamic values discovered under this leaf
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dynamic_bases: BTreeSet<Word>,
}

/// Field-less view of [`Layout`], cheap to match on while mutating a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Plain,
    Packed,
    Dynamic,
    Mapping,
}

/// True when a mapping value type is stored as a dynamic container.
pub fn is_dynamic_type(tag: &str) -> bool {
    let tag = tag.trim();
    tag.eq_ignore_ascii_case("dynamic")
        || tag.eq_ignore_ascii_case("string")
        || tag.eq_ignore_ascii_case("bytes")
        || tag.ends_with("[]")
}

impl PackedField {
    /// Word with 0xff in the field's bytes and zero elsewhere.
    pub fn mask(&self) -> Word {
        let mut bytes = [0u8; 32];
        bytes
            .iter_mut()
            .skip(usize::from(self.offset))
            .take(usize::from(self.width))
            .for_each(|b| *b = 0xff);
        Word::from_be_bytes(bytes)
    }

    /// True if `proposed` differs from `current` inside the field.
    pub fn changes_field(&self, current: &Word, proposed: &Word) -> bool {
        let mask = self.mask();
        (*current & mask) != (*proposed & mask)
    }
}

impl StorageVariable {
    fn with_layout(slot: Word, layout: Layout) -> Self {
        Self {
            name: None,
            slot,
            layout,
            tracked: BTreeSet::new(),
        }
    }

    pub fn plain(slot: Word) -> Self {
        Self::with_layout(slot, Layout::Plain)
    }

    pub fn packed(slot: Word, offset: u8, width: u8) -> Self {
        Self::with_layout(
            slot,
            Layout::Packed(PackedField {
                offset,
                width,
                last_observed: Word::ZERO,
            }),
        )
    }

    pub fn dynamic(slot: Word) -> Self {
        Self::with_layout(slot, Layout::Dynamic(DynamicRange::default()))
    }

    pub fn mapping(slot: Word, depth: u32, value_type: impl Into<String>) -> Self {
        Self::with_layout(
            slot,
            Layout::Mapping(MappingLayout {
                depth,
                value_type: value_type.into(),
                children: Vec::new(),
                leaf_hashes: BTreeSet::new(),
                dynamic_bases: BTreeSet::new(),
            }),
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// A child synthesized for a newly seen key hash. Already initialized.
    pub(crate) fn mapping_child(hash: Word, depth: u32, value_type: String) -> Self {
        let mut child = Self::mapping(hash, depth, value_type);
        child.tracked.insert(hash);
        child
    }

    pub fn kind(&self) -> VariableKind {
        match self.layout {
            Layout::Plain => VariableKind::Plain,
            Layout::Packed(_) => VariableKind::Packed,
            Layout::Dynamic(_) => VariableKind::Dynamic,
            Layout::Mapping(_) => VariableKind::Mapping,
        }
    }

    /// Name if set, otherwise the slot in hex.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| format_word(&self.slot))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.layout, Layout::Mapping(_))
    }

    /// Declared dynamic, or a mapping leaf holding dynamic values.
    pub fn is_dynamic(&self) -> bool {
        match &self.layout {
            Layout::Dynamic(_) => true,
            Layout::Mapping(m) => !m.dynamic_bases.is_empty(),
            _ => false,
        }
    }

    /// Nesting depth below this node (0 for non-mappings).
    pub fn depth(&self) -> u32 {
        match &self.layout {
            Layout::Mapping(m) => m.depth,
            _ => 0,
        }
    }

    pub fn children(&self) -> &[StorageVariable] {
        match &self.layout {
            Layout::Mapping(m) => &m.children,
            _ => &[],
        }
    }

    pub fn is_tracked(&self, cell: &Word) -> bool {
        self.tracked.contains(cell)
    }

    /// Nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(StorageVariable::node_count)
            .sum::<usize>()
    }

    /// Reset tracked cells to the node's own slot plus the leaf hashes it has
    /// observed, recursively.
    ///
    /// Cells derived by the dynamic resolver are dropped; they come back on
    /// the next refresh.
    pub fn initialize(&mut self) {
        self.tracked = BTreeSet::from([self.slot]);
        if let Layout::Mapping(mapping) = &mut self.layout {
            self.tracked.extend(mapping.leaf_hashes.iter().copied());
            self.tracked.extend(mapping.dynamic_bases.iter().copied());
            for child in &mut mapping.children {
                child.initialize();
            }
        }
    }

    /// Check layout invariants of this subtree.
    pub fn validate(&self) -> Result<()> {
        match &self.layout {
            Layout::Packed(field) => {
                if field.width == 0 {
                    bail!("packed variable '{}' has zero width", self.label());
                }
                if usize::from(field.offset) + usize::from(field.width) > 32 {
                    bail!(
                        "packed variable '{}' spans bytes {}..{} past the 32-byte slot",
                        self.label(),
                        field.offset,
                        usize::from(field.offset) + usize::from(field.width)
                    );
                }
            }
            Layout::Mapping(mapping) => {
                if mapping.depth == 0 && !mapping.children.is_empty() {
                    bail!("mapping leaf '{}' cannot have children", self.label());
                }
                for child in &mapping.children {
                    if !child.is_mapping() || child.depth() + 1 != mapping.depth {
                        bail!(
                            "child '{}' of mapping '{}' must be a mapping at depth {}",
                            child.label(),
                            self.label(),
                            mapping.depth.saturating_sub(1)
                        );
                    }
                    child.validate()?;
                }
            }
            Layout::Plain | Layout::Dynamic(_) => {}
        }
        Ok(())
    }
}
