//! Shield Core
//!
//! Runtime storage-write policy engine for EVM call frames.
//!
//! Every call whose selector has a policy runs with two trees of declared
//! storage variables. The shield list vetoes SSTOREs that would touch a
//! protected cell; the allow list is only kept current. Mapping and dynamic
//! container cells are discovered while the frame runs by watching the
//! hashes the interpreter computes.
//!
//! # Core Modules
//!
//! - [`context`]: ExecutionContext, the per-frame state and interpreter hooks
//! - [`analysis`]: Jump-destination bitmaps and the shared cache
//! - [`variable`]: StorageVariable trees and their layouts
//! - [`identify`]: Mapping discovery from observed hashes
//! - [`dynamic`]: Dynamic array / string length resolution
//! - [`guard`]: The write guard
//! - [`allow`]: Allow-list refresh
//! - [`policy`]: PolicyDocument and the PolicyProvider seam
//!
//! # Example
//!
//! ```
//! use shield_core::context::{CallerRef, CodeAndHash, ExecutionContext};
//! use shield_core::policy::{MemoryPolicyStore, PolicyDocument};
//! use shield_core::state::MemoryState;
//! use shield_core::{ShieldConfig, StorageVariable};
//! use shield_types::{Address, Selector, Word};
//!
//! let selector = Selector([0xa9, 0x05, 0x9c, 0xbb]);
//! let store = MemoryPolicyStore::new().with_policy(
//!     PolicyDocument::new(selector)
//!         .with_shield(StorageVariable::plain(Word::from(1u64)).with_name("owner")),
//! );
//!
//! let mut ctx = ExecutionContext::new(
//!     CallerRef::Account(Address::ZERO),
//!     Address::repeat_byte(0x11),
//!     Word::ZERO,
//!     100_000,
//!     ShieldConfig::default(),
//! );
//! ctx.set_code_optional_hash(Address::repeat_byte(0x11), CodeAndHash::new(vec![0x00]));
//! ctx.set_input(selector.0.to_vec());
//! assert!(ctx.apply_policy(&store).unwrap());
//!
//! let mut state = MemoryState::new();
//! assert!(ctx.check_write(Word::from(1u64), Word::from(7u64), &mut state).is_err());
//! assert!(ctx.check_write(Word::from(2u64), Word::from(7u64), &mut state).is_ok());
//! ```

pub mod allow;
pub mod analysis;
pub mod config;
pub mod context;
pub mod dynamic;
pub mod env;
pub mod errors;
pub mod guard;
pub mod hasher;
pub mod identify;
pub mod metrics;
pub mod policy;
pub mod state;
pub mod variable;

pub use analysis::{CodeBitmap, JumpDestCache};
pub use config::{PackedSnapshot, PolicyPersistence, ShieldConfig};
pub use context::{CallerRef, CodeAndHash, ExecutionContext};
pub use errors::{HaltReason, ShieldError};
pub use identify::Discovery;
pub use metrics::{MetricsSnapshot, ShieldMetrics};
pub use policy::{MemoryPolicyStore, PolicyDocument, PolicyProvider};
pub use state::{MemoryState, StateView};
pub use variable::{Layout, StorageVariable, VariableKind};
