//! Filesystem-backed policy provider.
//!
//! This crate provides:
//! - `FsPolicyStore`: one JSON document per selector, sharded by the first
//!   selector byte (`<root>/policies/<aa>/<selector>.json`)
//! - `paths`: layout helpers and atomic write utilities

pub mod paths;
pub mod store;

pub use store::FsPolicyStore;
