//! Storage Shield
//!
//! Runtime storage-write firewall for EVM contract execution:
//!
//! - **Policy engine**: see [`shield_core`] for the execution context and the
//!   write guard
//! - **Policy storage**: see [`shield_policy_store`] for on-disk policies
//! - **Scenario replay**: [`scenario`] drives a frame through a scripted
//!   sequence of hash, load, store, jump and gas steps, the way an
//!   interpreter would
//! - **Journaled state**: [`journal`] buffers a frame's writes so a halted
//!   frame leaves storage untouched

pub mod journal;
pub mod scenario;

pub use scenario::{run_scenario, Scenario, ScenarioReport, Step};
