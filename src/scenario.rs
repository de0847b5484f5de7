//! Scripted frame replay.
//!
//! A [`Scenario`] describes one call (target, caller, code, input, initial
//! storage) and the sequence of interpreter events the frame produces. The
//! runner feeds each event to an [`ExecutionContext`] exactly where an
//! interpreter would call its hooks, buffering stores in a journal. The
//! first halt stops the frame and discards every buffered write.
//!
//! # Scenario format
//!
//! ```json
//! {
//!   "address": "0x00000000000000000000000000000000000000aa",
//!   "code": "0x5b00",
//!   "hash_code": true,
//!   "input": "0xa9059cbb",
//!   "storage": [ { "cell": "0x1", "value": "0x2a" } ],
//!   "steps": [
//!     { "op": "hash", "key": "0x7", "slot": "0x3" },
//!     { "op": "store", "cell": "0x1", "value": "0x0" }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use shield_core::context::{CallerRef, CodeAndHash, ExecutionContext};
use shield_core::hasher::keccak256;
use shield_core::policy::PolicyProvider;
use shield_core::state::{MemoryState, StateView};
use shield_core::{Discovery, HaltReason, MetricsSnapshot, ShieldConfig, ShieldError};
use shield_types::encoding::parse_hex_bytes;
use shield_types::{word_to_bytes32, Address, Selector, Word, B256};
use tracing::{debug, info};

use crate::journal::JournalState;

fn default_gas() -> u64 {
    10_000_000
}

/// One storage cell of the target contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub cell: Word,
    pub value: Word,
}

/// One interpreter event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// KECCAK256 over `key . slot` (or `slot` alone). `hash` overrides the
    /// computed digest.
    Hash {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<Word>,
        slot: Word,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<Word>,
    },
    /// SLOAD
    Load { cell: Word },
    /// SSTORE
    Store { cell: Word, value: Word },
    /// JUMP / JUMPI target
    Jump { dest: Word },
    /// Charge gas
    Gas { amount: u64 },
    /// Bring the allow list up to date
    RefreshAllow,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Hash { .. } => "hash",
            Step::Load { .. } => "load",
            Step::Store { .. } => "store",
            Step::Jump { .. } => "jump",
            Step::Gas { .. } => "gas",
            Step::RefreshAllow => "refresh_allow",
        }
    }
}

/// A call to replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Contract whose storage is guarded
    pub address: Address,

    #[serde(default)]
    pub caller: Address,

    #[serde(default)]
    pub value: Word,

    #[serde(default = "default_gas")]
    pub gas: u64,

    /// Contract code, hex
    #[serde(default)]
    pub code: String,

    /// Hash keying the jump-dest analysis cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<B256>,

    /// Compute `code_hash` with Keccak-256 when it is not given. Without
    /// either the code is treated as init code.
    #[serde(default)]
    pub hash_code: bool,

    /// Call input, hex. The first four bytes select the policy.
    #[serde(default)]
    pub input: String,

    /// Initial storage of `address`
    #[serde(default)]
    pub storage: Vec<StorageEntry>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse scenario JSON: {}", e))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read scenario {}: {}", path.display(), e))?;
        Self::from_json_str(&json).map_err(|e| anyhow!("{}: {}", path.display(), e))
    }

    fn code_and_hash(&self) -> Result<CodeAndHash> {
        let code = parse_hex_bytes(&self.code, "code")?;
        Ok(match self.code_hash {
            Some(hash) => CodeAndHash::with_hash(code, hash),
            None if self.hash_code => CodeAndHash::new(code),
            None => CodeAndHash::ephemeral(code),
        })
    }

    fn initial_state(&self) -> MemoryState {
        self.storage.iter().fold(MemoryState::new(), |state, entry| {
            state.with_storage(self.address, entry.cell, entry.value)
        })
    }
}

/// Where and why a frame stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Halt {
    /// Index of the failing step; `None` when policy installation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub reason: HaltReason,
    pub message: String,
}

/// Outcome of a replayed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    pub protected: bool,
    pub steps_executed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt: Option<Halt>,
    pub gas_remaining: u64,
    /// Writes committed to storage (zero when halted)
    pub writes_committed: usize,
    /// Values returned by load steps, in order
    #[serde(default)]
    pub loads: Vec<StorageEntry>,
    /// Final storage of the target contract
    pub storage: Vec<StorageEntry>,
    /// Whether the extended policy was written back
    pub persisted: bool,
    pub metrics: MetricsSnapshot,
}

impl ScenarioReport {
    pub fn success(&self) -> bool {
        self.halt.is_none()
    }
}

/// Replay `scenario` against the policies in `provider`.
///
/// Errors are reserved for malformed scenarios and provider I/O during
/// write-back; a halted frame is a normal outcome reported in
/// [`ScenarioReport::halt`].
pub fn run_scenario(
    scenario: &Scenario,
    provider: &dyn PolicyProvider,
    config: &ShieldConfig,
) -> Result<ScenarioReport> {
    let code = scenario.code_and_hash()?;
    let input = parse_hex_bytes(&scenario.input, "input")?;
    let mut committed = scenario.initial_state();

    let mut ctx = ExecutionContext::new(
        CallerRef::Account(scenario.caller),
        scenario.address,
        scenario.value,
        scenario.gas,
        config.clone(),
    );
    ctx.set_code_optional_hash(scenario.address, code);
    ctx.set_input(input);

    let mut journal = JournalState::new(&mut committed);
    let mut loads = Vec::new();
    let mut steps_executed = 0;
    let mut halt = match ctx.apply_policy(provider) {
        Ok(_) => None,
        Err(err) => Some(halt_at(None, &err)),
    };

    if halt.is_none() {
        for (idx, step) in scenario.steps.iter().enumerate() {
            match execute_step(&mut ctx, &mut journal, step, &mut loads) {
                Ok(()) => steps_executed += 1,
                Err(err) => {
                    debug!(step = idx, op = step.name(), error = %err, "scenario: frame halted");
                    halt = Some(halt_at(Some(idx), &err));
                    break;
                }
            }
        }
    }

    let writes_committed = if halt.is_none() {
        journal.commit()
    } else {
        drop(journal);
        0
    };
    let persisted = if halt.is_none() {
        ctx.persist_policy(provider)?
    } else {
        false
    };

    info!(
        scenario = scenario.name.as_deref().unwrap_or("-"),
        protected = ctx.is_protected(),
        steps = steps_executed,
        halted = halt.is_some(),
        "scenario: replay finished"
    );

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        selector: ctx.selector(),
        protected: ctx.is_protected(),
        steps_executed,
        halt,
        gas_remaining: ctx.gas(),
        writes_committed,
        loads,
        storage: committed
            .account_storage(&scenario.address)
            .into_iter()
            .map(|(cell, value)| StorageEntry { cell, value })
            .collect(),
        persisted,
        metrics: ctx.metrics().snapshot(),
    })
}

fn halt_at(step: Option<usize>, err: &ShieldError) -> Halt {
    Halt {
        step,
        reason: err.halt_reason(),
        message: err.to_string(),
    }
}

fn execute_step(
    ctx: &mut ExecutionContext,
    journal: &mut JournalState<'_>,
    step: &Step,
    loads: &mut Vec<StorageEntry>,
) -> std::result::Result<(), ShieldError> {
    match step {
        Step::Hash { key, slot, hash } => {
            let mut preimage = Vec::with_capacity(64);
            if let Some(key) = key {
                preimage.extend_from_slice(&word_to_bytes32(key));
            }
            preimage.extend_from_slice(&word_to_bytes32(slot));
            let digest = match hash {
                Some(hash) => B256::from(word_to_bytes32(hash)),
                None => keccak256(&preimage),
            };
            let discovery = ctx.observe_keccak(&preimage, digest, journal);
            if discovery > Discovery::Known {
                debug!(slot = %slot, hash = %digest, ?discovery, "scenario: hash discovered cell");
            }
        }
        Step::Load { cell } => {
            let value = journal.storage(&ctx.address(), *cell);
            ctx.observe_load(*cell, value);
            loads.push(StorageEntry { cell: *cell, value });
        }
        Step::Store { cell, value } => {
            ctx.check_write(*cell, *value, journal)?;
            journal.write(ctx.address(), *cell, *value);
        }
        Step::Jump { dest } => {
            ctx.jump(*dest)?;
        }
        Step::Gas { amount } => ctx.charge_gas(*amount)?,
        Step::RefreshAllow => {
            ctx.refresh_allow(journal);
        }
    }
    Ok(())
}
