//! Execution context for one call frame.
//!
//! The context owns everything the policy engine needs while a frame runs:
//! the code being executed and its jump-destination analysis, the call
//! parameters, the gas budget and the active policy trees. The interpreter
//! drives it through a small set of hooks:
//!
//! - [`ExecutionContext::apply_policy`] once the input is known
//! - [`ExecutionContext::observe_keccak`] after every KECCAK256
//! - [`ExecutionContext::observe_load`] after every SLOAD
//! - [`ExecutionContext::check_write`] before every SSTORE
//! - [`ExecutionContext::jump`] for JUMP / JUMPI targets
//!
//! Trees are mutated in place and never shared between frames. The only
//! cross-frame state is the [`JumpDestCache`] and the metrics handle, both
//! inherited from the calling frame.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use shield_types::{b256_to_word, word_from_bytes32, Address, Selector, Word, B256};
use tracing::{debug, trace, warn};

use crate::analysis::{CodeBitmap, JumpDestCache, JUMPDEST, STOP};
use crate::config::{PolicyPersistence, ShieldConfig};
use crate::env::ShieldEnv;
use crate::errors::ShieldError;
use crate::hasher::{keccak256, KeccakScratch};
use crate::identify::Discovery;
use crate::metrics::ShieldMetrics;
use crate::policy::{PolicyDocument, PolicyProvider};
use crate::state::StateView;
use crate::variable::StorageVariable;

/// Who initiated the frame.
#[derive(Debug, Clone, Copy)]
pub enum CallerRef<'a> {
    /// An externally owned account (top-level call).
    Account(Address),
    /// Another running frame (nested call).
    Frame(&'a ExecutionContext),
}

impl CallerRef<'_> {
    pub fn address(&self) -> Address {
        match self {
            CallerRef::Account(address) => *address,
            CallerRef::Frame(frame) => frame.address(),
        }
    }
}

/// Call parameters of the calling frame, kept for delegate calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParentFrame {
    caller: Address,
    value: Word,
}

/// Code together with the hash used to key its analysis.
///
/// A zero hash marks code that is not stored in the state (init code); such
/// code is analyzed privately and never enters the shared cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAndHash {
    pub code: Vec<u8>,
    pub hash: B256,
}

impl CodeAndHash {
    /// Hash the code with Keccak-256.
    pub fn new(code: Vec<u8>) -> Self {
        let hash = keccak256(&code);
        Self { code, hash }
    }

    pub fn with_hash(code: Vec<u8>, hash: B256) -> Self {
        Self { code, hash }
    }

    /// Code without a stable hash.
    pub fn ephemeral(code: Vec<u8>) -> Self {
        Self {
            code,
            hash: B256::ZERO,
        }
    }
}

/// State of one running call frame.
#[derive(Debug)]
pub struct ExecutionContext {
    caller_address: Address,
    parent: Option<ParentFrame>,
    self_address: Address,

    jump_dests: JumpDestCache,
    analysis: Option<Arc<CodeBitmap>>,

    code: Vec<u8>,
    code_hash: B256,
    code_address: Address,
    input: Vec<u8>,

    gas: u64,
    value: Word,

    policy: Option<PolicyDocument>,
    hasher: KeccakScratch,
    config: ShieldConfig,
    metrics: ShieldMetrics,
}

impl ExecutionContext {
    /// Create a frame running at `address`.
    ///
    /// A frame called by another frame shares that frame's analysis cache and
    /// metrics. A top-level frame starts with fresh ones.
    pub fn new(
        caller: CallerRef<'_>,
        address: Address,
        value: Word,
        gas: u64,
        config: ShieldConfig,
    ) -> Self {
        let (jump_dests, metrics, parent) = match caller {
            CallerRef::Frame(frame) => (
                frame.jump_dests.clone(),
                frame.metrics.clone(),
                Some(ParentFrame {
                    caller: frame.caller_address,
                    value: frame.value,
                }),
            ),
            CallerRef::Account(_) => (JumpDestCache::new(), ShieldMetrics::new(), None),
        };
        Self {
            caller_address: caller.address(),
            parent,
            self_address: address,
            jump_dests,
            analysis: None,
            code: Vec::new(),
            code_hash: B256::ZERO,
            code_address: address,
            input: Vec::new(),
            gas,
            value,
            policy: None,
            hasher: KeccakScratch::new(),
            config,
            metrics,
        }
    }

    /// Turn this frame into a delegate call: caller and value are taken from
    /// the calling frame.
    pub fn as_delegate(&mut self) -> Result<&mut Self, ShieldError> {
        let parent = self.parent.ok_or(ShieldError::DelegateWithoutParent)?;
        self.caller_address = parent.caller;
        self.value = parent.value;
        Ok(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn caller(&self) -> Address {
        self.caller_address
    }

    pub fn address(&self) -> Address {
        self.self_address
    }

    /// Account whose code is running (differs from `address` for delegate calls).
    pub fn code_address(&self) -> Address {
        self.code_address
    }

    pub fn value(&self) -> Word {
        self.value
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn code_hash(&self) -> B256 {
        self.code_hash
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn set_input(&mut self, input: Vec<u8>) {
        self.input = input;
    }

    pub fn set_call_code(&mut self, address: Address, hash: B256, code: Vec<u8>) {
        self.code = code;
        self.code_hash = hash;
        self.code_address = address;
        self.analysis = None;
    }

    pub fn set_code_optional_hash(&mut self, address: Address, code: CodeAndHash) {
        self.set_call_code(address, code.hash, code.code);
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ShieldMetrics {
        &self.metrics
    }

    pub fn jump_dest_cache(&self) -> &JumpDestCache {
        &self.jump_dests
    }

    // =========================================================================
    // Gas
    // =========================================================================

    /// Deduct `amount` if available. Returns false (and deducts nothing) when
    /// the frame cannot afford it.
    pub fn use_gas(&mut self, amount: u64) -> bool {
        match self.gas.checked_sub(amount) {
            Some(remaining) => {
                self.gas = remaining;
                true
            }
            None => false,
        }
    }

    pub fn charge_gas(&mut self, amount: u64) -> Result<(), ShieldError> {
        if self.use_gas(amount) {
            return Ok(());
        }
        Err(ShieldError::OutOfGas {
            requested: amount,
            remaining: self.gas,
        })
    }

    // =========================================================================
    // Code analysis
    // =========================================================================

    /// Opcode at `n`, or STOP past the end of code.
    pub fn get_op(&self, n: u64) -> u8 {
        usize::try_from(n)
            .ok()
            .and_then(|idx| self.code.get(idx).copied())
            .unwrap_or(STOP)
    }

    /// True if `dest` is a JUMPDEST on an instruction boundary.
    pub fn valid_jump_dest(&mut self, dest: Word) -> bool {
        let Ok(pc) = u64::try_from(dest) else {
            return false;
        };
        let Ok(idx) = usize::try_from(pc) else {
            return false;
        };
        if self.code.get(idx) != Some(&JUMPDEST) {
            return false;
        }
        self.is_code(pc)
    }

    /// Validate a jump target and return it as a program counter.
    pub fn jump(&mut self, dest: Word) -> Result<u64, ShieldError> {
        if !self.valid_jump_dest(dest) {
            return Err(ShieldError::InvalidJumpDestination { dest });
        }
        u64::try_from(dest).map_err(|_| ShieldError::InvalidJumpDestination { dest })
    }

    /// True if `pc` starts an instruction.
    pub fn is_code(&mut self, pc: u64) -> bool {
        let bitmap = match &self.analysis {
            Some(bitmap) => Arc::clone(bitmap),
            None => {
                let bitmap = self.analyze_code();
                self.analysis = Some(Arc::clone(&bitmap));
                bitmap
            }
        };
        bitmap.is_code_segment(pc)
    }

    fn analyze_code(&self) -> Arc<CodeBitmap> {
        if self.code_hash == B256::ZERO {
            self.metrics.record_local_analysis();
            trace!(len = self.code.len(), "context: analyzed ephemeral code");
            return Arc::new(CodeBitmap::analyze(&self.code));
        }
        let (bitmap, hit) = self.jump_dests.get_or_analyze(self.code_hash, &self.code);
        if hit {
            self.metrics.record_analysis_hit();
        } else {
            self.metrics.record_analysis_miss();
        }
        trace!(code_hash = %self.code_hash, hit, "context: jump-dest analysis");
        bitmap
    }

    // =========================================================================
    // Policy
    // =========================================================================

    /// Install the policy for the current input's selector.
    ///
    /// Returns `Ok(false)` when the input has no selector or the provider has
    /// no policy for it. A provider failure or an invalid document halts the
    /// frame: a protected call never runs unprotected.
    pub fn apply_policy(&mut self, provider: &dyn PolicyProvider) -> Result<bool, ShieldError> {
        self.policy = None;
        let Some(selector) = Selector::from_input(&self.input) else {
            return Ok(false);
        };
        let fail = |message: String| {
            warn!(selector = %selector, error = %message, "context: policy load failed");
            ShieldError::PolicyLoad { selector, message }
        };

        let mut doc = match provider.load(selector) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                trace!(selector = %selector, "context: selector unprotected");
                return Ok(false);
            }
            Err(e) => return Err(fail(format!("{:#}", e))),
        };
        if !doc.selector.matches(&self.input) {
            return Err(fail(format!("document is keyed by {}", doc.selector)));
        }
        doc.validate().map_err(|e| fail(format!("{:#}", e)))?;
        doc.initialize();

        debug!(
            selector = %selector,
            address = %self.self_address,
            shield = doc.shield.len(),
            allow = doc.allow.len(),
            "context: policy installed"
        );
        self.policy = Some(doc);
        Ok(true)
    }

    /// Save the active (possibly extended) policy when write-back is enabled.
    ///
    /// Returns true if a document was saved.
    pub fn persist_policy(&self, provider: &dyn PolicyProvider) -> Result<bool> {
        if self.config.persistence != PolicyPersistence::WriteBack {
            return Ok(false);
        }
        let Some(policy) = &self.policy else {
            return Ok(false);
        };
        let mut doc = policy.clone();
        doc.updated_at = Some(Utc::now());
        provider.save(&doc)?;
        debug!(
            selector = %doc.selector,
            nodes = doc.node_count(),
            "context: policy written back"
        );
        Ok(true)
    }

    pub fn is_protected(&self) -> bool {
        self.policy.is_some()
    }

    pub fn selector(&self) -> Option<Selector> {
        self.policy.as_ref().map(|doc| doc.selector)
    }

    pub fn policy(&self) -> Option<&PolicyDocument> {
        self.policy.as_ref()
    }

    pub fn shield(&self) -> &[StorageVariable] {
        self.policy
            .as_ref()
            .map(|doc| doc.shield.as_slice())
            .unwrap_or_default()
    }

    pub fn allow(&self) -> &[StorageVariable] {
        self.policy
            .as_ref()
            .map(|doc| doc.allow.as_slice())
            .unwrap_or_default()
    }

    // =========================================================================
    // Interpreter hooks
    // =========================================================================

    /// Attribute a `(preimage slot, hash)` pair to the shield and allow trees.
    pub fn observe_hash(
        &mut self,
        preimage_slot: Word,
        hash: Word,
        state: &mut dyn StateView,
    ) -> Discovery {
        let Some(policy) = self.policy.as_mut() else {
            return Discovery::Unmatched;
        };
        self.metrics.record_hash_observed();
        let mut env = ShieldEnv {
            state,
            address: self.self_address,
            hasher: &mut self.hasher,
            config: &self.config,
            metrics: &self.metrics,
        };
        policy
            .shield
            .iter_mut()
            .chain(policy.allow.iter_mut())
            .map(|var| var.identify(preimage_slot, hash, &mut env))
            .max()
            .unwrap_or(Discovery::Unmatched)
    }

    /// KECCAK256 hook. The slot is the trailing 32 bytes of the preimage,
    /// which covers both `keccak(key . slot)` and `keccak(slot)`. Shorter
    /// preimages cannot address storage and are ignored.
    pub fn observe_keccak(
        &mut self,
        preimage: &[u8],
        hash: B256,
        state: &mut dyn StateView,
    ) -> Discovery {
        let Some(tail) = preimage.len().checked_sub(32).map(|start| &preimage[start..]) else {
            return Discovery::Unmatched;
        };
        let mut slot = [0u8; 32];
        slot.copy_from_slice(tail);
        self.observe_hash(word_from_bytes32(slot), b256_to_word(&hash), state)
    }

    /// SSTORE hook. Every shield tree is consulted; any denial rejects the
    /// write. Packed snapshots only move once the write is accepted.
    pub fn check_write(
        &mut self,
        cell: Word,
        value: Word,
        state: &mut dyn StateView,
    ) -> Result<(), ShieldError> {
        let Some(policy) = self.policy.as_mut() else {
            return Ok(());
        };
        self.metrics.record_write_checked();
        let mut env = ShieldEnv {
            state,
            address: self.self_address,
            hasher: &mut self.hasher,
            config: &self.config,
            metrics: &self.metrics,
        };

        let mut denied_by = None;
        for var in policy.shield.iter_mut() {
            if !var.can_write(cell, value, &mut env) && denied_by.is_none() {
                denied_by = Some(var.label());
            }
        }

        if let Some(variable) = denied_by {
            self.metrics.record_write_denied();
            warn!(
                address = %self.self_address,
                cell = %cell,
                variable = %variable,
                "guard: write denied"
            );
            return Err(ShieldError::WriteDenied {
                address: self.self_address,
                cell,
                variable,
            });
        }

        for var in policy.shield.iter_mut() {
            var.observe_value(cell, value);
        }
        Ok(())
    }

    /// SLOAD hook: remember the value for packed fields in cached mode.
    pub fn observe_load(&mut self, cell: Word, value: Word) {
        if let Some(policy) = self.policy.as_mut() {
            policy
                .shield
                .iter_mut()
                .chain(policy.allow.iter_mut())
                .for_each(|var| var.observe_value(cell, value));
        }
    }

    /// Bring the allow trees up to date. Returns the number of newly
    /// tracked cells.
    pub fn refresh_allow(&mut self, state: &mut dyn StateView) -> usize {
        let Some(policy) = self.policy.as_mut() else {
            return 0;
        };
        let mut env = ShieldEnv {
            state,
            address: self.self_address,
            hasher: &mut self.hasher,
            config: &self.config,
            metrics: &self.metrics,
        };
        policy
            .allow
            .iter_mut()
            .map(|var| var.refresh_allowed(&mut env))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MemoryPolicyStore;
    use crate::state::MemoryState;
    use anyhow::anyhow;

    fn w(n: u64) -> Word {
        Word::from(n)
    }

    fn eoa() -> Address {
        Address::repeat_byte(0x01)
    }

    fn contract() -> Address {
        Address::repeat_byte(0x02)
    }

    fn sel() -> Selector {
        Selector([0xde, 0xad, 0xbe, 0xef])
    }

    fn frame() -> ExecutionContext {
        ExecutionContext::new(
            CallerRef::Account(eoa()),
            contract(),
            w(5),
            1_000,
            ShieldConfig::default(),
        )
    }

    struct FailingProvider;

    impl PolicyProvider for FailingProvider {
        fn load(&self, _selector: Selector) -> Result<Option<PolicyDocument>> {
            Err(anyhow!("disk on fire"))
        }

        fn save(&self, _doc: &PolicyDocument) -> Result<()> {
            Ok(())
        }

        fn selectors(&self) -> Result<Vec<Selector>> {
            Ok(Vec::new())
        }
    }

    /// Answers every selector with the same stored document.
    struct MisfiledProvider(PolicyDocument);

    impl PolicyProvider for MisfiledProvider {
        fn load(&self, _selector: Selector) -> Result<Option<PolicyDocument>> {
            Ok(Some(self.0.clone()))
        }

        fn save(&self, _doc: &PolicyDocument) -> Result<()> {
            Ok(())
        }

        fn selectors(&self) -> Result<Vec<Selector>> {
            Ok(vec![self.0.selector])
        }
    }

    #[test]
    fn test_use_gas_never_underflows() {
        let mut ctx = frame();
        assert!(ctx.use_gas(400));
        assert!(!ctx.use_gas(601));
        assert_eq!(ctx.gas(), 600);
        let err = ctx.charge_gas(700).unwrap_err();
        assert_eq!(
            err,
            ShieldError::OutOfGas {
                requested: 700,
                remaining: 600
            }
        );
        assert!(ctx.charge_gas(600).is_ok());
        assert_eq!(ctx.gas(), 0);
    }

    #[test]
    fn test_get_op_past_end_is_stop() {
        let mut ctx = frame();
        ctx.set_code_optional_hash(contract(), CodeAndHash::new(vec![0x60, 0x01]));
        assert_eq!(ctx.get_op(0), 0x60);
        assert_eq!(ctx.get_op(2), STOP);
        assert_eq!(ctx.get_op(u64::MAX), STOP);
    }

    #[test]
    fn test_jump_validation() {
        let mut ctx = frame();
        // JUMPDEST, PUSH1 0x5b, JUMPDEST
        ctx.set_code_optional_hash(contract(), CodeAndHash::new(vec![0x5b, 0x60, 0x5b, 0x5b]));
        assert_eq!(ctx.jump(w(0)).unwrap(), 0);
        assert_eq!(ctx.jump(w(3)).unwrap(), 3);
        assert!(!ctx.valid_jump_dest(w(1)));
        assert!(!ctx.valid_jump_dest(w(2)));
        assert!(!ctx.valid_jump_dest(w(4)));
        assert!(!ctx.valid_jump_dest(Word::MAX));
        assert_eq!(
            ctx.jump(w(2)).unwrap_err().halt_reason(),
            crate::errors::HaltReason::InvalidDestination
        );
    }

    #[test]
    fn test_child_frame_shares_analysis_cache() {
        let code = CodeAndHash::new(vec![0x5b, 0x00]);
        let mut parent = frame();
        parent.set_code_optional_hash(contract(), code.clone());
        assert!(parent.valid_jump_dest(w(0)));

        let mut child = ExecutionContext::new(
            CallerRef::Frame(&parent),
            Address::repeat_byte(0x03),
            Word::ZERO,
            100,
            ShieldConfig::default(),
        );
        assert!(child.jump_dest_cache().shares_storage_with(parent.jump_dest_cache()));
        assert_eq!(child.caller(), contract());
        child.set_code_optional_hash(contract(), code);
        assert!(child.valid_jump_dest(w(0)));

        let snap = parent.metrics().snapshot();
        assert_eq!(snap.analysis_misses, 1);
        assert_eq!(snap.analysis_hits, 1);
    }

    #[test]
    fn test_ephemeral_code_stays_out_of_cache() {
        let mut ctx = frame();
        ctx.set_code_optional_hash(contract(), CodeAndHash::ephemeral(vec![0x5b]));
        assert!(ctx.valid_jump_dest(w(0)));
        assert!(ctx.jump_dest_cache().is_empty());
        assert_eq!(ctx.metrics().snapshot().local_analyses, 1);
    }

    #[test]
    fn test_delegate_copies_parent_call_parameters() {
        let parent = frame();
        let mut child = ExecutionContext::new(
            CallerRef::Frame(&parent),
            contract(),
            Word::ZERO,
            100,
            ShieldConfig::default(),
        );
        let delegated = child.as_delegate().unwrap();
        assert_eq!(delegated.caller(), eoa());
        assert_eq!(delegated.value(), w(5));

        let mut top = frame();
        assert_eq!(
            top.as_delegate().unwrap_err(),
            ShieldError::DelegateWithoutParent
        );
    }

    #[test]
    fn test_apply_policy_outcomes() {
        let store = MemoryPolicyStore::new().with_policy(
            PolicyDocument::new(sel()).with_shield(StorageVariable::plain(w(1)).with_name("owner")),
        );
        let mut ctx = frame();

        ctx.set_input(vec![0xde, 0xad]);
        assert!(!ctx.apply_policy(&store).unwrap());

        ctx.set_input(vec![0x00, 0x00, 0x00, 0x00]);
        assert!(!ctx.apply_policy(&store).unwrap());
        assert!(!ctx.is_protected());

        ctx.set_input(vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
        assert!(ctx.apply_policy(&store).unwrap());
        assert_eq!(ctx.selector(), Some(sel()));
        assert!(ctx.shield()[0].is_tracked(&w(1)));
        assert!(ctx.allow().is_empty());
    }

    #[test]
    fn test_apply_policy_fails_closed() {
        let mut ctx = frame();
        ctx.set_input(sel().0.to_vec());
        let err = ctx.apply_policy(&FailingProvider).unwrap_err();
        assert_eq!(err.halt_reason(), crate::errors::HaltReason::PolicyLoad);
        assert!(err.to_string().contains("disk on fire"));

        let bad = MemoryPolicyStore::new().with_policy(
            PolicyDocument::new(sel()).with_shield(StorageVariable::packed(w(0), 0, 0)),
        );
        assert!(ctx.apply_policy(&bad).is_err());
        assert!(!ctx.is_protected());
    }

    #[test]
    fn test_apply_policy_rejects_misfiled_document() {
        let provider = MisfiledProvider(
            PolicyDocument::new(Selector([0x01, 0x02, 0x03, 0x04]))
                .with_shield(StorageVariable::plain(w(1))),
        );
        let mut ctx = frame();
        ctx.set_input(vec![0xde, 0xad, 0xbe, 0xef, 0x00]);
        let err = ctx.apply_policy(&provider).unwrap_err();
        assert_eq!(err.halt_reason(), crate::errors::HaltReason::PolicyLoad);
        assert!(err.to_string().contains("keyed by 0x01020304"));
        assert!(!ctx.is_protected());

        ctx.set_input(vec![0x01, 0x02, 0x03, 0x04]);
        assert!(ctx.apply_policy(&provider).unwrap());
    }

    #[test]
    fn test_check_write_denies_and_reports_variable() {
        let store = MemoryPolicyStore::new().with_policy(
            PolicyDocument::new(sel()).with_shield(StorageVariable::plain(w(1)).with_name("owner")),
        );
        let mut state = MemoryState::new();
        let mut ctx = frame();
        ctx.set_input(sel().0.to_vec());
        ctx.apply_policy(&store).unwrap();

        assert!(ctx.check_write(w(2), w(9), &mut state).is_ok());
        let err = ctx.check_write(w(1), w(9), &mut state).unwrap_err();
        assert_eq!(
            err,
            ShieldError::WriteDenied {
                address: contract(),
                cell: w(1),
                variable: "owner".to_string(),
            }
        );
        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.writes_checked, 2);
        assert_eq!(snap.writes_denied, 1);
    }

    #[test]
    fn test_unprotected_frame_allows_everything() {
        let mut state = MemoryState::new();
        let mut ctx = frame();
        assert!(ctx.check_write(w(1), w(1), &mut state).is_ok());
        assert_eq!(ctx.observe_hash(w(1), w(2), &mut state), Discovery::Unmatched);
        assert_eq!(ctx.refresh_allow(&mut state), 0);
    }

    #[test]
    fn test_observe_keccak_uses_trailing_slot() {
        let store = MemoryPolicyStore::new().with_policy(
            PolicyDocument::new(sel())
                .with_shield(StorageVariable::mapping(w(3), 0, "uint256").with_name("balances")),
        );
        let mut state = MemoryState::new();
        let mut ctx = frame();
        ctx.set_input(sel().0.to_vec());
        ctx.apply_policy(&store).unwrap();

        let mut preimage = [0u8; 64];
        preimage[31] = 0x42;
        preimage[63] = 0x03;
        let hash = keccak256(&preimage);
        assert_eq!(ctx.observe_keccak(&preimage, hash, &mut state), Discovery::Leaf);
        assert_eq!(ctx.observe_keccak(&preimage[..16], hash, &mut state), Discovery::Unmatched);

        let cell = b256_to_word(&hash);
        assert!(ctx.check_write(cell, w(1), &mut state).is_err());
    }

    #[test]
    fn test_persist_policy_respects_scope() {
        let store = MemoryPolicyStore::new().with_policy(
            PolicyDocument::new(sel()).with_shield(StorageVariable::mapping(w(5), 1, "uint256")),
        );
        let mut state = MemoryState::new();

        let mut ctx = frame();
        ctx.set_input(sel().0.to_vec());
        ctx.apply_policy(&store).unwrap();
        ctx.observe_hash(w(5), w(77), &mut state);
        assert!(!ctx.persist_policy(&store).unwrap());
        assert_eq!(store.load(sel()).unwrap().unwrap().node_count(), 1);

        let mut ctx = ExecutionContext::new(
            CallerRef::Account(eoa()),
            contract(),
            Word::ZERO,
            0,
            ShieldConfig::default().with_persistence(PolicyPersistence::WriteBack),
        );
        ctx.set_input(sel().0.to_vec());
        ctx.apply_policy(&store).unwrap();
        ctx.observe_hash(w(5), w(77), &mut state);
        assert!(ctx.persist_policy(&store).unwrap());
        let saved = store.load(sel()).unwrap().unwrap();
        assert_eq!(saved.node_count(), 2);
        assert!(saved.updated_at.is_some());
    }
}
