//! Frame-halting errors raised by the policy engine.
//!
//! Every variant halts the current frame. The embedding interpreter discards
//! the frame's storage mutations and reports the [`HaltReason`].

use serde::{Deserialize, Serialize};
use shield_types::encoding::format_word;
use shield_types::{Address, Selector, Word};

/// Classification of a halted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    PolicyLoad,
    OutOfGas,
    InvalidDestination,
    WriteDenied,
    Misuse,
}

/// Structured engine errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShieldError {
    /// A policy exists for the selector but could not be loaded or is invalid.
    /// The call fails closed.
    PolicyLoad {
        selector: Selector,
        message: String,
    },

    /// A gas deduction would underflow.
    OutOfGas { requested: u64, remaining: u64 },

    /// Jump target is out of range, not a JUMPDEST, or inside push data.
    InvalidJumpDestination { dest: Word },

    /// The write guard rejected a storage write.
    WriteDenied {
        address: Address,
        cell: Word,
        /// Label of the top-level variable that denied the write
        variable: String,
    },

    /// `as_delegate` on a frame whose caller is not a frame.
    DelegateWithoutParent,
}

impl ShieldError {
    pub fn halt_reason(&self) -> HaltReason {
        match self {
            ShieldError::PolicyLoad { .. } => HaltReason::PolicyLoad,
            ShieldError::OutOfGas { .. } => HaltReason::OutOfGas,
            ShieldError::InvalidJumpDestination { .. } => HaltReason::InvalidDestination,
            ShieldError::WriteDenied { .. } => HaltReason::WriteDenied,
            ShieldError::DelegateWithoutParent => HaltReason::Misuse,
        }
    }
}

impl std::fmt::Display for ShieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShieldError::PolicyLoad { selector, message } => {
                write!(f, "POLICY_LOAD: policy for {} unusable: {}", selector, message)
            }
            ShieldError::OutOfGas {
                requested,
                remaining,
            } => write!(
                f,
                "OUT_OF_GAS: requested {} with {} remaining",
                requested, remaining
            ),
            ShieldError::InvalidJumpDestination { dest } => {
                write!(f, "INVALID_JUMP: {} is not a jump destination", format_word(dest))
            }
            ShieldError::WriteDenied {
                address,
                cell,
                variable,
            } => write!(
                f,
                "WRITE_DENIED: {} slot {} is protected by '{}'",
                address,
                format_word(cell),
                variable
            ),
            ShieldError::DelegateWithoutParent => {
                write!(f, "MISUSE: delegate call requires a calling frame")
            }
        }
    }
}

impl std::error::Error for ShieldError {}
