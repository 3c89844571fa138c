//! Protocol-level error taxonomy.
//!
//! Local validation failures from the primitives arrive wrapped in
//! [`ProtocolError::Privacy`]. Everything else describes a collaborator
//! (ledger, prover, relayer) or a resource conflict.
use std::time::Duration;

use shade_privacy::{Nullifier, PrivacyError};
use thiserror::Error;

/// Errors surfaced by the orchestrator and its collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Witness or input failed a local check
    #[error(transparent)]
    Privacy(#[from] PrivacyError),

    /// Nullifier is already in the registry
    #[error("Nullifier already spent: {0:?}")]
    AlreadySpent(Nullifier),

    /// The referenced Merkle root is neither current nor recent
    #[error("Merkle root is not current or recent")]
    StaleRoot,

    /// Proof backend kept reporting itself unavailable
    #[error("Proof backend unavailable after {attempts} attempts")]
    ProofBackendUnavailable { attempts: u32 },

    /// Proof generation exceeded its deadline
    #[error("Proof generation timed out after {0:?}")]
    ProofTimeout(Duration),

    /// Backend refused to prove the witness
    #[error("Proof backend rejected the witness: {0}")]
    ProofRejected(String),

    /// No relayer accepted the submission
    #[error("No relayer available: {0}")]
    RelayerUnavailable(String),

    /// Unspent, unleased notes do not cover the amount
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u128 },

    /// Every submission attempt lost the race against new roots
    #[error("Gave up after {attempts} submission attempts")]
    Congestion { attempts: u32 },

    /// Operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Another in-flight operation holds one of the inputs
    #[error("Note is in use by another operation")]
    NoteBusy,

    /// Ledger refused the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Nullifier registry is full
    #[error("Nullifier set is full ({0} entries)")]
    CapacityExceeded(usize),
}

impl ProtocolError {
    /// Whether retrying the whole operation later can succeed unchanged
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::StaleRoot
                | ProtocolError::ProofBackendUnavailable { .. }
                | ProtocolError::ProofTimeout(_)
                | ProtocolError::RelayerUnavailable(_)
                | ProtocolError::Congestion { .. }
                | ProtocolError::NoteBusy
        )
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
