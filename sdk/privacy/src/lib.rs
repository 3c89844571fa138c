//! Shade Privacy SDK
//!
//! Note-based privacy primitives for a shielded pool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Shielded Transaction                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  Nullifiers  │  │ Commitments  │  │   Encrypted Payload   │ │
//! │  │  (spent)     │  │  (new notes) │  │   (for recipient)     │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Proof over a Statement                      │   │
//! │  │  • Inclusion of every input in a known root              │   │
//! │  │  • nullifier = H(secret, rho)                            │   │
//! │  │  • commitment = H(secret, amount, token_id, blinding)    │   │
//! │  │  • Σ inputs = Σ outputs, one token per statement         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! H is Poseidon over the BN254 scalar field, one instance for every use.

pub mod asset;
pub mod commitment;
pub mod encryption;
pub mod error;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod statements;

pub use asset::{AssetId, Mint};
pub use commitment::{Commitment, commit};
pub use encryption::{EncryptedNotePayload, decrypt_with, encrypt_for, encrypt_with_rng};
pub use error::{PrivacyError, Result};
pub use hash::{Field, hash_fields};
pub use keys::{KeyHierarchy, ShieldedAddress};
pub use merkle::{
    CommitmentTree, DEFAULT_TREE_HEIGHT, MerkleProof, MerkleRoot, RootHistory, verify_inclusion,
};
pub use note::{Note, NoteValue};
pub use nullifier::Nullifier;
pub use statements::{
    CircuitLimits, ConsolidateStatement, DepositStatement, PartialWithdrawStatement, PublicInputs,
    SpendWitness, Statement, StatementId, TransferStatement, TransparentAddress, WithdrawStatement,
};
