//! Shade protocol core
//!
//! Wallet-side orchestration of the shielded pool plus in-process reference
//! collaborators (ledger, proof backend, relayers).
//!
//! ```text
//!                    ┌───────────────────────────┐
//!                    │   ProtocolOrchestrator    │
//!                    │  deposit / transfer /     │
//!                    │  withdraw / consolidate   │
//!                    └─────┬────────┬────────┬───┘
//!           select + lease │        │ prove  │ submit
//!                 ┌────────▼──┐ ┌───▼─────┐ ┌▼────────────┐
//!                 │ NoteStore │ │ Prover  │ │ RelayerPool │
//!                 └─────▲─────┘ │ Client  │ └──────┬──────┘
//!                       │       └─────────┘        │
//!                 ┌─────┴──────┐            ┌──────▼──────┐
//!                 │ NoteScanner│◀───────────│   Ledger    │
//!                 └────────────┘  payloads  │ (registry,  │
//!                                           │  tree)      │
//!                                           └─────────────┘
//! ```

pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod prover;
pub mod registry;
pub mod relayer;
pub mod scanner;
pub mod selection;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{ProtocolError, Result};
pub use ledger::{
    InMemoryLedger, InMemoryLedgerConfig, Ledger, LedgerEvent, LedgerNote, ShieldedTransaction,
    TransparentLeg, TxId, TxReceipt, TxStatus,
};
pub use orchestrator::{OperationReceipt, OrchestratorConfig, ProtocolOrchestrator};
pub use prover::{
    BackendError, MockProofBackend, MockVerifier, Proof, ProofBackend, ProofVerifier,
    ProverClient, ProverClientConfig,
};
pub use registry::{InMemoryNullifierSet, NullifierRegistry};
pub use relayer::{DirectRelayer, Relayer, RelayerPool};
pub use scanner::NoteScanner;
pub use store::{NoteLease, NoteStatus, NoteStore, OwnedNote};
