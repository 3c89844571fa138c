//! Prover Integration
//!
//! Interface to the proof backend for per-transaction statements.
//!
//! ```text
//! ┌──────────────┐   Statement    ┌──────────────┐   Proof    ┌──────────────┐
//! │ Orchestrator │ ─────────────► │ ProverClient │ ─────────► │    Ledger    │
//! └──────────────┘                │  timeout     │            │  verifier    │
//!                                 │  retry       │            └──────────────┘
//!                                 │  cancel      │
//!                                 └──────┬───────┘
//!                                        │ spawn_blocking
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │ ProofBackend │
//!                                 └──────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use shade_privacy::{CircuitLimits, PublicInputs, Statement, StatementId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};

const MOCK_PROOF_CONTEXT: &str = "shade-mock-proof-v1";
const MOCK_PROOF_LEN: usize = 256;

// ============================================================================
// Proof Types
// ============================================================================

/// A generated proof with the public inputs it commits to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub statement_id: StatementId,
    pub bytes: Vec<u8>,
    pub public_inputs: PublicInputs,
    /// Proving time in milliseconds
    pub proving_time_ms: u64,
}

/// Failures reported by a backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transient: worth retrying
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The witness does not satisfy the statement
    #[error("witness rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// Backend Traits
// ============================================================================

/// Trait for proof generation
pub trait ProofBackend: Send + Sync {
    /// Generate a proof for a statement (may block)
    fn generate_proof(&self, statement: &Statement) -> std::result::Result<Proof, BackendError>;
}

/// Trait for proof verification (ledger side)
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, statement_id: StatementId, public_inputs: &PublicInputs, proof: &[u8]) -> bool;
}

// ============================================================================
// Mock Backend
// ============================================================================

/// Mock backend - checks every relation, then emits a digest "proof"
///
/// In production, this would:
/// 1. Compile the witness for the statement's circuit
/// 2. Run the prover over it
/// 3. Return the succinct proof bytes
#[derive(Debug, Clone)]
pub struct MockProofBackend {
    /// Simulated proving time in ms
    prove_time_ms: u64,
    limits: CircuitLimits,
}

impl MockProofBackend {
    pub fn new(limits: CircuitLimits) -> Self {
        Self {
            prove_time_ms: 0,
            limits,
        }
    }

    /// Create with custom proving time (for testing)
    pub fn with_prove_time(limits: CircuitLimits, ms: u64) -> Self {
        Self {
            prove_time_ms: ms,
            limits,
        }
    }
}

impl Default for MockProofBackend {
    fn default() -> Self {
        Self::new(CircuitLimits::default())
    }
}

impl ProofBackend for MockProofBackend {
    fn generate_proof(&self, statement: &Statement) -> std::result::Result<Proof, BackendError> {
        let start = Instant::now();
        if self.prove_time_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.prove_time_ms));
        }

        statement
            .check(&self.limits)
            .map_err(|e| BackendError::Rejected(e.to_string()))?;

        let public_inputs = statement.public_inputs();
        Ok(Proof {
            statement_id: statement.id(),
            bytes: mock_proof_bytes(statement.id(), &public_inputs),
            public_inputs,
            proving_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Verifier accepting exactly the proofs [`MockProofBackend`] produces
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerifier;

impl ProofVerifier for MockVerifier {
    fn verify(&self, statement_id: StatementId, public_inputs: &PublicInputs, proof: &[u8]) -> bool {
        proof == mock_proof_bytes(statement_id, public_inputs).as_slice()
    }
}

/// Digest of statement id and public inputs, padded like a real proof
pub fn mock_proof_bytes(statement_id: StatementId, public_inputs: &PublicInputs) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key(MOCK_PROOF_CONTEXT);
    hasher.update(&[statement_id.as_u8()]);
    hasher.update(&(public_inputs.len() as u32).to_le_bytes());
    for input in public_inputs {
        hasher.update(input);
    }

    let mut proof_bytes = Vec::with_capacity(MOCK_PROOF_LEN);
    proof_bytes.extend_from_slice(hasher.finalize().as_bytes());
    proof_bytes.resize(MOCK_PROOF_LEN, 0);
    proof_bytes
}

// ============================================================================
// Async Prover Client
// ============================================================================

/// Timeout, retry and cancellation policy for proof requests
#[derive(Debug, Clone)]
pub struct ProverClientConfig {
    pub timeout: Duration,
    /// Retries after `BackendError::Unavailable`
    pub max_retries: u32,
    /// First backoff delay, doubled on each retry
    pub retry_base: Duration,
}

impl Default for ProverClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_millis(200),
        }
    }
}

/// Async front for a blocking backend
#[derive(Clone)]
pub struct ProverClient {
    backend: Arc<dyn ProofBackend>,
    config: ProverClientConfig,
    cancel: CancellationToken,
}

impl ProverClient {
    pub fn new(
        backend: Arc<dyn ProofBackend>,
        config: ProverClientConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            config,
            cancel,
        }
    }

    /// Prove a statement, retrying with exponential backoff while the backend
    /// is unavailable.
    ///
    /// Timeout and cancellation stop the wait, not the work: a backend call
    /// already running on the blocking pool finishes in the background and
    /// its result is dropped. Backends that must stop early have to watch
    /// their own cancellation signal.
    pub async fn prove(&self, statement: Statement) -> Result<Proof> {
        let statement = Arc::new(statement);
        let statement_id = statement.id();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(%statement_id, attempt, "Requesting proof");

            let backend = self.backend.clone();
            let job = statement.clone();
            let handle = tokio::task::spawn_blocking(move || backend.generate_proof(&job));

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProtocolError::Cancelled),
                res = tokio::time::timeout(self.config.timeout, handle) => res,
            };

            let result = match outcome {
                Err(_elapsed) => {
                    warn!(%statement_id, timeout = ?self.config.timeout, "Proof generation timed out");
                    return Err(ProtocolError::ProofTimeout(self.config.timeout));
                }
                Ok(Err(join_err)) => {
                    return Err(ProtocolError::ProofRejected(format!(
                        "prover task failed: {join_err}"
                    )));
                }
                Ok(Ok(result)) => result,
            };

            match result {
                Ok(proof) => {
                    debug!(
                        %statement_id,
                        proving_time_ms = proof.proving_time_ms,
                        "Proof generated"
                    );
                    return Ok(proof);
                }
                Err(BackendError::Rejected(reason)) => {
                    return Err(ProtocolError::ProofRejected(reason));
                }
                Err(BackendError::Unavailable(reason)) => {
                    if attempt > self.config.max_retries {
                        return Err(ProtocolError::ProofBackendUnavailable { attempts: attempt });
                    }
                    // Exponential backoff
                    let delay = self.config.retry_base * (1u32 << (attempt - 1).min(16));
                    warn!(
                        %statement_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Proof backend unavailable, backing off"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(ProtocolError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
