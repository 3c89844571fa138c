//! Ledger Interface
//!
//! What the protocol needs from the public ledger, plus an in-process
//! reference ledger that enforces the same rules as the on-chain program:
//!
//! ```text
//! submit(tx)
//!   ├─ public inputs bound to nullifiers / commitments / transparent leg
//!   ├─ root is current or in the recent history       (else StaleRoot)
//!   ├─ proof verifies                                  (else Rejected)
//!   ├─ nullifiers unseen, registry has room            (else AlreadySpent)
//!   ├─ tree has room, transparent balances suffice
//!   └─ apply: insert nullifiers + append commitments + move funds (atomic)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shade_privacy::hash::field_to_bytes;
use shade_privacy::statements::amount_bytes;
use shade_privacy::{
    AssetId, Commitment, CommitmentTree, EncryptedNotePayload, MerkleRoot, NoteValue, Nullifier,
    PublicInputs, StatementId, TransparentAddress,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, Result};
use crate::prover::ProofVerifier;
use crate::registry::{InMemoryNullifierSet, NullifierRegistry};

const TX_ID_CONTEXT: &str = "shade-tx-id-v1";

// ============================================================================
// Transaction Types
// ============================================================================

/// Content-derived transaction identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

/// Movement between the pool and a transparent account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparentLeg {
    Deposit {
        from: TransparentAddress,
        asset: AssetId,
        amount: NoteValue,
    },
    Withdraw {
        to: TransparentAddress,
        asset: AssetId,
        amount: NoteValue,
    },
}

/// Everything the ledger needs to apply one proven statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldedTransaction {
    pub statement_id: StatementId,
    pub nullifiers: Vec<Nullifier>,
    pub commitments: Vec<Commitment>,
    pub proof: Vec<u8>,
    pub public_inputs: PublicInputs,
    /// One optional payload per commitment, published with the leaf
    pub encrypted_notes: Vec<Option<EncryptedNotePayload>>,
    pub transparent: Option<TransparentLeg>,
}

impl ShieldedTransaction {
    /// Identifier derived from the full transaction content
    pub fn id(&self) -> TxId {
        let mut hasher = blake3::Hasher::new_derive_key(TX_ID_CONTEXT);
        hasher.update(&[self.statement_id.as_u8()]);
        for input in &self.public_inputs {
            hasher.update(input);
        }
        for nullifier in &self.nullifiers {
            hasher.update(nullifier.as_bytes());
        }
        for commitment in &self.commitments {
            hasher.update(commitment.as_bytes());
        }
        hasher.update(&self.proof);
        TxId(*hasher.finalize().as_bytes())
    }
}

/// Leaf published by the ledger, as seen by scanners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerNote {
    pub leaf_index: u64,
    pub commitment: Commitment,
    pub payload: Option<EncryptedNotePayload>,
}

/// Result of an accepted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_id: TxId,
    /// Leaf indices of the appended commitments, in order
    pub leaf_indices: Vec<u64>,
    pub root: MerkleRoot,
}

/// Lifecycle of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Unknown,
    Pending,
    Confirmed(TxReceipt),
}

/// Events emitted while applying transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    CommitmentInserted {
        leaf_index: u64,
        commitment: Commitment,
        new_root: MerkleRoot,
    },
    NullifierConsumed {
        nullifier: Nullifier,
    },
    FundsDeposited {
        from: TransparentAddress,
        asset: AssetId,
        amount: u64,
    },
    FundsReleased {
        to: TransparentAddress,
        asset: AssetId,
        amount: u64,
    },
}

// ============================================================================
// Ledger Trait
// ============================================================================

/// Public ledger as seen by wallets and relayers
pub trait Ledger: Send + Sync + 'static {
    /// Validate and apply a transaction atomically
    fn submit(&self, tx: ShieldedTransaction) -> impl Future<Output = Result<TxId>> + Send;

    fn status(&self, tx_id: &TxId) -> impl Future<Output = TxStatus> + Send;

    fn latest_root(&self) -> impl Future<Output = MerkleRoot> + Send;

    /// Commitments with leaf index >= `start`, in order
    fn commitments_from(&self, start: u64) -> impl Future<Output = Vec<Commitment>> + Send;

    /// Up to `limit` published leaves starting at `cursor`
    fn encrypted_notes_from(
        &self,
        cursor: u64,
        limit: usize,
    ) -> impl Future<Output = Vec<LedgerNote>> + Send;

    fn is_spent(&self, nullifier: &Nullifier) -> impl Future<Output = bool> + Send;
}

// ============================================================================
// In-Memory Reference Ledger
// ============================================================================

/// Settings of the reference ledger
#[derive(Debug, Clone)]
pub struct InMemoryLedgerConfig {
    pub tree_height: u8,
    pub root_history: usize,
    pub nullifier_capacity: Option<usize>,
    /// Accepted transactions report `Pending` for this long
    pub confirmation_delay: Duration,
}

impl Default for InMemoryLedgerConfig {
    fn default() -> Self {
        Self {
            tree_height: shade_privacy::DEFAULT_TREE_HEIGHT,
            root_history: shade_privacy::merkle::DEFAULT_ROOT_HISTORY,
            nullifier_capacity: None,
            confirmation_delay: Duration::ZERO,
        }
    }
}

impl InMemoryLedgerConfig {
    pub fn from_config(config: &shade_config::ShadeConfig) -> Self {
        Self {
            tree_height: config.tree.height,
            root_history: config.tree.root_history,
            nullifier_capacity: config.ledger.nullifier_capacity,
            confirmation_delay: Duration::from_millis(config.ledger.confirmation_delay_ms),
        }
    }
}

#[derive(Debug)]
struct TxRecord {
    accepted_at: Instant,
    receipt: TxReceipt,
}

struct LedgerState {
    tree: CommitmentTree,
    nullifiers: InMemoryNullifierSet,
    balances: HashMap<(TransparentAddress, AssetId), u64>,
    vault: HashMap<AssetId, u64>,
    payloads: Vec<Option<EncryptedNotePayload>>,
    events: Vec<LedgerEvent>,
    txs: HashMap<TxId, TxRecord>,
}

/// Single-process ledger with the on-chain program's acceptance rules.
///
/// This is a reference collaborator, not a safe vault. The public inputs
/// only carry the note commitment for deposits and the receiver and amount
/// for withdrawals, so:
/// - a deposit's transparent amount and asset are taken from the declared
///   leg, unchecked against the committed note;
/// - a withdrawal's asset is taken from the declared leg, unchecked against
///   the spent note's token.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    verifier: Arc<dyn ProofVerifier>,
    confirmation_delay: Duration,
}

impl InMemoryLedger {
    pub fn new(config: InMemoryLedgerConfig, verifier: Arc<dyn ProofVerifier>) -> Result<Self> {
        let tree = CommitmentTree::with_history(config.tree_height, config.root_history)?;
        let nullifiers = match config.nullifier_capacity {
            Some(capacity) => InMemoryNullifierSet::with_capacity(capacity),
            None => InMemoryNullifierSet::new(),
        };

        Ok(Self {
            state: Mutex::new(LedgerState {
                tree,
                nullifiers,
                balances: HashMap::new(),
                vault: HashMap::new(),
                payloads: Vec::new(),
                events: Vec::new(),
                txs: HashMap::new(),
            }),
            verifier,
            confirmation_delay: config.confirmation_delay,
        })
    }

    /// Credit a transparent account (genesis / faucet)
    pub async fn fund(&self, account: TransparentAddress, asset: AssetId, amount: u64) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry((account, asset)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub async fn transparent_balance(&self, account: &TransparentAddress, asset: &AssetId) -> u64 {
        let state = self.state.lock().await;
        state.balances.get(&(*account, *asset)).copied().unwrap_or(0)
    }

    /// Value currently held by the pool for `asset`
    pub async fn vault_balance(&self, asset: &AssetId) -> u64 {
        let state = self.state.lock().await;
        state.vault.get(asset).copied().unwrap_or(0)
    }

    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn tree_size(&self) -> u64 {
        self.state.lock().await.tree.size()
    }

    pub async fn nullifier_count(&self) -> usize {
        self.state.lock().await.nullifiers.len()
    }

    fn verify_bindings(tx: &ShieldedTransaction) -> Result<Option<MerkleRoot>> {
        let reject = |msg: &str| Err(ProtocolError::Rejected(format!("{}: {msg}", tx.statement_id)));
        let pi = &tx.public_inputs;

        if tx.encrypted_notes.len() != tx.commitments.len() {
            return reject("one payload slot per commitment required");
        }

        let withdraw_binding = |receiver: &[u8; 32], amount: &[u8; 32]| match tx.transparent {
            Some(TransparentLeg::Withdraw { to, amount: value, .. }) => {
                field_to_bytes(&to.to_field()) == *receiver && amount_bytes(value) == *amount
            }
            _ => false,
        };

        let ok = match tx.statement_id {
            StatementId::Deposit => {
                pi.len() == 1
                    && tx.nullifiers.is_empty()
                    && tx.commitments.len() == 1
                    && pi[0] == tx.commitments[0].0
                    && matches!(tx.transparent, Some(TransparentLeg::Deposit { .. }))
            }
            StatementId::Transfer => {
                pi.len() == 4
                    && tx.nullifiers.len() == 1
                    && tx.commitments.len() == 2
                    && pi[1] == tx.nullifiers[0].0
                    && pi[2] == tx.commitments[0].0
                    && pi[3] == tx.commitments[1].0
                    && tx.transparent.is_none()
            }
            StatementId::Withdraw => {
                pi.len() == 4
                    && tx.nullifiers.len() == 1
                    && tx.commitments.is_empty()
                    && pi[2] == tx.nullifiers[0].0
                    && withdraw_binding(&pi[1], &pi[3])
            }
            StatementId::Consolidate => {
                let k = tx.nullifiers.len();
                k >= 1
                    && pi.len() == k + 2
                    && tx.commitments.len() == 1
                    && pi[1..=k]
                        .iter()
                        .zip(&tx.nullifiers)
                        .all(|(input, n)| *input == n.0)
                    && pi[k + 1] == tx.commitments[0].0
                    && tx.transparent.is_none()
            }
            StatementId::PartialWithdraw => {
                pi.len() == 5
                    && tx.nullifiers.len() == 1
                    && tx.commitments.len() == 1
                    && pi[2] == tx.nullifiers[0].0
                    && pi[4] == tx.commitments[0].0
                    && withdraw_binding(&pi[1], &pi[3])
            }
        };

        if !ok {
            return reject("public inputs do not match the transaction");
        }

        Ok(match tx.statement_id {
            StatementId::Deposit => None,
            _ => Some(MerkleRoot(pi[0])),
        })
    }
}

impl Ledger for InMemoryLedger {
    async fn submit(&self, tx: ShieldedTransaction) -> Result<TxId> {
        let tx_id = tx.id();
        let root = Self::verify_bindings(&tx)?;

        let mut state = self.state.lock().await;

        if let Some(root) = root {
            if !state.tree.is_known_root(&root) {
                warn!(%tx_id, "Rejecting transaction against unknown root");
                return Err(ProtocolError::StaleRoot);
            }
        }

        if !self
            .verifier
            .verify(tx.statement_id, &tx.public_inputs, &tx.proof)
        {
            warn!(%tx_id, statement = %tx.statement_id, "Proof verification failed");
            return Err(ProtocolError::Rejected("invalid proof".into()));
        }

        state.nullifiers.check_insertable(&tx.nullifiers)?;

        if state.txs.contains_key(&tx_id) {
            return Err(ProtocolError::Rejected(format!("duplicate transaction {tx_id}")));
        }

        let free = state.tree.capacity() - state.tree.size();
        if (tx.commitments.len() as u64) > free {
            return Err(shade_privacy::PrivacyError::TreeFull {
                capacity: state.tree.capacity(),
            }
            .into());
        }

        match tx.transparent {
            Some(TransparentLeg::Deposit { from, asset, amount }) => {
                let balance = state.balances.get(&(from, asset)).copied().unwrap_or(0);
                if balance < amount.as_u64() {
                    return Err(ProtocolError::Rejected(format!(
                        "transparent balance {balance} below deposit {}",
                        amount.as_u64()
                    )));
                }
                let vault = state.vault.get(&asset).copied().unwrap_or(0);
                if vault.checked_add(amount.as_u64()).is_none() {
                    return Err(shade_privacy::PrivacyError::AmountOverflow.into());
                }
            }
            Some(TransparentLeg::Withdraw { asset, amount, .. }) => {
                let vault = state.vault.get(&asset).copied().unwrap_or(0);
                if vault < amount.as_u64() {
                    return Err(ProtocolError::Rejected(format!(
                        "vault holds {vault}, cannot release {}",
                        amount.as_u64()
                    )));
                }
            }
            None => {}
        }

        // Everything checked: apply
        state.nullifiers.insert_all(&tx.nullifiers)?;
        for nullifier in &tx.nullifiers {
            state.events.push(LedgerEvent::NullifierConsumed {
                nullifier: *nullifier,
            });
        }

        let mut leaf_indices = Vec::with_capacity(tx.commitments.len());
        for (commitment, payload) in tx.commitments.iter().zip(tx.encrypted_notes) {
            let (leaf_index, new_root) = state.tree.append(commitment)?;
            state.payloads.push(payload);
            state.events.push(LedgerEvent::CommitmentInserted {
                leaf_index,
                commitment: *commitment,
                new_root,
            });
            leaf_indices.push(leaf_index);
        }

        match tx.transparent {
            Some(TransparentLeg::Deposit { from, asset, amount }) => {
                if let Some(balance) = state.balances.get_mut(&(from, asset)) {
                    *balance -= amount.as_u64();
                }
                *state.vault.entry(asset).or_insert(0) += amount.as_u64();
                state.events.push(LedgerEvent::FundsDeposited {
                    from,
                    asset,
                    amount: amount.as_u64(),
                });
            }
            Some(TransparentLeg::Withdraw { to, asset, amount }) => {
                if let Some(vault) = state.vault.get_mut(&asset) {
                    *vault -= amount.as_u64();
                }
                let balance = state.balances.entry((to, asset)).or_insert(0);
                *balance = balance.saturating_add(amount.as_u64());
                state.events.push(LedgerEvent::FundsReleased {
                    to,
                    asset,
                    amount: amount.as_u64(),
                });
            }
            None => {}
        }

        let root = state.tree.root();
        info!(
            %tx_id,
            statement = %tx.statement_id,
            nullifiers = tx.nullifiers.len(),
            commitments = leaf_indices.len(),
            tree_size = state.tree.size(),
            "Transaction applied"
        );
        state.txs.insert(
            tx_id,
            TxRecord {
                accepted_at: Instant::now(),
                receipt: TxReceipt {
                    tx_id,
                    leaf_indices,
                    root,
                },
            },
        );

        Ok(tx_id)
    }

    async fn status(&self, tx_id: &TxId) -> TxStatus {
        let state = self.state.lock().await;
        match state.txs.get(tx_id) {
            None => TxStatus::Unknown,
            Some(record) if record.accepted_at.elapsed() < self.confirmation_delay => {
                TxStatus::Pending
            }
            Some(record) => TxStatus::Confirmed(record.receipt.clone()),
        }
    }

    async fn latest_root(&self) -> MerkleRoot {
        self.state.lock().await.tree.root()
    }

    async fn commitments_from(&self, start: u64) -> Vec<Commitment> {
        let state = self.state.lock().await;
        (start..state.tree.size())
            .filter_map(|i| state.tree.leaf(i))
            .collect()
    }

    async fn encrypted_notes_from(&self, cursor: u64, limit: usize) -> Vec<LedgerNote> {
        let state = self.state.lock().await;
        let end = state.tree.size().min(cursor.saturating_add(limit as u64));
        let notes: Vec<LedgerNote> = (cursor..end)
            .filter_map(|leaf_index| {
                let commitment = state.tree.leaf(leaf_index)?;
                let payload = state.payloads.get(leaf_index as usize).cloned().flatten();
                Some(LedgerNote {
                    leaf_index,
                    commitment,
                    payload,
                })
            })
            .collect();
        debug!(cursor, returned = notes.len(), "Served encrypted notes");
        notes
    }

    async fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.state.lock().await.nullifiers.contains(nullifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::{MockProofBackend, MockVerifier, ProofBackend};
    use rand::rngs::OsRng;
    use shade_privacy::{
        CircuitLimits, DepositStatement, Note, SpendWitness, Statement, WithdrawStatement,
    };

    const ALICE: TransparentAddress = TransparentAddress([0xA1; 32]);

    fn ledger(history: usize) -> InMemoryLedger {
        InMemoryLedger::new(
            InMemoryLedgerConfig {
                tree_height: 8,
                root_history: history,
                ..Default::default()
            },
            Arc::new(MockVerifier),
        )
        .unwrap()
    }

    fn package(
        statement: Statement,
        transparent: Option<TransparentLeg>,
    ) -> ShieldedTransaction {
        let proof = MockProofBackend::new(CircuitLimits::for_tree_height(8))
            .generate_proof(&statement)
            .unwrap();
        let commitments = statement.commitments();
        ShieldedTransaction {
            statement_id: proof.statement_id,
            nullifiers: statement.nullifiers(),
            encrypted_notes: vec![None; commitments.len()],
            commitments,
            proof: proof.bytes,
            public_inputs: proof.public_inputs,
            transparent,
        }
    }

    fn deposit_tx(note: &Note) -> ShieldedTransaction {
        package(
            Statement::Deposit(DepositStatement::new(note.clone())),
            Some(TransparentLeg::Deposit {
                from: ALICE,
                asset: note.asset(),
                amount: note.amount(),
            }),
        )
    }

    async fn withdraw_tx(ledger: &InMemoryLedger, note: &Note, leaf: u64) -> ShieldedTransaction {
        let mut tree = CommitmentTree::new(8).unwrap();
        for c in ledger.commitments_from(0).await {
            tree.append(&c).unwrap();
        }
        let witness = SpendWitness::new(note.clone(), tree.prove_inclusion(leaf).unwrap());
        let statement =
            Statement::Withdraw(WithdrawStatement::new(tree.root(), witness, ALICE));
        let transparent = statement.withdrawal().map(|(to, amount)| TransparentLeg::Withdraw {
            to,
            asset: note.asset(),
            amount,
        });
        package(statement, transparent)
    }

    #[tokio::test]
    async fn test_deposit_moves_funds_into_vault() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 100).await;

        let note = Note::from_secrets(100, AssetId::Native).unwrap();
        let tx_id = ledger.submit(deposit_tx(&note)).await.unwrap();

        assert_eq!(ledger.transparent_balance(&ALICE, &AssetId::Native).await, 0);
        assert_eq!(ledger.vault_balance(&AssetId::Native).await, 100);
        assert_eq!(ledger.commitments_from(0).await, vec![note.commitment()]);
        match ledger.status(&tx_id).await {
            TxStatus::Confirmed(receipt) => assert_eq!(receipt.leaf_indices, vec![0]),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deposit_requires_balance() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 5).await;

        let note = Note::from_secrets(6, AssetId::Native).unwrap();
        assert!(matches!(
            ledger.submit(deposit_tx(&note)).await,
            Err(ProtocolError::Rejected(_))
        ));
        assert_eq!(ledger.tree_size().await, 0);
    }

    #[tokio::test]
    async fn test_double_spend_rejected() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 100).await;
        let note = Note::from_secrets(100, AssetId::Native).unwrap();
        ledger.submit(deposit_tx(&note)).await.unwrap();

        let first = withdraw_tx(&ledger, &note, 0).await;
        ledger.submit(first.clone()).await.unwrap();
        assert!(ledger.is_spent(&note.nullifier()).await);

        let second = withdraw_tx(&ledger, &note, 0).await;
        assert_eq!(
            ledger.submit(second).await,
            Err(ProtocolError::AlreadySpent(note.nullifier()))
        );
        assert_eq!(
            ledger.submit(first).await,
            Err(ProtocolError::AlreadySpent(note.nullifier()))
        );
        assert_eq!(ledger.nullifier_count().await, 1);
        assert_eq!(ledger.transparent_balance(&ALICE, &AssetId::Native).await, 100);
    }

    #[tokio::test]
    async fn test_stale_root_rejected() {
        let ledger = ledger(1);
        ledger.fund(ALICE, AssetId::Native, 100).await;
        let note = Note::from_secrets(50, AssetId::Native).unwrap();
        ledger.submit(deposit_tx(&note)).await.unwrap();

        let withdraw = withdraw_tx(&ledger, &note, 0).await;
        let other = Note::from_secrets(50, AssetId::Native).unwrap();
        ledger.submit(deposit_tx(&other)).await.unwrap();

        assert_eq!(ledger.submit(withdraw).await, Err(ProtocolError::StaleRoot));
        assert!(!ledger.is_spent(&note.nullifier()).await);
    }

    #[tokio::test]
    async fn test_binding_mismatch_rejected() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 100).await;
        let note = Note::from_secrets(10, AssetId::Native).unwrap();

        let mut tx = deposit_tx(&note);
        tx.commitments = vec![Note::from_secrets(10, AssetId::Native).unwrap().commitment()];
        assert!(matches!(
            ledger.submit(tx).await,
            Err(ProtocolError::Rejected(_))
        ));

        let mut forged = deposit_tx(&note);
        forged.proof[0] ^= 1;
        assert_eq!(
            ledger.submit(forged).await,
            Err(ProtocolError::Rejected("invalid proof".into()))
        );
        assert_eq!(ledger.tree_size().await, 0);
    }

    #[tokio::test]
    async fn test_withdraw_amount_binding() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 100).await;
        let note = Note::from_secrets(40, AssetId::Native).unwrap();
        ledger.submit(deposit_tx(&note)).await.unwrap();

        let mut tx = withdraw_tx(&ledger, &note, 0).await;
        tx.transparent = Some(TransparentLeg::Withdraw {
            to: ALICE,
            asset: AssetId::Native,
            amount: NoteValue::new(41),
        });
        assert!(matches!(
            ledger.submit(tx).await,
            Err(ProtocolError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_confirmation_delay() {
        let ledger = InMemoryLedger::new(
            InMemoryLedgerConfig {
                tree_height: 8,
                confirmation_delay: Duration::from_millis(30),
                ..Default::default()
            },
            Arc::new(MockVerifier),
        )
        .unwrap();
        ledger.fund(ALICE, AssetId::Native, 1).await;
        let note = Note::random(1, AssetId::Native, &mut OsRng).unwrap();

        let tx_id = ledger.submit(deposit_tx(&note)).await.unwrap();
        assert_eq!(ledger.status(&tx_id).await, TxStatus::Pending);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(ledger.status(&tx_id).await, TxStatus::Confirmed(_)));
        assert_eq!(ledger.status(&TxId([0u8; 32])).await, TxStatus::Unknown);
    }

    #[tokio::test]
    async fn test_events_and_payload_feed() {
        let ledger = ledger(8);
        ledger.fund(ALICE, AssetId::Native, 100).await;
        let note = Note::from_secrets(100, AssetId::Native).unwrap();
        ledger.submit(deposit_tx(&note)).await.unwrap();
        ledger.submit(withdraw_tx(&ledger, &note, 0).await).await.unwrap();

        let events = ledger.events().await;
        assert!(matches!(events[0], LedgerEvent::CommitmentInserted { leaf_index: 0, .. }));
        assert!(events.contains(&LedgerEvent::NullifierConsumed {
            nullifier: note.nullifier()
        }));
        assert!(events.contains(&LedgerEvent::FundsReleased {
            to: ALICE,
            asset: AssetId::Native,
            amount: 100
        }));

        let feed = ledger.encrypted_notes_from(0, 10).await;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].commitment, note.commitment());
        assert!(feed[0].payload.is_none());
        assert!(ledger.encrypted_notes_from(1, 10).await.is_empty());
    }
}
