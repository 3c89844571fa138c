//! Protocol Orchestrator
//!
//! Drives one wallet's operations end to end.
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌─────────┐
//! │  Select  │──▶│  Build   │──▶│   Prove   │──▶│ Package │──▶│ Submit  │
//! │  + lease │   │ outputs, │   │ (timeout, │   │ + memos │   │ relayer │
//! └──────────┘   │ witness  │   │  retry)   │   └─────────┘   │  pool   │
//!      │         └──────────┘   └───────────┘                 └────┬────┘
//!      │ >1 note        ▲                                          │
//!      ▼                │ StaleRoot / confirm timeout              ▼
//! ┌──────────┐          └──────────── rebuild ◀──────────────┌─────────┐
//! │Consolidate│                                              │ Confirm │
//! │  rounds   │                                              │ store + │
//! └──────────┘                                               │  tree   │
//!                                                            └─────────┘
//! ```
//!
//! Output notes get their randomness once per operation, so a resubmission
//! after a stale root proves the same notes against a newer root. Only the
//! Merkle paths change.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use shade_privacy::{
    AssetId, CircuitLimits, Commitment, CommitmentTree, ConsolidateStatement, DepositStatement,
    KeyHierarchy, MerkleRoot, Note, NoteValue, Nullifier, PartialWithdrawStatement, PrivacyError,
    ShieldedAddress, SpendWitness, Statement, StatementId, TransferStatement, TransparentAddress,
    WithdrawStatement, encrypt_for,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, Result};
use crate::ledger::{Ledger, ShieldedTransaction, TransparentLeg, TxId, TxReceipt, TxStatus};
use crate::prover::{Proof, ProofBackend, ProverClient, ProverClientConfig};
use crate::relayer::{Relayer, RelayerPool};
use crate::scanner::NoteScanner;
use crate::selection::{consolidation_rounds, select_inputs};
use crate::store::{NoteLease, NoteStatus, NoteStore, OwnedNote};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Arity and tree height of the deployed circuits
    pub limits: CircuitLimits,
    /// Proof rebuilds allowed per transaction before giving up
    pub max_submit_attempts: u32,
    pub confirm_timeout: Duration,
    pub status_poll: Duration,
    pub prover: ProverClientConfig,
    pub scan_batch_size: usize,
    pub scan_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            limits: CircuitLimits::default(),
            max_submit_attempts: 3,
            confirm_timeout: Duration::from_secs(5),
            status_poll: Duration::from_millis(25),
            prover: ProverClientConfig::default(),
            scan_batch_size: 256,
            scan_interval: Duration::from_millis(500),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &shade_config::ShadeConfig) -> Self {
        Self {
            limits: CircuitLimits {
                max_consolidate_inputs: config.circuit.max_consolidate_inputs,
                tree_height: config.tree.height,
            },
            max_submit_attempts: config.submission.max_submit_attempts,
            confirm_timeout: config.confirm_timeout(),
            status_poll: config.status_poll_interval(),
            prover: ProverClientConfig {
                timeout: config.proof_timeout(),
                max_retries: config.prover.max_retries,
                retry_base: config.proof_retry_base(),
            },
            scan_batch_size: config.scanner.batch_size,
            scan_interval: config.scan_interval(),
        }
    }
}

// ============================================================================
// Operation Plans
// ============================================================================

/// Who ends up holding an output note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Wallet,
    Recipient(ShieldedAddress),
}

/// Everything needed to (re)build one statement except the Merkle paths
enum PlanKind {
    Deposit {
        from: TransparentAddress,
        note: Note,
    },
    Transfer {
        input: OwnedNote,
        outputs: [Note; 2],
    },
    Withdraw {
        input: OwnedNote,
        receiver: TransparentAddress,
    },
    Consolidate {
        inputs: Vec<OwnedNote>,
        output: Note,
    },
    PartialWithdraw {
        input: OwnedNote,
        receiver: TransparentAddress,
        amount: NoteValue,
        change: Note,
    },
}

struct Plan {
    asset: AssetId,
    kind: PlanKind,
    /// One entry per output note, in commitment order
    owners: Vec<Owner>,
}

impl Plan {
    fn statement_id(&self) -> StatementId {
        match &self.kind {
            PlanKind::Deposit { .. } => StatementId::Deposit,
            PlanKind::Transfer { .. } => StatementId::Transfer,
            PlanKind::Withdraw { .. } => StatementId::Withdraw,
            PlanKind::Consolidate { .. } => StatementId::Consolidate,
            PlanKind::PartialWithdraw { .. } => StatementId::PartialWithdraw,
        }
    }

    fn inputs(&self) -> Vec<&OwnedNote> {
        match &self.kind {
            PlanKind::Deposit { .. } => Vec::new(),
            PlanKind::Transfer { input, .. }
            | PlanKind::Withdraw { input, .. }
            | PlanKind::PartialWithdraw { input, .. } => vec![input],
            PlanKind::Consolidate { inputs, .. } => inputs.iter().collect(),
        }
    }

    fn outputs(&self) -> Vec<&Note> {
        match &self.kind {
            PlanKind::Deposit { note, .. } => vec![note],
            PlanKind::Transfer { outputs, .. } => outputs.iter().collect(),
            PlanKind::Withdraw { .. } => Vec::new(),
            PlanKind::Consolidate { output, .. } => vec![output],
            PlanKind::PartialWithdraw { change, .. } => vec![change],
        }
    }

    fn transparent(&self) -> Option<TransparentLeg> {
        match &self.kind {
            PlanKind::Deposit { from, note } => Some(TransparentLeg::Deposit {
                from: *from,
                asset: self.asset,
                amount: note.amount(),
            }),
            PlanKind::Withdraw { input, receiver } => Some(TransparentLeg::Withdraw {
                to: *receiver,
                asset: self.asset,
                amount: input.amount(),
            }),
            PlanKind::PartialWithdraw {
                receiver, amount, ..
            } => Some(TransparentLeg::Withdraw {
                to: *receiver,
                asset: self.asset,
                amount: *amount,
            }),
            PlanKind::Transfer { .. } | PlanKind::Consolidate { .. } => None,
        }
    }

    /// Build the statement against the tree's current root
    fn build(&self, tree: &CommitmentTree) -> Result<Statement> {
        let root = tree.root();
        let witness = |owned: &OwnedNote| -> Result<SpendWitness> {
            Ok(SpendWitness::new(
                owned.note.clone(),
                tree.prove_inclusion(owned.leaf_index)?,
            ))
        };

        Ok(match &self.kind {
            PlanKind::Deposit { note, .. } => {
                Statement::Deposit(DepositStatement::new(note.clone()))
            }
            PlanKind::Transfer { input, outputs } => Statement::Transfer(TransferStatement::new(
                root,
                witness(input)?,
                outputs.clone(),
            )),
            PlanKind::Withdraw { input, receiver } => {
                Statement::Withdraw(WithdrawStatement::new(root, witness(input)?, *receiver))
            }
            PlanKind::Consolidate { inputs, output } => {
                let witnesses = inputs.iter().map(witness).collect::<Result<Vec<_>>>()?;
                Statement::Consolidate(ConsolidateStatement::new(root, witnesses, output.clone()))
            }
            PlanKind::PartialWithdraw {
                input,
                receiver,
                amount,
                change,
            } => Statement::PartialWithdraw(PartialWithdrawStatement::new(
                root,
                witness(input)?,
                *receiver,
                *amount,
                change.clone(),
            )),
        })
    }
}

/// Outcome of one wallet operation, possibly spanning several transactions
#[derive(Debug, Clone, Default)]
pub struct OperationReceipt {
    /// Landed transactions, consolidation rounds first
    pub tx_ids: Vec<TxId>,
    pub nullifiers: Vec<Nullifier>,
    pub commitments: Vec<Commitment>,
    /// Notes created for this wallet
    pub created: Vec<OwnedNote>,
}

impl OperationReceipt {
    fn record(&mut self, plan: &Plan, receipt: &TxReceipt, created: &[OwnedNote]) {
        self.tx_ids.push(receipt.tx_id);
        self.nullifiers
            .extend(plan.inputs().iter().map(|owned| owned.nullifier()));
        self.commitments
            .extend(plan.outputs().iter().map(|note| note.commitment()));
        self.created.extend_from_slice(created);
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// One wallet's view of the shielded pool
pub struct ProtocolOrchestrator<L, R> {
    keys: KeyHierarchy,
    ledger: Arc<L>,
    relayers: RelayerPool<R>,
    prover: ProverClient,
    store: Arc<Mutex<NoteStore>>,
    /// Local mirror of the ledger's commitment tree
    tree: Mutex<CommitmentTree>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<L: Ledger, R: Relayer> ProtocolOrchestrator<L, R> {
    pub fn new(
        keys: KeyHierarchy,
        ledger: Arc<L>,
        relayers: RelayerPool<R>,
        backend: Arc<dyn ProofBackend>,
        config: OrchestratorConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let tree = CommitmentTree::new(config.limits.tree_height)?;
        let prover = ProverClient::new(backend, config.prover.clone(), cancel.clone());

        Ok(Self {
            keys,
            ledger,
            relayers,
            prover,
            store: Arc::new(Mutex::new(NoteStore::new())),
            tree: Mutex::new(tree),
            config,
            cancel,
        })
    }

    pub fn address(&self) -> ShieldedAddress {
        self.keys.address()
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn relayers(&self) -> &RelayerPool<R> {
        &self.relayers
    }

    pub fn store(&self) -> Arc<Mutex<NoteStore>> {
        self.store.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shielded balance of `asset`
    pub async fn balance(&self, asset: &AssetId) -> u128 {
        self.store.lock().await.balance(asset)
    }

    pub async fn unspent_notes(&self, asset: &AssetId) -> Vec<OwnedNote> {
        self.store.lock().await.unspent(asset)
    }

    /// Scanner feeding this wallet's note store
    pub fn scanner(&self) -> NoteScanner<L> {
        NoteScanner::new(
            self.ledger.clone(),
            self.keys.clone(),
            self.store.clone(),
            self.config.scan_batch_size,
            self.config.scan_interval,
        )
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Move `amount` of `asset` from a transparent account into a new note
    pub async fn deposit(
        &self,
        amount: u64,
        asset: AssetId,
        from: TransparentAddress,
    ) -> Result<OperationReceipt> {
        let note = self.keys.new_owned_note(amount, asset, &mut OsRng)?;
        let plan = Plan {
            asset,
            kind: PlanKind::Deposit { from, note },
            owners: vec![Owner::Wallet],
        };

        let mut receipt = OperationReceipt::default();
        self.run(&plan, &mut receipt, None).await?;
        info!(asset = ?asset, txs = receipt.tx_ids.len(), "Deposit complete");
        Ok(receipt)
    }

    /// Send `amount` of `asset` to a shielded address
    pub async fn transfer(
        &self,
        amount: u64,
        asset: AssetId,
        recipient: &ShieldedAddress,
    ) -> Result<OperationReceipt> {
        let value = NoteValue::positive(amount)?;
        let (selected, lease) = self.select_and_lease(asset, amount).await?;
        let mut leases = vec![lease];
        let mut receipt = OperationReceipt::default();

        let input = self
            .merge_inputs(selected, asset, &mut receipt, &mut leases)
            .await?;

        let owner = if *recipient == self.keys.address() {
            Owner::Wallet
        } else {
            Owner::Recipient(*recipient)
        };
        let recipient_note = match owner {
            Owner::Wallet => self.keys.new_owned_note(amount, asset, &mut OsRng)?,
            Owner::Recipient(_) => Note::random(amount, asset, &mut OsRng)?,
        };

        let plan = match input.amount().checked_sub(value) {
            // Exact amount: hand the whole note over, no zero-value change
            Some(NoteValue::ZERO) => Plan {
                asset,
                kind: PlanKind::Consolidate {
                    inputs: vec![input],
                    output: recipient_note,
                },
                owners: vec![owner],
            },
            Some(change) => {
                let change = self.keys.new_owned_note(change.as_u64(), asset, &mut OsRng)?;
                Plan {
                    asset,
                    kind: PlanKind::Transfer {
                        input,
                        outputs: [recipient_note, change],
                    },
                    owners: vec![owner, Owner::Wallet],
                }
            }
            None => {
                return Err(ProtocolError::InsufficientFunds {
                    needed: amount,
                    available: u128::from(input.amount().as_u64()),
                });
            }
        };

        self.run(&plan, &mut receipt, None).await?;
        info!(asset = ?asset, txs = receipt.tx_ids.len(), "Transfer complete");
        Ok(receipt)
    }

    /// Release `amount` of `asset` from the pool to a transparent account
    pub async fn withdraw(
        &self,
        amount: u64,
        asset: AssetId,
        receiver: TransparentAddress,
    ) -> Result<OperationReceipt> {
        let value = NoteValue::positive(amount)?;
        let (selected, lease) = self.select_and_lease(asset, amount).await?;
        let mut leases = vec![lease];
        let mut receipt = OperationReceipt::default();

        let input = self
            .merge_inputs(selected, asset, &mut receipt, &mut leases)
            .await?;

        let plan = match input.amount().checked_sub(value) {
            Some(NoteValue::ZERO) => Plan {
                asset,
                kind: PlanKind::Withdraw { input, receiver },
                owners: Vec::new(),
            },
            Some(change) => {
                let change = self.keys.new_owned_note(change.as_u64(), asset, &mut OsRng)?;
                Plan {
                    asset,
                    kind: PlanKind::PartialWithdraw {
                        input,
                        receiver,
                        amount: value,
                        change,
                    },
                    owners: vec![Owner::Wallet],
                }
            }
            None => {
                return Err(ProtocolError::InsufficientFunds {
                    needed: amount,
                    available: u128::from(input.amount().as_u64()),
                });
            }
        };

        self.run(&plan, &mut receipt, None).await?;
        info!(asset = ?asset, txs = receipt.tx_ids.len(), "Withdraw complete");
        Ok(receipt)
    }

    /// Merge every available note of `asset` into one
    pub async fn consolidate(&self, asset: AssetId) -> Result<OperationReceipt> {
        let (notes, lease) = {
            let store = self.store.lock().await;
            let notes = store.available(&asset);
            let nullifiers: Vec<Nullifier> = notes.iter().map(OwnedNote::nullifier).collect();
            let lease = store.lease(&nullifiers)?;
            (notes, lease)
        };

        let mut receipt = OperationReceipt::default();
        if notes.len() < 2 {
            debug!(asset = ?asset, notes = notes.len(), "Nothing to consolidate");
            return Ok(receipt);
        }

        let mut leases = vec![lease];
        self.merge_inputs(notes, asset, &mut receipt, &mut leases)
            .await?;
        info!(asset = ?asset, txs = receipt.tx_ids.len(), "Consolidation complete");
        Ok(receipt)
    }

    /// Mark notes whose nullifiers the ledger already holds. Returns how
    /// many notes changed.
    pub async fn reconcile(&self) -> usize {
        let unspent = self.store.lock().await.all_unspent();

        let mut spent = Vec::new();
        for owned in unspent {
            let nullifier = owned.nullifier();
            if self.ledger.is_spent(&nullifier).await {
                spent.push(nullifier);
            }
        }

        let mut store = self.store.lock().await;
        for nullifier in &spent {
            store.mark_spent(nullifier);
        }
        if !spent.is_empty() {
            info!(notes = spent.len(), "Reconciled notes spent elsewhere");
        }
        spent.len()
    }

    /// Append commitments the local tree has not seen yet
    pub async fn sync_tree(&self) -> Result<MerkleRoot> {
        let mut tree = self.tree.lock().await;
        self.sync_locked(&mut tree).await
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    async fn sync_locked(&self, tree: &mut CommitmentTree) -> Result<MerkleRoot> {
        let fresh = self.ledger.commitments_from(tree.size()).await;
        for commitment in &fresh {
            tree.append(commitment)?;
        }
        if !fresh.is_empty() {
            debug!(appended = fresh.len(), tree_size = tree.size(), "Synced commitment tree");
        }
        Ok(tree.root())
    }

    async fn select_and_lease(
        &self,
        asset: AssetId,
        amount: u64,
    ) -> Result<(Vec<OwnedNote>, NoteLease)> {
        let store = self.store.lock().await;
        let available = store.available(&asset);
        let selected = select_inputs(&available, amount)?;
        let nullifiers: Vec<Nullifier> = selected.iter().map(OwnedNote::nullifier).collect();
        let lease = store.lease(&nullifiers)?;
        debug!(asset = ?asset, inputs = selected.len(), "Selected inputs");
        Ok((selected, lease))
    }

    /// Fold `notes` into a single note through consolidation rounds
    async fn merge_inputs(
        &self,
        mut notes: Vec<OwnedNote>,
        asset: AssetId,
        receipt: &mut OperationReceipt,
        leases: &mut Vec<NoteLease>,
    ) -> Result<OwnedNote> {
        while notes.len() > 1 {
            let (groups, carried) =
                consolidation_rounds(notes, self.config.limits.max_consolidate_inputs)?;
            let mut next = carried;
            for group in groups {
                next.push(self.consolidate_group(group, asset, receipt, leases).await?);
            }
            notes = next;
        }
        notes
            .pop()
            .ok_or_else(|| PrivacyError::EmptyInputs.into())
    }

    async fn consolidate_group(
        &self,
        group: Vec<OwnedNote>,
        asset: AssetId,
        receipt: &mut OperationReceipt,
        leases: &mut Vec<NoteLease>,
    ) -> Result<OwnedNote> {
        let total = NoteValue::checked_sum(group.iter().map(OwnedNote::amount))
            .ok_or(PrivacyError::AmountOverflow)?;
        let output = self.keys.new_owned_note(total.as_u64(), asset, &mut OsRng)?;
        debug!(inputs = group.len(), "Consolidating notes");

        let plan = Plan {
            asset,
            kind: PlanKind::Consolidate {
                inputs: group,
                output,
            },
            owners: vec![Owner::Wallet],
        };
        let created = self.run(&plan, receipt, Some(leases)).await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::Rejected("consolidation created no note".into()))
    }

    /// Submit one plan and apply its confirmation to the store
    async fn run(
        &self,
        plan: &Plan,
        receipt: &mut OperationReceipt,
        lease_outputs: Option<&mut Vec<NoteLease>>,
    ) -> Result<Vec<OwnedNote>> {
        let tx_receipt = self.submit_with_retry(plan).await?;
        let created = self.on_confirm(plan, &tx_receipt, lease_outputs).await?;
        receipt.record(plan, &tx_receipt, &created);
        Ok(created)
    }

    async fn submit_with_retry(&self, plan: &Plan) -> Result<TxReceipt> {
        let max_attempts = self.config.max_submit_attempts.max(1);
        let mut attempted: Vec<TxId> = Vec::new();

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(ProtocolError::Cancelled);
            }
            // A superseded submission may have landed after all
            if let Some(receipt) = self.landed(&attempted).await? {
                return Ok(receipt);
            }

            let statement = {
                let mut tree = self.tree.lock().await;
                self.sync_locked(&mut tree).await?;
                plan.build(&tree)?
            };
            statement.check(&self.config.limits)?;

            for nullifier in statement.nullifiers() {
                if self.ledger.is_spent(&nullifier).await {
                    if let Some(receipt) = self.landed(&attempted).await? {
                        return Ok(receipt);
                    }
                    self.store.lock().await.mark_spent(&nullifier);
                    return Err(ProtocolError::AlreadySpent(nullifier));
                }
            }

            let proof = self.prover.prove(statement.clone()).await?;
            let tx = self.package(plan, &statement, proof)?;
            let tx_id = tx.id();
            attempted.push(tx_id);
            debug!(%tx_id, statement = %plan.statement_id(), attempt, "Submitting transaction");

            match self.relayers.submit(&tx).await {
                Ok(_) => {}
                Err(ProtocolError::StaleRoot) => {
                    warn!(%tx_id, attempt, "Root went stale, rebuilding proof");
                    continue;
                }
                Err(ProtocolError::AlreadySpent(nullifier)) => {
                    if let Some(receipt) = self.landed(&attempted).await? {
                        return Ok(receipt);
                    }
                    return Err(ProtocolError::AlreadySpent(nullifier));
                }
                Err(e) => {
                    if let Some(receipt) = self.landed(&attempted).await? {
                        return Ok(receipt);
                    }
                    return Err(e);
                }
            }

            match self.await_confirmation(&tx_id).await? {
                Some(receipt) => {
                    info!(
                        %tx_id,
                        statement = %plan.statement_id(),
                        attempt,
                        leaves = receipt.leaf_indices.len(),
                        "Transaction confirmed"
                    );
                    return Ok(receipt);
                }
                None => warn!(%tx_id, attempt, "Confirmation timed out"),
            }
        }

        if let Some(receipt) = self.landed(&attempted).await? {
            return Ok(receipt);
        }
        warn!(
            statement = %plan.statement_id(),
            attempts = max_attempts,
            "Giving up on congested submission"
        );
        Err(ProtocolError::Congestion {
            attempts: max_attempts,
        })
    }

    fn package(
        &self,
        plan: &Plan,
        statement: &Statement,
        proof: Proof,
    ) -> Result<ShieldedTransaction> {
        let mut encrypted_notes = Vec::with_capacity(plan.owners.len());
        for (note, owner) in statement.output_notes().into_iter().zip(&plan.owners) {
            encrypted_notes.push(match owner {
                Owner::Wallet => None,
                Owner::Recipient(address) => Some(encrypt_for(address, note)?),
            });
        }

        Ok(ShieldedTransaction {
            statement_id: proof.statement_id,
            nullifiers: statement.nullifiers(),
            commitments: statement.commitments(),
            proof: proof.bytes,
            public_inputs: proof.public_inputs,
            encrypted_notes,
            transparent: plan.transparent(),
        })
    }

    /// First attempted transaction that is (or becomes) confirmed
    async fn landed(&self, attempted: &[TxId]) -> Result<Option<TxReceipt>> {
        for tx_id in attempted {
            match self.ledger.status(tx_id).await {
                TxStatus::Confirmed(receipt) => return Ok(Some(receipt)),
                TxStatus::Pending => {
                    if let Some(receipt) = self.await_confirmation(tx_id).await? {
                        return Ok(Some(receipt));
                    }
                }
                TxStatus::Unknown => {}
            }
        }
        Ok(None)
    }

    async fn await_confirmation(&self, tx_id: &TxId) -> Result<Option<TxReceipt>> {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            if let TxStatus::Confirmed(receipt) = self.ledger.status(tx_id).await {
                return Ok(Some(receipt));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProtocolError::Cancelled),
                _ = tokio::time::sleep(self.config.status_poll) => {}
            }
        }
    }

    async fn on_confirm(
        &self,
        plan: &Plan,
        receipt: &TxReceipt,
        lease_outputs: Option<&mut Vec<NoteLease>>,
    ) -> Result<Vec<OwnedNote>> {
        let mut created = Vec::new();
        {
            let mut store = self.store.lock().await;
            for input in plan.inputs() {
                store.mark_spent(&input.nullifier());
            }

            let outputs = plan.outputs().into_iter().zip(&plan.owners);
            for ((note, owner), leaf_index) in outputs.zip(&receipt.leaf_indices) {
                if *owner == Owner::Wallet {
                    store.add_note(note.clone(), *leaf_index);
                    created.push(OwnedNote {
                        note: note.clone(),
                        leaf_index: *leaf_index,
                        status: NoteStatus::Unspent,
                    });
                }
            }

            // Intermediate notes stay reserved until the operation ends
            if let Some(leases) = lease_outputs {
                let nullifiers: Vec<Nullifier> =
                    created.iter().map(OwnedNote::nullifier).collect();
                leases.push(store.lease(&nullifiers)?);
            }
        }

        self.sync_tree().await?;
        Ok(created)
    }
}
