mod scenarios;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use shade_privacy::{AssetId, CircuitLimits, DepositStatement, KeyHierarchy, Note, Statement, TransparentAddress};
use tokio_util::sync::CancellationToken;

use crate::ledger::{InMemoryLedger, InMemoryLedgerConfig, Ledger, ShieldedTransaction, TransparentLeg};
use crate::orchestrator::{OrchestratorConfig, ProtocolOrchestrator};
use crate::prover::{MockProofBackend, MockVerifier, ProofBackend, ProverClientConfig};
use crate::relayer::{DirectRelayer, Relayer, RelayerPool};

pub(crate) const TREE_HEIGHT: u8 = 10;
pub(crate) const ALICE_ACCOUNT: TransparentAddress = TransparentAddress([0xA0; 32]);
pub(crate) const BOB_ACCOUNT: TransparentAddress = TransparentAddress([0xB0; 32]);
pub(crate) const FAUCET: TransparentAddress = TransparentAddress([0xFA; 32]);

pub(crate) type Wallet = ProtocolOrchestrator<InMemoryLedger, DirectRelayer<InMemoryLedger>>;

pub(crate) fn ledger_with(root_history: usize, confirmation_delay: Duration) -> Arc<InMemoryLedger> {
    Arc::new(
        InMemoryLedger::new(
            InMemoryLedgerConfig {
                tree_height: TREE_HEIGHT,
                root_history,
                nullifier_capacity: None,
                confirmation_delay,
            },
            Arc::new(MockVerifier),
        )
        .unwrap(),
    )
}

pub(crate) fn ledger() -> Arc<InMemoryLedger> {
    ledger_with(32, Duration::ZERO)
}

pub(crate) fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        limits: CircuitLimits::for_tree_height(TREE_HEIGHT),
        confirm_timeout: Duration::from_secs(2),
        status_poll: Duration::from_millis(2),
        prover: ProverClientConfig {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_base: Duration::from_millis(1),
        },
        scan_batch_size: 4,
        scan_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

pub(crate) fn keys(seed: u8) -> KeyHierarchy {
    KeyHierarchy::derive(&[seed; 32]).unwrap()
}

pub(crate) fn wallet_with<R: Relayer>(
    ledger: &Arc<InMemoryLedger>,
    seed: u8,
    relayers: Vec<R>,
    config: OrchestratorConfig,
) -> ProtocolOrchestrator<InMemoryLedger, R> {
    ProtocolOrchestrator::new(
        keys(seed),
        ledger.clone(),
        RelayerPool::new(relayers, Duration::from_secs(1)),
        Arc::new(MockProofBackend::new(config.limits)),
        config,
        CancellationToken::new(),
    )
    .unwrap()
}

pub(crate) fn wallet(ledger: &Arc<InMemoryLedger>, seed: u8) -> Wallet {
    wallet_with(
        ledger,
        seed,
        vec![DirectRelayer::new("direct", ledger.clone())],
        test_config(),
    )
}

/// Deposit from an unrelated account, moving the ledger root
pub(crate) async fn foreign_deposit(ledger: &InMemoryLedger) {
    let note = Note::random(1, AssetId::Native, &mut OsRng).unwrap();
    ledger.fund(FAUCET, AssetId::Native, 1).await;

    let statement = Statement::Deposit(DepositStatement::new(note.clone()));
    let proof = MockProofBackend::default().generate_proof(&statement).unwrap();
    let tx = ShieldedTransaction {
        statement_id: proof.statement_id,
        nullifiers: Vec::new(),
        commitments: statement.commitments(),
        proof: proof.bytes,
        public_inputs: proof.public_inputs,
        encrypted_notes: vec![None],
        transparent: Some(TransparentLeg::Deposit {
            from: FAUCET,
            asset: AssetId::Native,
            amount: note.amount(),
        }),
    };
    ledger.submit(tx).await.unwrap();
}
