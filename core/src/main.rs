//! # Shade demo
//!
//! Runs two wallets against the in-process reference ledger:
//! Alice shields funds, pays Bob privately, Bob discovers the payment and
//! withdraws it to a transparent account.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::rngs::OsRng;
use shade_config::ShadeConfig;
use shade_core::{
    DirectRelayer, InMemoryLedger, InMemoryLedgerConfig, MockProofBackend, MockVerifier,
    OrchestratorConfig, ProtocolOrchestrator, RelayerPool,
};
use shade_privacy::{AssetId, KeyHierarchy, TransparentAddress};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "shade-demo")]
#[command(about = "Shielded pool walkthrough against an in-process ledger", long_about = None)]
struct Args {
    /// Config file (defaults to the usual search path)
    #[arg(long, env = "SHADE_CONFIG")]
    config: Option<PathBuf>,

    /// Amount Alice shields
    #[arg(long, default_value_t = 100)]
    deposit: u64,

    /// Amount Alice sends to Bob
    #[arg(long, default_value_t = 60)]
    transfer: u64,

    /// Print a sample config file and exit
    #[arg(long)]
    sample_config: bool,
}

type Wallet = ProtocolOrchestrator<InMemoryLedger, DirectRelayer<InMemoryLedger>>;

fn open_wallet(
    ledger: &Arc<InMemoryLedger>,
    config: &ShadeConfig,
    cancel: &CancellationToken,
) -> Result<Wallet> {
    let orchestrator_config = OrchestratorConfig::from_config(config);
    let relayers: Vec<_> = config
        .relayer
        .endpoints
        .iter()
        .map(|name| DirectRelayer::new(name.clone(), ledger.clone()))
        .collect();

    let wallet = ProtocolOrchestrator::new(
        KeyHierarchy::random(&mut OsRng)?,
        ledger.clone(),
        RelayerPool::new(
            relayers,
            Duration::from_millis(config.relayer.request_timeout_ms),
        ),
        Arc::new(MockProofBackend::new(orchestrator_config.limits)),
        orchestrator_config,
        cancel.clone(),
    )?;
    Ok(wallet)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shade_core=info,shade_demo=info".into()),
        )
        .init();

    let args = Args::parse();
    if args.sample_config {
        print!("{}", ShadeConfig::generate_sample());
        return Ok(());
    }
    if args.transfer == 0 || args.transfer > args.deposit {
        bail!("transfer must be in 1..={}", args.deposit);
    }

    let config = match &args.config {
        Some(path) => ShadeConfig::load_from(path)?,
        None => ShadeConfig::load()?,
    };

    let ledger = Arc::new(
        InMemoryLedger::new(
            InMemoryLedgerConfig::from_config(&config),
            Arc::new(MockVerifier),
        )
        .context("Failed to create reference ledger")?,
    );
    let cancel = CancellationToken::new();

    let alice = open_wallet(&ledger, &config, &cancel).context("Failed to open Alice's wallet")?;
    let bob = open_wallet(&ledger, &config, &cancel).context("Failed to open Bob's wallet")?;
    info!(alice = %alice.address(), bob = %bob.address(), "Wallets ready");

    let alice_account = TransparentAddress([0xA1; 32]);
    let bob_account = TransparentAddress([0xB1; 32]);
    ledger
        .fund(alice_account, AssetId::Native, args.deposit)
        .await;

    let scanner = Arc::new(bob.scanner());
    let scan_task = scanner.clone().spawn(cancel.clone());

    alice
        .deposit(args.deposit, AssetId::Native, alice_account)
        .await
        .context("Deposit failed")?;
    alice
        .transfer(args.transfer, AssetId::Native, &bob.address())
        .await
        .context("Transfer failed")?;

    // Catch up with everything published so far
    scanner.scan_once().await;
    bob.withdraw(args.transfer, AssetId::Native, bob_account)
        .await
        .context("Withdraw failed")?;

    cancel.cancel();
    scan_task.await.context("Scanner task panicked")?;

    info!(
        alice_shielded = alice.balance(&AssetId::Native).await,
        bob_shielded = bob.balance(&AssetId::Native).await,
        bob_transparent = ledger.transparent_balance(&bob_account, &AssetId::Native).await,
        nullifiers = ledger.nullifier_count().await,
        commitments = ledger.tree_size().await,
        "Walkthrough finished"
    );
    Ok(())
}
