use shade_privacy::{
    AssetId, CircuitLimits, CommitmentTree, Mint, SpendWitness, Statement, TransparentAddress, WithdrawStatement,
};

use super::*;
use crate::error::ProtocolError;
use crate::ledger::LedgerEvent;
use crate::store::NoteStatus;

#[tokio::test]
async fn shielded_round_trip_between_two_wallets() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 100).await;
    let alice = wallet(&ledger, 1);
    let bob = wallet(&ledger, 2);

    alice
        .deposit(100, AssetId::Native, ALICE_ACCOUNT)
        .await
        .unwrap();
    let transfer = alice
        .transfer(60, AssetId::Native, &bob.address())
        .await
        .unwrap();
    assert_eq!(transfer.tx_ids.len(), 1);
    assert_eq!(transfer.created.len(), 1, "only the change note is ours");

    assert_eq!(bob.scanner().scan_once().await, 1);
    assert_eq!(bob.balance(&AssetId::Native).await, 60);

    let withdraw = bob
        .withdraw(60, AssetId::Native, BOB_ACCOUNT)
        .await
        .unwrap();
    assert!(withdraw.commitments.is_empty(), "exact withdraw has no change");

    let alice_notes = alice.unspent_notes(&AssetId::Native).await;
    assert_eq!(alice_notes.len(), 1);
    assert_eq!(alice_notes[0].amount().as_u64(), 40);
    assert!(bob.unspent_notes(&AssetId::Native).await.is_empty());

    assert_eq!(ledger.nullifier_count().await, 2);
    assert_eq!(ledger.tree_size().await, 3);
    assert_eq!(ledger.transparent_balance(&BOB_ACCOUNT, &AssetId::Native).await, 60);
    assert_eq!(ledger.transparent_balance(&ALICE_ACCOUNT, &AssetId::Native).await, 0);
    assert_eq!(ledger.vault_balance(&AssetId::Native).await, 40);
}

#[tokio::test]
async fn exact_transfer_creates_no_change_note() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 25).await;
    let alice = wallet(&ledger, 1);
    let bob = wallet(&ledger, 2);

    alice.deposit(25, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    let receipt = alice
        .transfer(25, AssetId::Native, &bob.address())
        .await
        .unwrap();

    assert_eq!(receipt.commitments.len(), 1);
    assert!(receipt.created.is_empty());
    assert_eq!(alice.balance(&AssetId::Native).await, 0);
    assert_eq!(ledger.tree_size().await, 2);

    bob.scanner().scan_once().await;
    assert_eq!(bob.balance(&AssetId::Native).await, 25);
}

#[tokio::test]
async fn partial_withdraw_keeps_change() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 50).await;
    let alice = wallet(&ledger, 1);

    alice.deposit(50, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    let receipt = alice
        .withdraw(20, AssetId::Native, BOB_ACCOUNT)
        .await
        .unwrap();

    assert_eq!(receipt.created.len(), 1);
    assert_eq!(alice.balance(&AssetId::Native).await, 30);
    assert_eq!(ledger.transparent_balance(&BOB_ACCOUNT, &AssetId::Native).await, 20);
    assert!(ledger.events().await.contains(&LedgerEvent::FundsReleased {
        to: BOB_ACCOUNT,
        asset: AssetId::Native,
        amount: 20,
    }));
}

#[tokio::test]
async fn second_spend_of_a_note_is_rejected() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 100).await;
    let alice = wallet(&ledger, 1);

    let deposit = alice
        .deposit(100, AssetId::Native, ALICE_ACCOUNT)
        .await
        .unwrap();
    let owned = deposit.created[0].clone();
    alice
        .withdraw(100, AssetId::Native, ALICE_ACCOUNT)
        .await
        .unwrap();

    // A different transaction carrying the same nullifier
    let mut tree = CommitmentTree::new(TREE_HEIGHT).unwrap();
    for commitment in ledger.commitments_from(0).await {
        tree.append(&commitment).unwrap();
    }
    let witness = SpendWitness::new(
        owned.note.clone(),
        tree.prove_inclusion(owned.leaf_index).unwrap(),
    );
    let statement = Statement::Withdraw(WithdrawStatement::new(
        tree.root(),
        witness,
        TransparentAddress([0xEE; 32]),
    ));
    let proof = MockProofBackend::new(CircuitLimits::for_tree_height(TREE_HEIGHT))
        .generate_proof(&statement)
        .unwrap();
    let replay = ShieldedTransaction {
        statement_id: proof.statement_id,
        nullifiers: statement.nullifiers(),
        commitments: Vec::new(),
        proof: proof.bytes,
        public_inputs: proof.public_inputs,
        encrypted_notes: Vec::new(),
        transparent: Some(TransparentLeg::Withdraw {
            to: TransparentAddress([0xEE; 32]),
            asset: AssetId::Native,
            amount: owned.amount(),
        }),
    };
    assert_eq!(
        ledger.submit(replay).await,
        Err(ProtocolError::AlreadySpent(owned.nullifier()))
    );
    assert_eq!(ledger.nullifier_count().await, 1);

    // A wallet with a stale store is stopped before proving
    let stale = wallet(&ledger, 1);
    stale
        .store()
        .lock()
        .await
        .add_note(owned.note.clone(), owned.leaf_index);
    assert_eq!(
        stale.withdraw(100, AssetId::Native, ALICE_ACCOUNT).await.unwrap_err(),
        ProtocolError::AlreadySpent(owned.nullifier())
    );
    assert_eq!(
        stale.store().lock().await.get(&owned.nullifier()).map(|n| n.status),
        Some(NoteStatus::Spent)
    );
}

#[tokio::test]
async fn consolidation_preserves_sum_and_token() {
    let token = AssetId::Token(Mint([7u8; 32]));
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, token, 35).await;

    let mut config = test_config();
    config.limits.max_consolidate_inputs = 2;
    let alice = wallet_with(
        &ledger,
        1,
        vec![DirectRelayer::new("direct", ledger.clone())],
        config,
    );

    for amount in [3, 5, 7, 9, 11] {
        alice.deposit(amount, token, ALICE_ACCOUNT).await.unwrap();
    }
    let receipt = alice.consolidate(token).await.unwrap();

    // [3,5] [7,9] carry 11 -> [11,8] carry 16 -> [16,19]
    assert_eq!(receipt.tx_ids.len(), 4);
    assert_eq!(receipt.nullifiers.len(), 8);

    let notes = alice.unspent_notes(&token).await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].amount().as_u64(), 35);
    assert_eq!(notes[0].note.asset(), token);
    assert_eq!(notes[0].note.token_id(), token.token_id());
    assert_eq!(ledger.vault_balance(&token).await, 35);
    assert_eq!(alice.balance(&AssetId::Native).await, 0);
}

#[tokio::test]
async fn multi_note_transfer_consolidates_first() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 60).await;
    let alice = wallet(&ledger, 1);
    let bob = wallet(&ledger, 2);

    alice.deposit(30, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    alice.deposit(30, AssetId::Native, ALICE_ACCOUNT).await.unwrap();

    let receipt = alice
        .transfer(50, AssetId::Native, &bob.address())
        .await
        .unwrap();
    assert_eq!(receipt.tx_ids.len(), 2);
    assert_eq!(alice.balance(&AssetId::Native).await, 10);

    bob.scanner().scan_once().await;
    assert_eq!(bob.balance(&AssetId::Native).await, 50);
}

#[tokio::test]
async fn insufficient_funds_leaves_wallet_untouched() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 10).await;
    let alice = wallet(&ledger, 1);
    let bob = wallet(&ledger, 2);

    let deposit = alice.deposit(10, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    assert_eq!(
        alice
            .transfer(11, AssetId::Native, &bob.address())
            .await
            .unwrap_err(),
        ProtocolError::InsufficientFunds {
            needed: 11,
            available: 10
        }
    );
    assert!(matches!(
        alice.transfer(0, AssetId::Native, &bob.address()).await,
        Err(ProtocolError::Privacy(_))
    ));

    let store = alice.store();
    let store = store.lock().await;
    assert!(!store.is_leased(&deposit.created[0].nullifier()));
    assert_eq!(store.balance(&AssetId::Native), 10);
    assert_eq!(ledger.nullifier_count().await, 0);
}

#[tokio::test]
async fn scanner_rescan_is_idempotent() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 30).await;
    let alice = wallet(&ledger, 1);
    let bob = wallet(&ledger, 2);

    alice.deposit(30, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    for _ in 0..3 {
        alice
            .transfer(5, AssetId::Native, &bob.address())
            .await
            .unwrap();
    }

    let scanner = bob.scanner();
    assert_eq!(scanner.scan_once().await, 3);
    assert_eq!(scanner.scan_once().await, 0);
    assert_eq!(scanner.rescan().await, 0);
    assert_eq!(bob.balance(&AssetId::Native).await, 15);
    assert_eq!(bob.unspent_notes(&AssetId::Native).await.len(), 3);
}

#[tokio::test]
async fn reconcile_marks_notes_spent_elsewhere() {
    let ledger = ledger();
    ledger.fund(ALICE_ACCOUNT, AssetId::Native, 40).await;
    let alice = wallet(&ledger, 1);
    let twin = wallet(&ledger, 1);

    let deposit = alice.deposit(40, AssetId::Native, ALICE_ACCOUNT).await.unwrap();
    let owned = deposit.created[0].clone();
    twin.store()
        .lock()
        .await
        .add_note(owned.note.clone(), owned.leaf_index);
    assert_eq!(twin.reconcile().await, 0);

    alice
        .withdraw(40, AssetId::Native, ALICE_ACCOUNT)
        .await
        .unwrap();
    assert_eq!(twin.reconcile().await, 1);
    assert_eq!(twin.balance(&AssetId::Native).await, 0);
    assert_eq!(twin.reconcile().await, 0);
}

#[tokio::test]
async fn tree_cache_tracks_ledger_root() {
    let ledger = ledger();
    let alice = wallet(&ledger, 1);
    assert_eq!(alice.sync_tree().await.unwrap(), ledger.latest_root().await);

    foreign_deposit(&ledger).await;
    foreign_deposit(&ledger).await;
    assert_eq!(alice.sync_tree().await.unwrap(), ledger.latest_root().await);
}
