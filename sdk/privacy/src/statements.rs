//! Proof Statements
//!
//! The exact relations a proof attests to, with their public inputs.
//!
//! | Statement        | id | Public inputs (in order)                                        |
//! |------------------|----|-----------------------------------------------------------------|
//! | Deposit          | 0  | commitment                                                      |
//! | Transfer         | 1  | root, nullifier, out_commitment_1, out_commitment_2             |
//! | Withdraw         | 2  | root, receiver, nullifier, amount                               |
//! | Consolidate      | 3  | root, nullifier_1..K, out_commitment                            |
//! | PartialWithdraw  | 4  | root, receiver, nullifier, withdraw_amount, change_commitment   |
//!
//! Every public input is a canonical 32-byte little-endian field encoding.
//! [`Statement::check`] enforces each relation on the client before any
//! backend sees the witness.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::hash::{Field, bytes_to_limbs, domain_tag, field_to_bytes, hash_fields};
use crate::merkle::{DEFAULT_TREE_HEIGHT, MerkleProof, MerkleRoot, verify_inclusion};
use crate::note::{Note, NoteValue};
use crate::nullifier::Nullifier;

/// Default maximum number of inputs of one Consolidate proof
pub const DEFAULT_MAX_CONSOLIDATE_INPUTS: usize = 4;

const ADDRESS_DOMAIN: &[u8] = b"shade/address";

/// Public input vector of a statement
pub type PublicInputs = Vec<[u8; 32]>;

/// Circuit identifiers known to the proof backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatementId {
    Deposit = 0,
    Transfer = 1,
    Withdraw = 2,
    Consolidate = 3,
    PartialWithdraw = 4,
}

impl StatementId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Deposit),
            1 => Some(Self::Transfer),
            2 => Some(Self::Withdraw),
            3 => Some(Self::Consolidate),
            4 => Some(Self::PartialWithdraw),
            _ => None,
        }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Transfer => "transfer",
            Self::Withdraw => "withdraw",
            Self::Consolidate => "consolidate",
            Self::PartialWithdraw => "partial_withdraw",
        };
        f.write_str(name)
    }
}

/// Size limits of the deployed circuits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitLimits {
    pub max_consolidate_inputs: usize,
    /// Height of the commitment tree every inclusion path must match
    pub tree_height: u8,
}

impl CircuitLimits {
    pub fn for_tree_height(tree_height: u8) -> Self {
        Self {
            tree_height,
            ..Self::default()
        }
    }
}

impl Default for CircuitLimits {
    fn default() -> Self {
        Self {
            max_consolidate_inputs: DEFAULT_MAX_CONSOLIDATE_INPUTS,
            tree_height: DEFAULT_TREE_HEIGHT,
        }
    }
}

/// A transparent ledger account
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransparentAddress(pub [u8; 32]);

impl TransparentAddress {
    /// Field element bound into withdraw proofs
    pub fn to_field(&self) -> Field {
        let (lo, hi) = bytes_to_limbs(&self.0);
        hash_fields(&[domain_tag(ADDRESS_DOMAIN), lo, hi])
    }
}

impl fmt::Debug for TransparentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransparentAddress({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for TransparentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A note being spent together with its Merkle path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendWitness {
    pub note: Note,
    pub path: MerkleProof,
}

impl SpendWitness {
    pub fn new(note: Note, path: MerkleProof) -> Self {
        Self { note, path }
    }

    fn check(
        &self,
        position: usize,
        root: &MerkleRoot,
        nullifier: &Nullifier,
        tree_height: u8,
    ) -> Result<()> {
        if !verify_inclusion(&self.note.commitment(), &self.path, root, tree_height) {
            return Err(PrivacyError::InclusionFailed(position));
        }
        if self.note.nullifier() != *nullifier {
            return Err(PrivacyError::NullifierMismatch(position));
        }
        Ok(())
    }
}

/// Shield transparent value into a fresh note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositStatement {
    pub note: Note,
    pub commitment: Commitment,
}

impl DepositStatement {
    pub fn new(note: Note) -> Self {
        let commitment = note.commitment();
        Self { note, commitment }
    }

    fn check(&self) -> Result<()> {
        check_output(0, &self.note, &self.commitment)
    }

    fn public_inputs(&self) -> PublicInputs {
        vec![self.commitment.0]
    }
}

/// Spend one note into a recipient note and a change note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatement {
    pub root: MerkleRoot,
    pub input: SpendWitness,
    pub nullifier: Nullifier,
    pub outputs: [Note; 2],
    pub out_commitments: [Commitment; 2],
}

impl TransferStatement {
    pub fn new(root: MerkleRoot, input: SpendWitness, outputs: [Note; 2]) -> Self {
        let nullifier = input.note.nullifier();
        let out_commitments = [outputs[0].commitment(), outputs[1].commitment()];
        Self {
            root,
            input,
            nullifier,
            outputs,
            out_commitments,
        }
    }

    fn check(&self, limits: &CircuitLimits) -> Result<()> {
        self.input
            .check(0, &self.root, &self.nullifier, limits.tree_height)?;
        let token_id = self.input.note.token_id();
        for (i, (note, commitment)) in self.outputs.iter().zip(&self.out_commitments).enumerate() {
            if note.token_id() != token_id {
                return Err(PrivacyError::TokenMismatch);
            }
            check_output(i, note, commitment)?;
        }
        check_conservation(
            &[self.input.note.amount()],
            &[self.outputs[0].amount(), self.outputs[1].amount()],
        )
    }

    fn public_inputs(&self) -> PublicInputs {
        vec![
            self.root.0,
            self.nullifier.0,
            self.out_commitments[0].0,
            self.out_commitments[1].0,
        ]
    }
}

/// Spend one note entirely to a transparent account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawStatement {
    pub root: MerkleRoot,
    pub input: SpendWitness,
    pub receiver: TransparentAddress,
    pub nullifier: Nullifier,
    pub amount: NoteValue,
}

impl WithdrawStatement {
    pub fn new(root: MerkleRoot, input: SpendWitness, receiver: TransparentAddress) -> Self {
        let nullifier = input.note.nullifier();
        let amount = input.note.amount();
        Self {
            root,
            input,
            receiver,
            nullifier,
            amount,
        }
    }

    fn check(&self, limits: &CircuitLimits) -> Result<()> {
        self.input
            .check(0, &self.root, &self.nullifier, limits.tree_height)?;
        check_conservation(&[self.input.note.amount()], &[self.amount])
    }

    fn public_inputs(&self) -> PublicInputs {
        vec![
            self.root.0,
            field_to_bytes(&self.receiver.to_field()),
            self.nullifier.0,
            amount_bytes(self.amount),
        ]
    }
}

/// Merge K notes of one asset into a single note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidateStatement {
    pub root: MerkleRoot,
    pub inputs: Vec<SpendWitness>,
    pub nullifiers: Vec<Nullifier>,
    pub output: Note,
    pub out_commitment: Commitment,
}

impl ConsolidateStatement {
    pub fn new(root: MerkleRoot, inputs: Vec<SpendWitness>, output: Note) -> Self {
        let nullifiers = inputs.iter().map(|w| w.note.nullifier()).collect();
        let out_commitment = output.commitment();
        Self {
            root,
            inputs,
            nullifiers,
            output,
            out_commitment,
        }
    }

    fn check(&self, limits: &CircuitLimits) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(PrivacyError::EmptyInputs);
        }
        if self.inputs.len() > limits.max_consolidate_inputs {
            return Err(PrivacyError::ArityExceeded {
                max: limits.max_consolidate_inputs,
                got: self.inputs.len(),
            });
        }
        if self.nullifiers.len() != self.inputs.len() {
            return Err(PrivacyError::NullifierMismatch(
                self.nullifiers.len().min(self.inputs.len()),
            ));
        }

        let token_id = self.output.token_id();
        for (i, (input, nullifier)) in self.inputs.iter().zip(&self.nullifiers).enumerate() {
            input.check(i, &self.root, nullifier, limits.tree_height)?;
            if input.note.token_id() != token_id {
                return Err(PrivacyError::TokenMismatch);
            }
            if self.nullifiers[..i].contains(nullifier) {
                return Err(PrivacyError::DuplicateInput(i));
            }
        }
        check_output(0, &self.output, &self.out_commitment)?;

        let inputs: Vec<NoteValue> = self.inputs.iter().map(|w| w.note.amount()).collect();
        check_conservation(&inputs, &[self.output.amount()])
    }

    fn public_inputs(&self) -> PublicInputs {
        let mut inputs = Vec::with_capacity(self.nullifiers.len() + 2);
        inputs.push(self.root.0);
        inputs.extend(self.nullifiers.iter().map(|n| n.0));
        inputs.push(self.out_commitment.0);
        inputs
    }
}

/// Withdraw part of a note, keeping the rest as a change note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialWithdrawStatement {
    pub root: MerkleRoot,
    pub input: SpendWitness,
    pub receiver: TransparentAddress,
    pub nullifier: Nullifier,
    pub withdraw_amount: NoteValue,
    pub change: Note,
    pub change_commitment: Commitment,
}

impl PartialWithdrawStatement {
    pub fn new(
        root: MerkleRoot,
        input: SpendWitness,
        receiver: TransparentAddress,
        withdraw_amount: NoteValue,
        change: Note,
    ) -> Self {
        let nullifier = input.note.nullifier();
        let change_commitment = change.commitment();
        Self {
            root,
            input,
            receiver,
            nullifier,
            withdraw_amount,
            change,
            change_commitment,
        }
    }

    fn check(&self, limits: &CircuitLimits) -> Result<()> {
        self.input
            .check(0, &self.root, &self.nullifier, limits.tree_height)?;
        if self.withdraw_amount == NoteValue::ZERO {
            return Err(PrivacyError::InvalidAmount);
        }
        if self.change.token_id() != self.input.note.token_id() {
            return Err(PrivacyError::TokenMismatch);
        }
        check_output(0, &self.change, &self.change_commitment)?;
        check_conservation(
            &[self.input.note.amount()],
            &[self.withdraw_amount, self.change.amount()],
        )
    }

    fn public_inputs(&self) -> PublicInputs {
        vec![
            self.root.0,
            field_to_bytes(&self.receiver.to_field()),
            self.nullifier.0,
            amount_bytes(self.withdraw_amount),
            self.change_commitment.0,
        ]
    }
}

/// Any statement the proof backend can prove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Deposit(DepositStatement),
    Transfer(TransferStatement),
    Withdraw(WithdrawStatement),
    Consolidate(ConsolidateStatement),
    PartialWithdraw(PartialWithdrawStatement),
}

impl Statement {
    pub fn id(&self) -> StatementId {
        match self {
            Self::Deposit(_) => StatementId::Deposit,
            Self::Transfer(_) => StatementId::Transfer,
            Self::Withdraw(_) => StatementId::Withdraw,
            Self::Consolidate(_) => StatementId::Consolidate,
            Self::PartialWithdraw(_) => StatementId::PartialWithdraw,
        }
    }

    /// Enforce every relation of the statement on the witness
    pub fn check(&self, limits: &CircuitLimits) -> Result<()> {
        match self {
            Self::Deposit(s) => s.check(),
            Self::Transfer(s) => s.check(limits),
            Self::Withdraw(s) => s.check(limits),
            Self::Consolidate(s) => s.check(limits),
            Self::PartialWithdraw(s) => s.check(limits),
        }
    }

    /// Canonical public input vector, in circuit order
    pub fn public_inputs(&self) -> PublicInputs {
        match self {
            Self::Deposit(s) => s.public_inputs(),
            Self::Transfer(s) => s.public_inputs(),
            Self::Withdraw(s) => s.public_inputs(),
            Self::Consolidate(s) => s.public_inputs(),
            Self::PartialWithdraw(s) => s.public_inputs(),
        }
    }

    /// Root the inclusion paths were built against
    pub fn root(&self) -> Option<MerkleRoot> {
        match self {
            Self::Deposit(_) => None,
            Self::Transfer(s) => Some(s.root),
            Self::Withdraw(s) => Some(s.root),
            Self::Consolidate(s) => Some(s.root),
            Self::PartialWithdraw(s) => Some(s.root),
        }
    }

    /// Nullifiers published by this statement
    pub fn nullifiers(&self) -> Vec<Nullifier> {
        match self {
            Self::Deposit(_) => Vec::new(),
            Self::Transfer(s) => vec![s.nullifier],
            Self::Withdraw(s) => vec![s.nullifier],
            Self::Consolidate(s) => s.nullifiers.clone(),
            Self::PartialWithdraw(s) => vec![s.nullifier],
        }
    }

    /// Commitments appended to the tree by this statement
    pub fn commitments(&self) -> Vec<Commitment> {
        match self {
            Self::Deposit(s) => vec![s.commitment],
            Self::Transfer(s) => s.out_commitments.to_vec(),
            Self::Withdraw(_) => Vec::new(),
            Self::Consolidate(s) => vec![s.out_commitment],
            Self::PartialWithdraw(s) => vec![s.change_commitment],
        }
    }

    /// Notes spent by this statement
    pub fn spent_notes(&self) -> Vec<&Note> {
        match self {
            Self::Deposit(_) => Vec::new(),
            Self::Transfer(s) => vec![&s.input.note],
            Self::Withdraw(s) => vec![&s.input.note],
            Self::Consolidate(s) => s.inputs.iter().map(|w| &w.note).collect(),
            Self::PartialWithdraw(s) => vec![&s.input.note],
        }
    }

    /// Notes created by this statement, in commitment order
    pub fn output_notes(&self) -> Vec<&Note> {
        match self {
            Self::Deposit(s) => vec![&s.note],
            Self::Transfer(s) => s.outputs.iter().collect(),
            Self::Withdraw(_) => Vec::new(),
            Self::Consolidate(s) => vec![&s.output],
            Self::PartialWithdraw(s) => vec![&s.change],
        }
    }

    /// Transparent release carried by withdraw statements
    pub fn withdrawal(&self) -> Option<(TransparentAddress, NoteValue)> {
        match self {
            Self::Withdraw(s) => Some((s.receiver, s.amount)),
            Self::PartialWithdraw(s) => Some((s.receiver, s.withdraw_amount)),
            _ => None,
        }
    }
}

/// Canonical encoding of an amount as a public input
pub fn amount_bytes(amount: NoteValue) -> [u8; 32] {
    field_to_bytes(&Field::from(amount.as_u64()))
}

fn check_output(position: usize, note: &Note, commitment: &Commitment) -> Result<()> {
    if note.amount() == NoteValue::ZERO {
        return Err(PrivacyError::InvalidAmount);
    }
    if note.commitment() != *commitment {
        return Err(PrivacyError::CommitmentMismatch(position));
    }
    Ok(())
}

fn check_conservation(inputs: &[NoteValue], outputs: &[NoteValue]) -> Result<()> {
    let total_in = NoteValue::checked_sum(inputs.iter().copied()).ok_or(PrivacyError::AmountOverflow)?;
    let total_out =
        NoteValue::checked_sum(outputs.iter().copied()).ok_or(PrivacyError::AmountOverflow)?;
    if total_in != total_out {
        return Err(PrivacyError::ConservationViolated {
            inputs: u128::from(total_in.as_u64()),
            outputs: u128::from(total_out.as_u64()),
        });
    }
    Ok(())
}
