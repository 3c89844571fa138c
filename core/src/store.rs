//! Wallet note store
//!
//! Notes owned by one wallet, keyed by nullifier. Inputs picked by an
//! in-flight operation are leased so concurrent operations never select the
//! same note; the lease is released when its guard drops.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use shade_privacy::{AssetId, Note, NoteValue, Nullifier};

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Unspent,
    Spent,
}

/// A note the wallet can spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNote {
    pub note: Note,
    pub leaf_index: u64,
    pub status: NoteStatus,
}

impl OwnedNote {
    pub fn nullifier(&self) -> Nullifier {
        self.note.nullifier()
    }

    pub fn amount(&self) -> NoteValue {
        self.note.amount()
    }
}

type LeaseSet = Arc<Mutex<HashSet<Nullifier>>>;

#[derive(Debug, Default)]
pub struct NoteStore {
    notes: Vec<OwnedNote>,
    by_nullifier: HashMap<Nullifier, usize>,
    leases: LeaseSet,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unspent note. Returns false if it was already known.
    pub fn add_note(&mut self, note: Note, leaf_index: u64) -> bool {
        self.add_note_with_status(note, leaf_index, NoteStatus::Unspent)
    }

    pub fn add_note_with_status(&mut self, note: Note, leaf_index: u64, status: NoteStatus) -> bool {
        let nullifier = note.nullifier();
        if let Some(&idx) = self.by_nullifier.get(&nullifier) {
            if status == NoteStatus::Spent {
                self.notes[idx].status = NoteStatus::Spent;
            }
            return false;
        }
        self.by_nullifier.insert(nullifier, self.notes.len());
        self.notes.push(OwnedNote {
            note,
            leaf_index,
            status,
        });
        true
    }

    /// Mark a note spent. Returns false for unknown nullifiers.
    pub fn mark_spent(&mut self, nullifier: &Nullifier) -> bool {
        match self.by_nullifier.get(nullifier) {
            Some(&idx) => {
                self.notes[idx].status = NoteStatus::Spent;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, nullifier: &Nullifier) -> Option<&OwnedNote> {
        self.by_nullifier.get(nullifier).map(|&idx| &self.notes[idx])
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Unspent notes of `asset`, smallest first (ties by leaf index)
    pub fn unspent(&self, asset: &AssetId) -> Vec<OwnedNote> {
        let mut notes: Vec<OwnedNote> = self
            .notes
            .iter()
            .filter(|n| n.status == NoteStatus::Unspent && n.note.asset() == *asset)
            .cloned()
            .collect();
        notes.sort_by_key(|n| (n.amount(), n.leaf_index));
        notes
    }

    /// Unspent notes of `asset` not held by any lease
    pub fn available(&self, asset: &AssetId) -> Vec<OwnedNote> {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        self.unspent(asset)
            .into_iter()
            .filter(|n| !leases.contains(&n.nullifier()))
            .collect()
    }

    /// Sum of unspent notes of `asset`
    pub fn balance(&self, asset: &AssetId) -> u128 {
        self.unspent(asset)
            .iter()
            .map(|n| u128::from(n.amount().as_u64()))
            .sum()
    }

    /// Every unspent note, across assets
    pub fn all_unspent(&self) -> Vec<OwnedNote> {
        self.notes
            .iter()
            .filter(|n| n.status == NoteStatus::Unspent)
            .cloned()
            .collect()
    }

    /// Reserve notes for one operation; all or nothing
    pub fn lease(&self, nullifiers: &[Nullifier]) -> Result<NoteLease> {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        if nullifiers.iter().any(|n| leases.contains(n)) {
            return Err(ProtocolError::NoteBusy);
        }
        leases.extend(nullifiers.iter().copied());
        Ok(NoteLease {
            nullifiers: nullifiers.to_vec(),
            leases: self.leases.clone(),
        })
    }

    pub fn is_leased(&self, nullifier: &Nullifier) -> bool {
        self.leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(nullifier)
    }
}

/// Reservation of input notes, released on drop
#[derive(Debug)]
pub struct NoteLease {
    nullifiers: Vec<Nullifier>,
    leases: LeaseSet,
}

impl NoteLease {
    pub fn nullifiers(&self) -> &[Nullifier] {
        &self.nullifiers
    }
}

impl Drop for NoteLease {
    fn drop(&mut self) {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        for nullifier in &self.nullifiers {
            leases.remove(nullifier);
        }
    }
}
