//! Nullifier Registry
//!
//! Exactly-once record of spent notes. The ledger owns the authoritative
//! instance; wallets only ever query it.

use std::collections::HashSet;

use shade_privacy::Nullifier;

use crate::error::{ProtocolError, Result};

/// Set of consumed nullifiers
pub trait NullifierRegistry {
    fn contains(&self, nullifier: &Nullifier) -> bool;

    /// Insert one nullifier, failing if it was seen before
    fn insert(&mut self, nullifier: Nullifier) -> Result<()>;

    /// Insert all nullifiers or none of them
    fn insert_all(&mut self, nullifiers: &[Nullifier]) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry with an optional size bound
#[derive(Debug, Clone, Default)]
pub struct InMemoryNullifierSet {
    spent: HashSet<Nullifier>,
    capacity: Option<usize>,
}

impl InMemoryNullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that refuses inserts beyond `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            spent: HashSet::with_capacity(capacity.min(1 << 16)),
            capacity: Some(capacity),
        }
    }

    /// Check that `nullifiers` could all be inserted
    pub fn check_insertable(&self, nullifiers: &[Nullifier]) -> Result<()> {
        let mut batch = HashSet::with_capacity(nullifiers.len());
        for nullifier in nullifiers {
            if self.spent.contains(nullifier) || !batch.insert(*nullifier) {
                return Err(ProtocolError::AlreadySpent(*nullifier));
            }
        }
        if let Some(capacity) = self.capacity {
            if self.spent.len() + nullifiers.len() > capacity {
                return Err(ProtocolError::CapacityExceeded(capacity));
            }
        }
        Ok(())
    }
}

impl NullifierRegistry for InMemoryNullifierSet {
    fn contains(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    fn insert(&mut self, nullifier: Nullifier) -> Result<()> {
        self.insert_all(&[nullifier])
    }

    fn insert_all(&mut self, nullifiers: &[Nullifier]) -> Result<()> {
        self.check_insertable(nullifiers)?;
        self.spent.extend(nullifiers.iter().copied());
        Ok(())
    }

    fn len(&self) -> usize {
        self.spent.len()
    }
}
