//! Merkle Tree for Note Commitments
//!
//! Append-only accumulator over every commitment in the pool. Used for
//! proving note existence without revealing which note.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               C0  C1 C2   0      (Note Commitments, zero = empty leaf)
//! ```
//!
//! Internal nodes use the same Poseidon instance as commitments and
//! nullifiers. A subtree that is completely filled never changes again, which
//! is what lets [`CommitmentTree::prove_inclusion_at`] rebuild paths against
//! any earlier root.

use std::collections::VecDeque;
use std::fmt;

use ark_ff::{PrimeField, Zero};
use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::{PrivacyError, Result};
use crate::hash::{Field, field_to_bytes, hash_fields};

/// Default tree height (about a million notes)
pub const DEFAULT_TREE_HEIGHT: u8 = 20;
/// Largest supported height (2^32 notes)
pub const MAX_TREE_HEIGHT: u8 = 32;
/// Default number of recent roots accepted for proofs
pub const DEFAULT_ROOT_HISTORY: usize = 32;

/// A Merkle root (canonical field encoding)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerkleRoot(pub [u8; 32]);

impl MerkleRoot {
    pub fn from_field(f: Field) -> Self {
        Self(field_to_bytes(&f))
    }

    pub fn to_field(&self) -> Field {
        Field::from_le_bytes_mod_order(&self.0)
    }
}

impl fmt::Debug for MerkleRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleRoot({})", hex::encode(&self.0[..8]))
    }
}

/// A Merkle path proving inclusion of a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The leaf position
    pub leaf_index: u64,
    /// Sibling hashes from leaf to root
    pub siblings: Vec<Field>,
    /// Position bits (false = current node is left, true = right)
    pub path_bits: Vec<bool>,
}

impl MerkleProof {
    /// Tree height this proof was built for
    pub fn height(&self) -> usize {
        self.siblings.len()
    }

    /// Replay the hash chain from `leaf` to a root
    pub fn compute_root(&self, leaf: Field) -> Field {
        let mut current = leaf;
        for (sibling, is_right) in self.siblings.iter().zip(self.path_bits.iter()) {
            current = if *is_right {
                hash_pair(*sibling, current)
            } else {
                hash_pair(current, *sibling)
            };
        }
        current
    }

    /// Check that the path has exactly `height` levels and that its bits
    /// line up with the leaf index
    pub fn validate_shape(&self, height: u8) -> Result<()> {
        if height > MAX_TREE_HEIGHT {
            return Err(PrivacyError::MalformedProof("height above the maximum"));
        }
        if self.siblings.len() != height as usize {
            return Err(PrivacyError::MalformedProof("path length differs from tree height"));
        }
        if self.path_bits.len() != self.siblings.len() {
            return Err(PrivacyError::MalformedProof("siblings and bits differ in length"));
        }
        if self.leaf_index >> height != 0 {
            return Err(PrivacyError::MalformedProof("leaf index beyond tree capacity"));
        }
        let consistent = self
            .path_bits
            .iter()
            .enumerate()
            .all(|(level, bit)| ((self.leaf_index >> level) & 1 == 1) == *bit);
        if !consistent {
            return Err(PrivacyError::MalformedProof("path bits disagree with leaf index"));
        }
        Ok(())
    }

    /// Verify that this path proves inclusion of `leaf` in `root` of a
    /// tree of the given height
    pub fn verify(&self, leaf: &Commitment, root: &MerkleRoot, height: u8) -> bool {
        verify_inclusion(leaf, self, root, height)
    }
}

/// Pure inclusion check, usable locally and by verifiers.
///
/// A path shorter or longer than `height` is rejected, so an interior node
/// can never pass as a leaf.
pub fn verify_inclusion(
    leaf: &Commitment,
    proof: &MerkleProof,
    root: &MerkleRoot,
    height: u8,
) -> bool {
    if proof.validate_shape(height).is_err() {
        return false;
    }
    MerkleRoot::from_field(proof.compute_root(leaf.to_field())) == *root
}

/// Hash two children to get parent
pub fn hash_pair(left: Field, right: Field) -> Field {
    hash_fields(&[left, right])
}

/// Empty subtree roots: zeros[0] is the empty leaf, zeros[l + 1] = H(zeros[l], zeros[l])
pub fn empty_roots(height: u8) -> Vec<Field> {
    let mut zeros = Vec::with_capacity(height as usize + 1);
    let mut current = Field::zero();
    zeros.push(current);
    for _ in 0..height {
        current = hash_pair(current, current);
        zeros.push(current);
    }
    zeros
}

/// Root history for the Merkle tree
///
/// Stores recent roots to allow transactions to reference
/// slightly stale roots (handles race conditions).
#[derive(Debug, Clone, Default)]
pub struct RootHistory {
    /// Recent roots (most recent first)
    roots: VecDeque<MerkleRoot>,
    /// Maximum history size
    max_size: usize,
}

impl RootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    /// Add a new root
    pub fn push(&mut self, root: MerkleRoot) {
        self.roots.push_front(root);
        if self.roots.len() > self.max_size {
            self.roots.pop_back();
        }
    }

    /// Check if a root is valid (current or recent)
    pub fn is_valid(&self, root: &MerkleRoot) -> bool {
        self.roots.contains(root)
    }

    /// Get the most recent root
    pub fn current(&self) -> Option<&MerkleRoot> {
        self.roots.front()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Append-only commitment tree of fixed height
#[derive(Debug, Clone)]
pub struct CommitmentTree {
    height: u8,
    /// levels[0] are the leaves, levels[height] holds the root
    levels: Vec<Vec<Field>>,
    zeros: Vec<Field>,
    history: RootHistory,
}

impl CommitmentTree {
    /// Create an empty tree with the default root history
    pub fn new(height: u8) -> Result<Self> {
        Self::with_history(height, DEFAULT_ROOT_HISTORY)
    }

    /// Create an empty tree keeping `history` recent roots
    pub fn with_history(height: u8, history: usize) -> Result<Self> {
        if height == 0 || height > MAX_TREE_HEIGHT {
            return Err(PrivacyError::MalformedProof("tree height must be in 1..=32"));
        }
        let zeros = empty_roots(height);
        let mut root_history = RootHistory::new(history);
        root_history.push(MerkleRoot::from_field(zeros[height as usize]));

        Ok(Self {
            height,
            levels: vec![Vec::new(); height as usize + 1],
            zeros,
            history: root_history,
        })
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// Number of leaves the tree can hold
    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    /// Number of appended leaves
    pub fn size(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Get current root
    pub fn root(&self) -> MerkleRoot {
        MerkleRoot::from_field(self.node(self.height as usize, 0))
    }

    /// Root of the tree as it was after `size` leaves
    pub fn root_at(&self, size: u64) -> Result<MerkleRoot> {
        if size > self.size() {
            return Err(PrivacyError::UnknownLeaf {
                index: size,
                size: self.size(),
            });
        }
        Ok(MerkleRoot::from_field(
            self.node_at(self.height as usize, 0, size),
        ))
    }

    /// Whether `root` is the current root or in the recent history
    pub fn is_known_root(&self, root: &MerkleRoot) -> bool {
        self.history.is_valid(root)
    }

    /// Get commitment at position
    pub fn leaf(&self, index: u64) -> Option<Commitment> {
        self.levels[0]
            .get(index as usize)
            .map(|f| Commitment::from_field(*f))
    }

    /// Append a commitment, returning its index and the new root
    pub fn append(&mut self, commitment: &Commitment) -> Result<(u64, MerkleRoot)> {
        let index = self.size();
        if index >= self.capacity() {
            return Err(PrivacyError::TreeFull {
                capacity: self.capacity(),
            });
        }

        self.levels[0].push(commitment.to_field());

        let mut current_index = index as usize;
        for level in 0..self.height as usize {
            let parent_index = current_index / 2;
            let left = self.node(level, parent_index * 2);
            let right = self.node(level, parent_index * 2 + 1);
            let parent = hash_pair(left, right);

            let parents = &mut self.levels[level + 1];
            if parent_index < parents.len() {
                parents[parent_index] = parent;
            } else {
                parents.push(parent);
            }
            current_index = parent_index;
        }

        let root = self.root();
        self.history.push(root);
        Ok((index, root))
    }

    /// Get the Merkle path for a leaf against the current root
    pub fn prove_inclusion(&self, leaf_index: u64) -> Result<MerkleProof> {
        self.prove_inclusion_at(leaf_index, self.size())
    }

    /// Get the Merkle path for a leaf against the root after `size` leaves
    pub fn prove_inclusion_at(&self, leaf_index: u64, size: u64) -> Result<MerkleProof> {
        if leaf_index >= size || size > self.size() {
            return Err(PrivacyError::UnknownLeaf {
                index: leaf_index,
                size: self.size().min(size),
            });
        }

        let mut siblings = Vec::with_capacity(self.height as usize);
        let mut path_bits = Vec::with_capacity(self.height as usize);
        let mut current_index = leaf_index;

        for level in 0..self.height as usize {
            let is_right = current_index & 1 == 1;
            path_bits.push(is_right);
            let sibling_index = current_index ^ 1;
            siblings.push(self.node_at(level, sibling_index, size));
            current_index /= 2;
        }

        Ok(MerkleProof {
            leaf_index,
            siblings,
            path_bits,
        })
    }

    /// Current value of a node, empty-subtree root when unpopulated
    fn node(&self, level: usize, index: usize) -> Field {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Value of a node in the tree restricted to its first `size` leaves
    fn node_at(&self, level: usize, index: u64, size: u64) -> Field {
        let start = index << level;
        let end = (index + 1) << level;
        if start >= size {
            return self.zeros[level];
        }
        if end <= size {
            return self.node(level, index as usize);
        }
        // level > 0 here: a single leaf is either fully before or after `size`
        hash_pair(
            self.node_at(level - 1, index * 2, size),
            self.node_at(level - 1, index * 2 + 1, size),
        )
    }
}
