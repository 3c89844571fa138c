//! Nullifiers
//!
//! Nullifier derivation for double-spend prevention.
//!
//! ```text
//! Nullifier = Poseidon(secret, rho)
//! ```
//!
//! The preimage shares nothing with the commitment preimage except the
//! secret, so a published nullifier cannot be linked to its commitment
//! without knowing the secret. Once published, the note cannot be spent again.

use std::fmt;

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};

use crate::hash::{Field, field_to_bytes, hash_fields};

/// A nullifier (32 bytes) - unique tag for a spent note
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    /// Derive the nullifier of a note from its secret and rho
    pub fn derive(secret: Field, rho: Field) -> Self {
        Self::from_field(hash_fields(&[secret, rho]))
    }

    /// Create from field element
    pub fn from_field(f: Field) -> Self {
        Self(field_to_bytes(&f))
    }

    /// Convert to field element
    pub fn to_field(&self) -> Field {
        Field::from_le_bytes_mod_order(&self.0)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({})", hex::encode(&self.0[..8]))
    }
}

impl AsRef<[u8]> for Nullifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullifier_deterministic() {
        let n1 = Nullifier::derive(Field::from(1u64), Field::from(2u64));
        let n2 = Nullifier::derive(Field::from(1u64), Field::from(2u64));

        assert_eq!(n1, n2, "same inputs should produce same nullifier");
    }

    #[test]
    fn test_nullifier_requires_secret() {
        let rho = Field::from(3u64);
        let n1 = Nullifier::derive(Field::from(1u64), rho);
        let n2 = Nullifier::derive(Field::from(2u64), rho);

        assert_ne!(n1, n2, "different secrets should produce different nullifiers");
    }

    #[test]
    fn test_rho_affects_nullifier() {
        let secret = Field::from(1u64);
        let n1 = Nullifier::derive(secret, Field::from(0u64));
        let n2 = Nullifier::derive(secret, Field::from(1u64));

        assert_ne!(n1, n2, "different rho should produce different nullifiers");
    }

    #[test]
    fn test_field_roundtrip() {
        let n = Nullifier::derive(Field::from(5u64), Field::from(6u64));
        assert_eq!(Nullifier::from_field(n.to_field()), n);
    }
}
