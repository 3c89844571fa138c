//! Note Commitments
//!
//! Poseidon-based commitments for notes.
//!
//! ```text
//! Commitment = Poseidon(secret, amount, token_id, blinding)
//! ```
//!
//! Hides the note contents while binding amount and asset.

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{Field, field_from_bytes, field_to_bytes, hash_fields};
use crate::note::NoteValue;

/// A note commitment (32 bytes, canonical field encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Create commitment from field element
    pub fn from_field(f: Field) -> Self {
        Self(field_to_bytes(&f))
    }

    /// Convert to field element
    pub fn to_field(&self) -> Field {
        Field::from_le_bytes_mod_order(&self.0)
    }

    /// Parse a canonical encoding
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        field_from_bytes(&bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Commit to a note: C = Poseidon(secret, amount, token_id, blinding)
pub fn commit(secret: Field, amount: NoteValue, token_id: Field, blinding: Field) -> Commitment {
    Commitment::from_field(hash_fields(&[
        secret,
        Field::from(amount.as_u64()),
        token_id,
        blinding,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(v: u64) -> Field {
        Field::from(v)
    }

    #[test]
    fn test_commitment_deterministic() {
        let c1 = commit(f(1), NoteValue::new(1000), f(2), f(42));
        let c2 = commit(f(1), NoteValue::new(1000), f(2), f(42));

        assert_eq!(c1, c2, "same inputs should produce same commitment");
    }

    #[test]
    fn test_commitment_hiding() {
        let c1 = commit(f(1), NoteValue::new(1000), f(2), f(1));
        let c2 = commit(f(1), NoteValue::new(1000), f(2), f(2));

        assert_ne!(
            c1, c2,
            "different blinding should produce different commitments"
        );
    }

    #[test]
    fn test_commitment_binding() {
        let c1 = commit(f(1), NoteValue::new(1000), f(2), f(42));
        let c2 = commit(f(1), NoteValue::new(2000), f(2), f(42));
        let c3 = commit(f(1), NoteValue::new(1000), f(3), f(42));

        assert_ne!(c1, c2, "different values should produce different commitments");
        assert_ne!(c1, c3, "different tokens should produce different commitments");
    }

    #[test]
    fn test_commitment_field_roundtrip() {
        let c = commit(f(5), NoteValue::new(7), f(9), f(11));
        assert_eq!(Commitment::from_field(c.to_field()), c);
        assert_eq!(Commitment::from_bytes(c.0).unwrap(), c);
    }
}
