//! Shielded Notes
//!
//! A Note represents value held privately in the pool.
//!
//! ```text
//! Note = {
//!     secret:   Fr,       // spend authority, never leaves the owner
//!     amount:   u64,      // non-zero, smallest unit
//!     asset:    AssetId,  // token_id = asset.token_id()
//!     blinding: Fr,       // hides the commitment
//!     rho:      Fr,       // nullifier randomness
//! }
//! ```

use std::fmt;

use ark_ff::{BigInteger, PrimeField};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::commitment::{Commitment, commit};
use crate::error::{PrivacyError, Result};
use crate::hash::{Field, field_from_bytes, random_field};
use crate::nullifier::Nullifier;

/// Note value with overflow protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteValue(pub u64);

impl NoteValue {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// A value usable as a note amount (rejects zero)
    pub fn positive(value: u64) -> Result<Self> {
        if value == 0 {
            return Err(PrivacyError::InvalidAmount);
        }
        Ok(Self(value))
    }

    /// Decode an amount from a 32-byte field encoding.
    ///
    /// Rejects non-canonical encodings, zero, and anything that does not fit
    /// in 64 bits.
    pub fn from_field_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let f = field_from_bytes(bytes).map_err(|_| PrivacyError::InvalidAmount)?;
        let limbs = f.into_bigint().to_bytes_le();
        if limbs.iter().skip(8).any(|b| *b != 0) {
            return Err(PrivacyError::InvalidAmount);
        }
        let mut lo = [0u8; 8];
        lo.copy_from_slice(&limbs[..8]);
        Self::positive(u64::from_le_bytes(lo))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Checked sum of many values
    pub fn checked_sum<I: IntoIterator<Item = Self>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .try_fold(Self::ZERO, |acc, v| acc.checked_add(v))
    }
}

/// A shielded note representing privately held value
#[derive(Clone, PartialEq, Eq)]
pub struct Note {
    secret: Field,
    amount: NoteValue,
    asset: AssetId,
    blinding: Field,
    rho: Field,
}

impl Note {
    /// Create a note from explicit parts (recovery, decryption, tests)
    pub fn new(
        secret: Field,
        amount: u64,
        asset: AssetId,
        blinding: Field,
        rho: Field,
    ) -> Result<Self> {
        Ok(Self {
            secret,
            amount: NoteValue::positive(amount)?,
            asset,
            blinding,
            rho,
        })
    }

    /// Create a note with fresh secret, blinding and rho
    pub fn random<R: RngCore + CryptoRng>(amount: u64, asset: AssetId, rng: &mut R) -> Result<Self> {
        let amount = NoteValue::positive(amount)?;
        Ok(Self {
            secret: random_field(rng),
            amount,
            asset,
            blinding: random_field(rng),
            rho: random_field(rng),
        })
    }

    /// Create a note with fresh randomness from the OS generator
    pub fn from_secrets(amount: u64, asset: AssetId) -> Result<Self> {
        Self::random(amount, asset, &mut OsRng)
    }

    pub fn secret(&self) -> Field {
        self.secret
    }

    pub fn amount(&self) -> NoteValue {
        self.amount
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// Canonical field element of the note's asset
    pub fn token_id(&self) -> Field {
        self.asset.token_id()
    }

    pub fn blinding(&self) -> Field {
        self.blinding
    }

    pub fn rho(&self) -> Field {
        self.rho
    }

    /// Compute the commitment for this note
    pub fn commitment(&self) -> Commitment {
        commit(self.secret, self.amount, self.token_id(), self.blinding)
    }

    /// Derive the nullifier published when spending this note
    pub fn nullifier(&self) -> Nullifier {
        Nullifier::derive(self.secret, self.rho)
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("amount", &self.amount.0)
            .field("asset", &self.asset)
            .field("commitment", &self.commitment())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Mint;
    use crate::hash::field_to_bytes;
    use std::collections::HashSet;

    #[test]
    fn test_note_commitment() {
        let note = Note::from_secrets(1000, AssetId::Native).unwrap();

        let c1 = note.commitment();
        let c2 = note.commitment();

        assert_eq!(c1, c2, "commitment should be deterministic");
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert_eq!(
            Note::from_secrets(0, AssetId::Native).unwrap_err(),
            PrivacyError::InvalidAmount
        );
        assert_eq!(
            Note::new(
                Field::from(1u64),
                0,
                AssetId::Native,
                Field::from(2u64),
                Field::from(3u64)
            )
            .unwrap_err(),
            PrivacyError::InvalidAmount
        );
    }

    #[test]
    fn test_nullifier_depends_only_on_secret_and_rho() {
        let secret = Field::from(11u64);
        let rho = Field::from(13u64);
        let token = AssetId::Token(Mint([4u8; 32]));

        let a = Note::new(secret, 10, AssetId::Native, Field::from(1u64), rho).unwrap();
        let b = Note::new(secret, 99, token, Field::from(2u64), rho).unwrap();

        assert_eq!(a.nullifier(), b.nullifier());
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn test_commitments_collision_free_over_samples() {
        let mut rng = OsRng;
        let mut seen = HashSet::new();
        for i in 1..=500u64 {
            let note = Note::random(i % 7 + 1, AssetId::Native, &mut rng).unwrap();
            assert!(seen.insert(note.commitment()), "commitment collision");
        }
    }

    #[test]
    fn test_fresh_randomness_per_note() {
        let mut rng = OsRng;
        let a = Note::random(5, AssetId::Native, &mut rng).unwrap();
        let b = Note::random(5, AssetId::Native, &mut rng).unwrap();
        assert_ne!(a.blinding(), b.blinding());
        assert_ne!(a.rho(), b.rho());
        assert_ne!(a.nullifier(), b.nullifier());
    }

    #[test]
    fn test_note_value_checked_ops() {
        let v1 = NoteValue::new(100);
        let v2 = NoteValue::new(50);

        assert_eq!(v1.checked_add(v2), Some(NoteValue::new(150)));
        assert_eq!(v1.checked_sub(v2), Some(NoteValue::new(50)));
        assert_eq!(v2.checked_sub(v1), None); // Underflow
        assert_eq!(NoteValue::MAX.checked_add(NoteValue::new(1)), None); // Overflow
        assert_eq!(
            NoteValue::checked_sum([v1, v2, v2]),
            Some(NoteValue::new(200))
        );
    }

    #[test]
    fn test_amount_from_field_bytes() {
        let bytes = field_to_bytes(&Field::from(42u64));
        assert_eq!(NoteValue::from_field_bytes(&bytes), Ok(NoteValue::new(42)));

        let zero = field_to_bytes(&Field::from(0u64));
        assert_eq!(
            NoteValue::from_field_bytes(&zero),
            Err(PrivacyError::InvalidAmount)
        );

        let wide = field_to_bytes(&Field::from(u128::from(u64::MAX) + 1));
        assert_eq!(
            NoteValue::from_field_bytes(&wide),
            Err(PrivacyError::InvalidAmount)
        );

        assert_eq!(
            NoteValue::from_field_bytes(&[0xffu8; 32]),
            Err(PrivacyError::InvalidAmount)
        );
    }
}
