//! Key Hierarchy
//!
//! All wallet key material is derived from one 32-byte seed:
//!
//! ```text
//! seed ──HKDF-SHA256──┬── "shade/spend"     → SpendKey
//!                     ├── "shade/view"      → ViewKey
//!                     ├── "shade/nullifier" → NullifierKey
//!                     └── "shade/ecdh"      → secp256k1 keypair
//!                                               └── ShieldedAddress = "shade1" ‖ hex(compressed pk)
//! ```
//!
//! Labels are disjoint, so learning one derived key reveals neither the
//! seed nor any sibling key.

use std::fmt;
use std::str::FromStr;

use ark_ff::PrimeField;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha256;

use crate::asset::AssetId;
use crate::error::{PrivacyError, Result};
use crate::hash::{Field, domain_tag, hash_fields};
use crate::note::Note;

/// Length of the wallet seed in bytes
pub const SEED_LEN: usize = 32;
/// Human-readable prefix of shielded addresses
pub const ADDRESS_PREFIX: &str = "shade1";

const KDF_SALT: &[u8] = b"shade-key-hierarchy-v1";
const SPEND_LABEL: &[u8] = b"shade/spend";
const VIEW_LABEL: &[u8] = b"shade/view";
const NULLIFIER_LABEL: &[u8] = b"shade/nullifier";
const ECDH_LABEL: &[u8] = b"shade/ecdh";
const NOTE_SECRET_DOMAIN: &[u8] = b"shade/note-secret";

macro_rules! field_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Field);

        impl $name {
            /// The key as a field element
            pub fn to_field(&self) -> Field {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"[REDACTED]").finish()
            }
        }
    };
}

field_key!(
    /// Spend authority. Loss = loss of funds, compromise = theft of funds.
    SpendKey
);
field_key!(
    /// Read-only key for auditors and watch-only wallets
    ViewKey
);
field_key!(
    /// Key bound into self-owned note secrets
    NullifierKey
);

/// Recipient-side ECDH keypair for the note channel
#[derive(Clone)]
pub struct EcdhKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl EcdhKeypair {
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }
}

impl fmt::Debug for EcdhKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdhKeypair")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(self.public.serialize()))
            .finish()
    }
}

/// Shareable address: the compressed ECDH public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShieldedAddress(PublicKey);

impl ShieldedAddress {
    pub fn new(public: PublicKey) -> Self {
        Self(public)
    }

    /// Public key notes for this address are encrypted to
    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    /// Parse `shade1<66 hex chars>`
    pub fn parse(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| PrivacyError::InvalidAddress("missing prefix".into()))?;
        let bytes = hex::decode(body)
            .map_err(|e| PrivacyError::InvalidAddress(format!("bad hex: {e}")))?;
        if bytes.len() != 33 {
            return Err(PrivacyError::InvalidAddress(format!(
                "expected 33 key bytes, got {}",
                bytes.len()
            )));
        }
        let public = PublicKey::from_slice(&bytes)
            .map_err(|e| PrivacyError::InvalidAddress(format!("bad point: {e}")))?;
        Ok(Self(public))
    }
}

impl fmt::Display for ShieldedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_PREFIX}{}", hex::encode(self.0.serialize()))
    }
}

impl fmt::Debug for ShieldedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShieldedAddress({self})")
    }
}

impl FromStr for ShieldedAddress {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Full key hierarchy of one wallet
#[derive(Clone, Debug)]
pub struct KeyHierarchy {
    spend_key: SpendKey,
    view_key: ViewKey,
    nullifier_key: NullifierKey,
    ecdh: EcdhKeypair,
    address: ShieldedAddress,
}

impl KeyHierarchy {
    /// Derive every key from a 32-byte seed
    pub fn derive(seed: &[u8]) -> Result<Self> {
        if seed.len() != SEED_LEN {
            return Err(PrivacyError::InvalidSeedLength(seed.len()));
        }
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), seed);

        let spend_key = SpendKey(expand_field(&hk, SPEND_LABEL)?);
        let view_key = ViewKey(expand_field(&hk, VIEW_LABEL)?);
        let nullifier_key = NullifierKey(expand_field(&hk, NULLIFIER_LABEL)?);
        let ecdh = expand_ecdh(&hk)?;
        let address = ShieldedAddress(ecdh.public);

        Ok(Self {
            spend_key,
            view_key,
            nullifier_key,
            ecdh,
            address,
        })
    }

    /// Derive from a freshly generated random seed
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut seed = [0u8; SEED_LEN];
        rng.fill_bytes(&mut seed);
        Self::derive(&seed)
    }

    pub fn spend_key(&self) -> &SpendKey {
        &self.spend_key
    }

    pub fn view_key(&self) -> &ViewKey {
        &self.view_key
    }

    pub fn nullifier_key(&self) -> &NullifierKey {
        &self.nullifier_key
    }

    pub fn ecdh(&self) -> &EcdhKeypair {
        &self.ecdh
    }

    pub fn address(&self) -> ShieldedAddress {
        self.address
    }

    /// Deterministic secret for a self-owned note with the given rho.
    ///
    /// secret = Poseidon(NOTE_SECRET_DOMAIN, spend_key, nullifier_key, rho)
    pub fn note_secret(&self, rho: Field) -> Field {
        hash_fields(&[
            domain_tag(NOTE_SECRET_DOMAIN),
            self.spend_key.0,
            self.nullifier_key.0,
            rho,
        ])
    }

    /// New note owned by this wallet, with fresh blinding and rho
    pub fn new_owned_note<R: RngCore + CryptoRng>(
        &self,
        amount: u64,
        asset: AssetId,
        rng: &mut R,
    ) -> Result<Note> {
        let rho = crate::hash::random_field(rng);
        let blinding = crate::hash::random_field(rng);
        Note::new(self.note_secret(rho), amount, asset, blinding, rho)
    }
}

fn expand_field(hk: &Hkdf<Sha256>, label: &[u8]) -> Result<Field> {
    // 64 bytes keep the reduction bias negligible
    let mut okm = [0u8; 64];
    hk.expand(label, &mut okm)
        .map_err(|e| PrivacyError::Kdf(e.to_string()))?;
    Ok(Field::from_le_bytes_mod_order(&okm))
}

fn expand_ecdh(hk: &Hkdf<Sha256>) -> Result<EcdhKeypair> {
    let secp = Secp256k1::signing_only();
    for counter in 0u8..=u8::MAX {
        let mut info = ECDH_LABEL.to_vec();
        if counter > 0 {
            info.push(counter);
        }
        let mut okm = [0u8; 32];
        hk.expand(&info, &mut okm)
            .map_err(|e| PrivacyError::Kdf(e.to_string()))?;
        if let Ok(secret) = SecretKey::from_slice(&okm) {
            let public = PublicKey::from_secret_key(&secp, &secret);
            return Ok(EcdhKeypair { secret, public });
        }
    }
    Err(PrivacyError::Kdf("no valid secp256k1 scalar".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_key_derivation_deterministic() {
        let seed = [7u8; 32];
        let a = KeyHierarchy::derive(&seed).unwrap();
        let b = KeyHierarchy::derive(&seed).unwrap();

        assert_eq!(a.spend_key(), b.spend_key());
        assert_eq!(a.view_key(), b.view_key());
        assert_eq!(a.nullifier_key(), b.nullifier_key());
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_sub_keys_independent() {
        let keys = KeyHierarchy::derive(&[1u8; 32]).unwrap();
        let spend = keys.spend_key().to_field();
        let view = keys.view_key().to_field();
        let nk = keys.nullifier_key().to_field();

        assert_ne!(spend, view);
        assert_ne!(spend, nk);
        assert_ne!(view, nk);
    }

    #[test]
    fn test_different_seeds_different_keys() {
        let a = KeyHierarchy::derive(&[1u8; 32]).unwrap();
        let b = KeyHierarchy::derive(&[2u8; 32]).unwrap();
        assert_ne!(a.address(), b.address());
        assert_ne!(a.spend_key(), b.spend_key());
    }

    #[test]
    fn test_invalid_seed_length() {
        assert_eq!(
            KeyHierarchy::derive(&[0u8; 31]).unwrap_err(),
            PrivacyError::InvalidSeedLength(31)
        );
        assert_eq!(
            KeyHierarchy::derive(&[0u8; 64]).unwrap_err(),
            PrivacyError::InvalidSeedLength(64)
        );
    }

    #[test]
    fn test_address_roundtrip() {
        let keys = KeyHierarchy::random(&mut OsRng).unwrap();
        let text = keys.address().to_string();

        assert!(text.starts_with(ADDRESS_PREFIX));
        assert_eq!(text.len(), ADDRESS_PREFIX.len() + 66);
        assert_eq!(ShieldedAddress::parse(&text).unwrap(), keys.address());
        assert_eq!(text.parse::<ShieldedAddress>().unwrap(), keys.address());
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!(ShieldedAddress::parse("shade1zz").is_err());
        assert!(ShieldedAddress::parse("other1").is_err());
        // right length, not a curve point
        let bogus = format!("{ADDRESS_PREFIX}{}", "05".repeat(33));
        assert!(ShieldedAddress::parse(&bogus).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let keys = KeyHierarchy::derive(&[3u8; 32]).unwrap();
        let dump = format!("{keys:?}");
        assert!(dump.contains("[REDACTED]"));
    }

    #[test]
    fn test_owned_note_secret_recoverable() {
        let keys = KeyHierarchy::derive(&[5u8; 32]).unwrap();
        let note = keys
            .new_owned_note(25, AssetId::Native, &mut OsRng)
            .unwrap();
        assert_eq!(note.secret(), keys.note_secret(note.rho()));
    }
}
