//! Note Encryption
//!
//! Delivers note plaintext to the recipient using ECDH + ChaCha20-Poly1305.
//!
//! ```text
//! Flow:
//! 1. Sender generates ephemeral secp256k1 keypair (esk, epk)
//! 2. Shared secret = ECDH(esk, recipient_pk)
//! 3. Encryption key = HKDF-SHA256(shared, salt = epk, info = "shade-note-v1")
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, plaintext, aad = epk)
//! 5. Wire = epk (33) ‖ nonce (12) ‖ ciphertext
//! ```
//!
//! Plaintext layout (little-endian):
//!
//! ```text
//! amount u64 (8) ‖ token_id (32) ‖ secret (32) ‖ blinding (32) ‖ rho (32)
//!   ‖ commitment (32) ‖ asset tag (1) ‖ [mint (32) when tag = 1]
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secp256k1::{PublicKey, Secp256k1, SecretKey, ecdh::SharedSecret};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::asset::{AssetId, TOKEN_TAG};
use crate::error::{PrivacyError, Result};
use crate::hash::{field_from_bytes, field_to_bytes};
use crate::keys::ShieldedAddress;
use crate::note::Note;

/// Compressed secp256k1 point
pub const EPHEMERAL_PK_LEN: usize = 33;
/// ChaCha20-Poly1305 nonce
pub const NONCE_LEN: usize = 12;
/// Poly1305 authentication tag
pub const TAG_LEN: usize = 16;
/// Plaintext of a native-asset note
pub const NATIVE_PLAINTEXT_LEN: usize = 8 + 32 * 5 + 1;
/// Plaintext of a token note (native layout plus the mint)
pub const TOKEN_PLAINTEXT_LEN: usize = NATIVE_PLAINTEXT_LEN + 32;

const NOTE_KDF_INFO: &[u8] = b"shade-note-v1";

/// An encrypted note (published next to its commitment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedNotePayload {
    /// Ephemeral public key for ECDH (compressed)
    pub ephemeral_pk: Vec<u8>,
    /// Nonce for ChaCha20-Poly1305
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted note data with authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedNotePayload {
    /// Fixed overhead on top of the plaintext
    pub const OVERHEAD: usize = EPHEMERAL_PK_LEN + NONCE_LEN + TAG_LEN;

    /// Serialize as `epk ‖ nonce ‖ ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(self.ephemeral_pk.len() + NONCE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.ephemeral_pk);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse the wire layout. Only lengths are checked here; the point and
    /// the tag are checked on decryption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::OVERHEAD {
            return Err(PrivacyError::Encryption(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }
        let (epk, rest) = bytes.split_at(EPHEMERAL_PK_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);

        Ok(Self {
            ephemeral_pk: epk.to_vec(),
            nonce: nonce_arr,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Size on the wire
    pub fn len(&self) -> usize {
        self.ephemeral_pk.len() + NONCE_LEN + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encrypt a note for a shielded address using the OS generator
pub fn encrypt_for(recipient: &ShieldedAddress, note: &Note) -> Result<EncryptedNotePayload> {
    encrypt_with_rng(recipient.public_key(), note, &mut OsRng)
}

/// Encrypt a note for a recipient public key
pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    recipient_pk: &PublicKey,
    note: &Note,
    rng: &mut R,
) -> Result<EncryptedNotePayload> {
    seal(recipient_pk, &encode_plaintext(note), rng)
}

/// Decrypt a payload with the recipient's ECDH secret.
///
/// Returns `None` when the payload was not meant for this key or does not
/// describe a consistent note.
pub fn decrypt_with(recipient_sk: &SecretKey, payload: &EncryptedNotePayload) -> Option<Note> {
    let epk = PublicKey::from_slice(&payload.ephemeral_pk).ok()?;
    let key = derive_note_key(&SharedSecret::new(&epk, recipient_sk), &payload.ephemeral_pk)
        .ok()?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key).ok()?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&payload.nonce),
            Payload {
                msg: &payload.ciphertext,
                aad: &payload.ephemeral_pk,
            },
        )
        .ok()?;

    decode_plaintext(&plaintext)
}

/// Encrypt raw plaintext bytes
fn seal<R: RngCore + CryptoRng>(
    recipient_pk: &PublicKey,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<EncryptedNotePayload> {
    let ephemeral_sk = random_secret_key(rng)?;
    let ephemeral_pk = PublicKey::from_secret_key(&Secp256k1::signing_only(), &ephemeral_sk)
        .serialize();

    let key = derive_note_key(&SharedSecret::new(recipient_pk, &ephemeral_sk), &ephemeral_pk)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| PrivacyError::Encryption(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &ephemeral_pk,
            },
        )
        .map_err(|e| PrivacyError::Encryption(e.to_string()))?;

    Ok(EncryptedNotePayload {
        ephemeral_pk: ephemeral_pk.to_vec(),
        nonce,
        ciphertext,
    })
}

fn random_secret_key<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SecretKey> {
    // A uniform 32-byte string is out of range with probability ~2^-128
    for _ in 0..8 {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(sk) = SecretKey::from_slice(&bytes) {
            return Ok(sk);
        }
    }
    Err(PrivacyError::Encryption("rng produced no valid scalar".into()))
}

/// Derive encryption key from shared secret
fn derive_note_key(shared: &SharedSecret, ephemeral_pk: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_pk), &shared.secret_bytes());
    let mut key = [0u8; 32];
    hk.expand(NOTE_KDF_INFO, &mut key)
        .map_err(|e| PrivacyError::Kdf(e.to_string()))?;
    Ok(key)
}

fn encode_plaintext(note: &Note) -> Vec<u8> {
    let asset = note.asset();
    let mut bytes = Vec::with_capacity(TOKEN_PLAINTEXT_LEN);

    bytes.extend_from_slice(&note.amount().as_u64().to_le_bytes());
    bytes.extend_from_slice(&field_to_bytes(&asset.token_id()));
    bytes.extend_from_slice(&field_to_bytes(&note.secret()));
    bytes.extend_from_slice(&field_to_bytes(&note.blinding()));
    bytes.extend_from_slice(&field_to_bytes(&note.rho()));
    bytes.extend_from_slice(note.commitment().as_bytes());
    bytes.push(asset.tag());
    if let AssetId::Token(mint) = asset {
        bytes.extend_from_slice(&mint.0);
    }
    bytes
}

fn decode_plaintext(bytes: &[u8]) -> Option<Note> {
    if bytes.len() != NATIVE_PLAINTEXT_LEN && bytes.len() != TOKEN_PLAINTEXT_LEN {
        return None;
    }

    let amount = u64::from_le_bytes(bytes[0..8].try_into().ok()?);
    let word = |i: usize| -> Option<[u8; 32]> {
        let start = 8 + 32 * i;
        bytes[start..start + 32].try_into().ok()
    };
    let token_id = field_from_bytes(&word(0)?).ok()?;
    let secret = field_from_bytes(&word(1)?).ok()?;
    let blinding = field_from_bytes(&word(2)?).ok()?;
    let rho = field_from_bytes(&word(3)?).ok()?;
    let commitment = word(4)?;

    let tag = bytes[NATIVE_PLAINTEXT_LEN - 1];
    let mint = match (tag, bytes.len()) {
        (TOKEN_TAG, TOKEN_PLAINTEXT_LEN) => Some(bytes[NATIVE_PLAINTEXT_LEN..].try_into().ok()?),
        (_, NATIVE_PLAINTEXT_LEN) => None,
        _ => return None,
    };
    let asset = AssetId::from_wire(tag, mint)?;

    if asset.token_id() != token_id {
        return None;
    }
    let note = Note::new(secret, amount, asset, blinding, rho).ok()?;
    if note.commitment().0 != commitment {
        return None;
    }
    Some(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Mint;
    use crate::keys::KeyHierarchy;

    fn recipient() -> KeyHierarchy {
        KeyHierarchy::random(&mut OsRng).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_native_note() {
        let bob = recipient();
        let note = Note::from_secrets(1000, AssetId::Native).unwrap();

        let encrypted = encrypt_for(&bob.address(), &note).unwrap();
        assert_eq!(
            encrypted.len(),
            EncryptedNotePayload::OVERHEAD + NATIVE_PLAINTEXT_LEN
        );

        let decrypted =
            decrypt_with(bob.ecdh().secret(), &encrypted).expect("decryption should succeed");
        assert_eq!(decrypted, note);
    }

    #[test]
    fn test_encrypt_decrypt_token_note() {
        let bob = recipient();
        let note = Note::from_secrets(7, AssetId::Token(Mint([8u8; 32]))).unwrap();

        let encrypted = encrypt_for(&bob.address(), &note).unwrap();
        assert_eq!(
            encrypted.len(),
            EncryptedNotePayload::OVERHEAD + TOKEN_PLAINTEXT_LEN
        );

        let decrypted = decrypt_with(bob.ecdh().secret(), &encrypted).unwrap();
        assert_eq!(decrypted.asset(), note.asset());
        assert_eq!(decrypted.commitment(), note.commitment());
    }

    #[test]
    fn test_wrong_key_fails() {
        let bob = recipient();
        let eve = recipient();
        let note = Note::from_secrets(1000, AssetId::Native).unwrap();

        let encrypted = encrypt_for(&bob.address(), &note).unwrap();
        assert!(
            decrypt_with(eve.ecdh().secret(), &encrypted).is_none(),
            "wrong key should fail decryption"
        );
    }

    #[test]
    fn test_fresh_ephemeral_key_and_nonce() {
        let bob = recipient();
        let note = Note::from_secrets(3, AssetId::Native).unwrap();

        let a = encrypt_for(&bob.address(), &note).unwrap();
        let b = encrypt_for(&bob.address(), &note).unwrap();
        assert_ne!(a.ephemeral_pk, b.ephemeral_pk);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_tampering_detected() {
        let bob = recipient();
        let note = Note::from_secrets(50, AssetId::Native).unwrap();
        let encrypted = encrypt_for(&bob.address(), &note).unwrap();

        let mut flipped = encrypted.clone();
        flipped.ciphertext[0] ^= 1;
        assert!(decrypt_with(bob.ecdh().secret(), &flipped).is_none());

        let mut nonce = encrypted.clone();
        nonce.nonce[0] ^= 1;
        assert!(decrypt_with(bob.ecdh().secret(), &nonce).is_none());

        // swapping the ephemeral key breaks the AAD binding
        let other = encrypt_for(&bob.address(), &note).unwrap();
        let mut swapped = encrypted.clone();
        swapped.ephemeral_pk = other.ephemeral_pk;
        assert!(decrypt_with(bob.ecdh().secret(), &swapped).is_none());

        let mut bad_point = encrypted;
        bad_point.ephemeral_pk = vec![0x05; EPHEMERAL_PK_LEN];
        assert!(decrypt_with(bob.ecdh().secret(), &bad_point).is_none());
    }

    #[test]
    fn test_wire_roundtrip_and_truncation() {
        let bob = recipient();
        let note = Note::from_secrets(12, AssetId::Native).unwrap();
        let encrypted = encrypt_for(&bob.address(), &note).unwrap();

        let bytes = encrypted.to_bytes();
        assert_eq!(&bytes[..EPHEMERAL_PK_LEN], encrypted.ephemeral_pk.as_slice());
        let parsed = EncryptedNotePayload::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, encrypted);
        assert_eq!(decrypt_with(bob.ecdh().secret(), &parsed), Some(note));

        assert!(EncryptedNotePayload::from_bytes(&bytes[..EncryptedNotePayload::OVERHEAD - 1]).is_err());

        let truncated = EncryptedNotePayload::from_bytes(&bytes[..bytes.len() - 1]).unwrap();
        assert!(decrypt_with(bob.ecdh().secret(), &truncated).is_none());
    }

    #[test]
    fn test_commitment_mismatch_rejected() {
        let bob = recipient();
        let note = Note::from_secrets(9, AssetId::Native).unwrap();

        let mut plaintext = encode_plaintext(&note);
        plaintext[8 + 32 * 4] ^= 1;
        let sealed = seal(bob.ecdh().public(), &plaintext, &mut OsRng).unwrap();
        assert!(decrypt_with(bob.ecdh().secret(), &sealed).is_none());
    }

    #[test]
    fn test_token_id_mismatch_rejected() {
        let bob = recipient();
        let note = Note::from_secrets(9, AssetId::Token(Mint([1u8; 32]))).unwrap();

        // claims a different mint than the token id and commitment were built for
        let mut plaintext = encode_plaintext(&note);
        let last = plaintext.len() - 1;
        plaintext[last] ^= 1;
        let sealed = seal(bob.ecdh().public(), &plaintext, &mut OsRng).unwrap();
        assert!(decrypt_with(bob.ecdh().secret(), &sealed).is_none());
    }

    #[test]
    fn test_zero_amount_plaintext_rejected() {
        let bob = recipient();
        let note = Note::from_secrets(9, AssetId::Native).unwrap();

        let mut plaintext = encode_plaintext(&note);
        plaintext[..8].copy_from_slice(&0u64.to_le_bytes());
        let sealed = seal(bob.ecdh().public(), &plaintext, &mut OsRng).unwrap();
        assert!(decrypt_with(bob.ecdh().secret(), &sealed).is_none());
    }
}
