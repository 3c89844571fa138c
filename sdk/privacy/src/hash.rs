//! Poseidon over the BN254 scalar field.
//!
//! One hash instance serves note commitments, nullifiers, asset ids and the
//! internal nodes of the commitment tree. Mixing instances between leaf data
//! and tree internals would break circuit compatibility.
//!
//! ```text
//! Field:    BN254 Fr (254 bits)
//! Rate: 2, Capacity: 1
//! Rounds:   8 full, 57 partial, alpha = 5
//! ```

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInteger, PrimeField};
use ark_std::UniformRand;
use rand::{CryptoRng, RngCore};

use crate::error::{PrivacyError, Result};

/// Scalar field of the proof system
pub type Field = Fr;

static POSEIDON: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Poseidon configuration shared by every hash in the protocol
pub fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    POSEIDON.get_or_init(|| {
        let prime_bits: u64 = 254; // BN254 Fr is a 254-bit prime field
        let rate: usize = 2;
        let capacity: usize = 1;
        let full_rounds: u64 = 8;
        let partial_rounds: u64 = 57;
        let alpha: u64 = 5;
        let skip_matrices: u64 = 0;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            prime_bits,
            rate,
            full_rounds,
            partial_rounds,
            skip_matrices,
        );

        PoseidonConfig::new(
            full_rounds as usize,
            partial_rounds as usize,
            alpha,
            mds,
            ark,
            rate,
            capacity,
        )
    })
}

/// H(inputs): absorb every element in order and squeeze one element
pub fn hash_fields(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Canonical 32-byte little-endian encoding
pub fn field_to_bytes(f: &Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Decode a canonical encoding, rejecting values at or above the modulus
pub fn field_from_bytes(bytes: &[u8; 32]) -> Result<Fr> {
    let f = Fr::from_le_bytes_mod_order(bytes);
    if &field_to_bytes(&f) != bytes {
        return Err(PrivacyError::NonCanonicalField);
    }
    Ok(f)
}

/// Map arbitrary 32 bytes into the field without reduction collisions:
/// the bytes are split into two 128-bit limbs, both below the modulus.
pub fn bytes_to_limbs(bytes: &[u8; 32]) -> (Fr, Fr) {
    let mut lo = [0u8; 16];
    let mut hi = [0u8; 16];
    lo.copy_from_slice(&bytes[..16]);
    hi.copy_from_slice(&bytes[16..]);
    (
        Fr::from(u128::from_le_bytes(lo)),
        Fr::from(u128::from_le_bytes(hi)),
    )
}

/// Uniformly random field element
pub fn random_field<R: RngCore + CryptoRng>(rng: &mut R) -> Fr {
    Fr::rand(rng)
}

/// Field element from an ASCII domain label (at most 31 bytes)
pub fn domain_tag(label: &[u8]) -> Fr {
    let mut arr = [0u8; 32];
    let len = label.len().min(31);
    arr[..len].copy_from_slice(&label[..len]);
    Fr::from_le_bytes_mod_order(&arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_hash_deterministic() {
        let a = Fr::from(7u64);
        let b = Fr::from(11u64);
        assert_eq!(hash_fields(&[a, b]), hash_fields(&[a, b]));
        assert_ne!(hash_fields(&[a, b]), hash_fields(&[b, a]));
    }

    #[test]
    fn test_hash_arity_matters() {
        let a = Fr::from(1u64);
        assert_ne!(
            hash_fields(&[a, a]),
            hash_fields(&[a, a, Fr::from(0u64)]),
            "trailing zero must change the digest"
        );
    }

    #[test]
    fn test_field_bytes_canonical() {
        let f = random_field(&mut OsRng);
        let bytes = field_to_bytes(&f);
        assert_eq!(field_from_bytes(&bytes).unwrap(), f);

        // 0xff..ff is far above the BN254 modulus
        assert_eq!(
            field_from_bytes(&[0xffu8; 32]),
            Err(PrivacyError::NonCanonicalField)
        );
    }

    #[test]
    fn test_limbs_distinguish_high_bytes() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 1;
        b[15] = 1;
        assert_ne!(bytes_to_limbs(&a), bytes_to_limbs(&b));
    }
}
