//! Asset Identity
//!
//! Every note carries exactly one `AssetId`, fixed at creation. The token id
//! used inside commitments, the encryption wire format and the proof
//! statements all come from [`AssetId::token_id`]; there is no other mapping.
//!
//! ```text
//! token_id = Poseidon(ASSET_DOMAIN, tag, mint_lo128, mint_hi128)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::{Field, bytes_to_limbs, domain_tag, hash_fields};

/// Wire tag of the native asset
pub const NATIVE_TAG: u8 = 0;
/// Wire tag of a token asset (followed by its 32-byte mint)
pub const TOKEN_TAG: u8 = 1;

const ASSET_DOMAIN: &[u8] = b"shade/asset";

/// Identifier of the token mint on the ledger
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mint(pub [u8; 32]);

impl fmt::Debug for Mint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mint({})", hex::encode(self.0))
    }
}

/// Closed set of assets the pool can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetId {
    /// The ledger's native currency
    Native,
    /// A token identified by its mint
    Token(Mint),
}

impl AssetId {
    /// Asset-type tag used by the note plaintext
    pub fn tag(&self) -> u8 {
        match self {
            AssetId::Native => NATIVE_TAG,
            AssetId::Token(_) => TOKEN_TAG,
        }
    }

    /// The canonical field element for this asset
    pub fn token_id(&self) -> Field {
        let mint = match self {
            AssetId::Native => [0u8; 32],
            AssetId::Token(mint) => mint.0,
        };
        let (lo, hi) = bytes_to_limbs(&mint);
        hash_fields(&[
            domain_tag(ASSET_DOMAIN),
            Field::from(u64::from(self.tag())),
            lo,
            hi,
        ])
    }

    /// Rebuild from the wire tag and optional mint
    pub fn from_wire(tag: u8, mint: Option<[u8; 32]>) -> Option<Self> {
        match (tag, mint) {
            (NATIVE_TAG, None) => Some(AssetId::Native),
            (TOKEN_TAG, Some(mint)) => Some(AssetId::Token(Mint(mint))),
            _ => None,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(mint) => write!(f, "token:{}", hex::encode(mint.0)),
        }
    }
}
