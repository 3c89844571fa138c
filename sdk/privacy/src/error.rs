//! Error definitions for the shielded primitives.
//!
//! Every variant here is a local validation failure: it is raised before any
//! proof is requested and must be surfaced to the caller as-is.
use thiserror::Error;

/// Errors raised by key derivation, note construction, the commitment tree,
/// statement checks and note encryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    /// Amount is zero or does not fit below the field modulus
    #[error("Invalid amount: must be non-zero and below the field modulus")]
    InvalidAmount,

    /// The commitment tree has no free leaves left
    #[error("Commitment tree is full ({capacity} leaves)")]
    TreeFull { capacity: u64 },

    /// Leaf index outside the populated part of the tree
    #[error("Unknown leaf index {index} (tree size {size})")]
    UnknownLeaf { index: u64, size: u64 },

    /// Seed for the key hierarchy has the wrong length
    #[error("Invalid seed length: expected 32 bytes, got {0}")]
    InvalidSeedLength(usize),

    /// Shielded address failed to parse
    #[error("Invalid shielded address: {0}")]
    InvalidAddress(String),

    /// Field element encoding is not canonical
    #[error("Non-canonical field element encoding")]
    NonCanonicalField,

    /// Sum of inputs differs from sum of outputs
    #[error("Conservation violated: inputs {inputs}, outputs {outputs}")]
    ConservationViolated { inputs: u128, outputs: u128 },

    /// Notes of different assets were mixed in one statement
    #[error("Token mismatch between notes of one statement")]
    TokenMismatch,

    /// A Merkle path does not lead to the claimed root
    #[error("Merkle inclusion failed for input {0}")]
    InclusionFailed(usize),

    /// Nullifier does not match H(secret, rho)
    #[error("Nullifier mismatch for input {0}")]
    NullifierMismatch(usize),

    /// Commitment does not match the committed values
    #[error("Commitment mismatch for output {0}")]
    CommitmentMismatch(usize),

    /// Statement has more inputs than the circuit accepts
    #[error("Too many inputs: circuit accepts at most {max}, got {got}")]
    ArityExceeded { max: usize, got: usize },

    /// The same note appears twice among the inputs
    #[error("Input {0} spends a note already spent by an earlier input")]
    DuplicateInput(usize),

    /// Statement has no inputs
    #[error("Statement requires at least one input")]
    EmptyInputs,

    /// Note value arithmetic overflowed
    #[error("Note value overflow")]
    AmountOverflow,

    /// Merkle path shape does not match the tree height
    #[error("Malformed Merkle proof: {0}")]
    MalformedProof(&'static str),

    /// Note encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Key derivation failed
    #[error("Key derivation error: {0}")]
    Kdf(String),
}

/// Result type for the shielded primitives
pub type Result<T> = std::result::Result<T, PrivacyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PrivacyError::TreeFull { capacity: 16 };
        assert_eq!(err.to_string(), "Commitment tree is full (16 leaves)");

        let err = PrivacyError::ConservationViolated {
            inputs: 100,
            outputs: 101,
        };
        assert_eq!(
            err.to_string(),
            "Conservation violated: inputs 100, outputs 101"
        );

        let err = PrivacyError::InvalidSeedLength(31);
        assert_eq!(
            err.to_string(),
            "Invalid seed length: expected 32 bytes, got 31"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(PrivacyError::InvalidAmount, PrivacyError::InvalidAmount);
        assert_ne!(
            PrivacyError::InclusionFailed(0),
            PrivacyError::InclusionFailed(1)
        );
    }
}
