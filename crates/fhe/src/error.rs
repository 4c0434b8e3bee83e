//! Error types for ciphertext operations.

use auction_types::ValueKind;
use thiserror::Error;

/// Errors that can occur while verifying or operating on ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FheError {
    #[error("Input proof does not attest this ciphertext for the given context")]
    InvalidProof,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Ciphertext kind mismatch: expected {expected:?}, got {got:?}")]
    KindMismatch { expected: ValueKind, got: ValueKind },

    #[error("Decryption not permitted for this requester")]
    AccessDenied,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}
