//! Ciphertext wire types shared between the auction module and encryption backends.
//!
//! Every sealed value uses the same envelope: `nonce (12) || body || tag (16)`,
//! where the body length is fixed by the [`ValueKind`]. Fixed lengths mean a
//! ciphertext never leaks more than its kind.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};

use crate::Address;

/// Envelope nonce length.
pub const NONCE_LEN: usize = 12;

/// Envelope authentication tag length.
pub const TAG_LEN: usize = 16;

/// Plaintext type carried by a ciphertext.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum ValueKind {
    Bool,
    Uint32,
    Uint64,
    Address,
}

impl ValueKind {
    /// Length of the encoded plaintext body.
    pub const fn plaintext_len(self) -> usize {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Uint32 => 4,
            ValueKind::Uint64 => 8,
            ValueKind::Address => 32,
        }
    }

    /// Total length of a sealed envelope of this kind.
    pub const fn sealed_len(self) -> usize {
        NONCE_LEN + self.plaintext_len() + TAG_LEN
    }

    /// Domain tag mixed into ids, proofs and AEAD associated data.
    pub const fn tag(self) -> u8 {
        match self {
            ValueKind::Bool => 0x01,
            ValueKind::Uint32 => 0x02,
            ValueKind::Uint64 => 0x03,
            ValueKind::Address => 0x04,
        }
    }

    /// Whether values of this kind are ordered integers.
    pub const fn is_integer(self) -> bool {
        matches!(self, ValueKind::Uint32 | ValueKind::Uint64)
    }
}

/// A decrypted value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Plaintext {
    Bool(bool),
    Uint32(u32),
    Uint64(u64),
    Address(Address),
}

impl Plaintext {
    pub fn kind(&self) -> ValueKind {
        match self {
            Plaintext::Bool(_) => ValueKind::Bool,
            Plaintext::Uint32(_) => ValueKind::Uint32,
            Plaintext::Uint64(_) => ValueKind::Uint64,
            Plaintext::Address(_) => ValueKind::Address,
        }
    }

    /// Fixed-width little-endian encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Plaintext::Bool(b) => vec![u8::from(*b)],
            Plaintext::Uint32(v) => v.to_le_bytes().to_vec(),
            Plaintext::Uint64(v) => v.to_le_bytes().to_vec(),
            Plaintext::Address(a) => a.to_vec(),
        }
    }

    /// Decode a body produced by [`Plaintext::to_bytes`].
    pub fn from_bytes(kind: ValueKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != kind.plaintext_len() {
            return None;
        }
        match kind {
            ValueKind::Bool => match bytes[0] {
                0 => Some(Plaintext::Bool(false)),
                1 => Some(Plaintext::Bool(true)),
                _ => None,
            },
            ValueKind::Uint32 => Some(Plaintext::Uint32(u32::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::Uint64 => Some(Plaintext::Uint64(u64::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::Address => Some(Plaintext::Address(bytes.try_into().ok()?)),
        }
    }

    /// Integer value widened to u64, if this is an integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Plaintext::Uint32(v) => Some(u64::from(*v)),
            Plaintext::Uint64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Backend-assigned ciphertext identifier (SHA-256 over kind and envelope).
#[serde_as]
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct CiphertextId(#[serde_as(as = "Hex")] pub [u8; 32]);

impl CiphertextId {
    pub fn compute(kind: ValueKind, envelope: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"CIPHERTEXT_ID_V1:");
        hasher.update([kind.tag()]);
        hasher.update(envelope);
        Self(hasher.finalize().into())
    }
}

impl fmt::Debug for CiphertextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextId({})", self)
    }
}

impl fmt::Display for CiphertextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// An opaque encrypted value held by the auction.
///
/// Immutable once built; the id is derived from the envelope so two handles
/// with the same id are the same ciphertext.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Ciphertext {
    id: CiphertextId,
    kind: ValueKind,
    #[serde_as(as = "Hex")]
    envelope: Vec<u8>,
}

impl Ciphertext {
    /// Wrap a sealed envelope. Only encryption backends and proof
    /// verification should call this.
    pub fn from_envelope(kind: ValueKind, envelope: Vec<u8>) -> Self {
        Self {
            id: CiphertextId::compute(kind, &envelope),
            kind,
            envelope,
        }
    }

    pub fn id(&self) -> CiphertextId {
        self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn envelope(&self) -> &[u8] {
        &self.envelope
    }
}

/// Client-submitted encrypted input, not yet trusted.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub kind: ValueKind,
    #[serde_as(as = "Hex")]
    pub envelope: Vec<u8>,
}

/// Proof that an [`EncryptedInput`] was produced for a given (contract, user) pair.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InputProof(#[serde_as(as = "Hex")] pub Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_encoding() {
        let values = [
            Plaintext::Bool(true),
            Plaintext::Uint32(7),
            Plaintext::Uint64(u64::MAX),
            Plaintext::Address([9u8; 32]),
        ];
        for value in values {
            let bytes = value.to_bytes();
            assert_eq!(bytes.len(), value.kind().plaintext_len());
            assert_eq!(Plaintext::from_bytes(value.kind(), &bytes), Some(value));
        }
    }

    #[test]
    fn test_plaintext_rejects_bad_bool() {
        assert_eq!(Plaintext::from_bytes(ValueKind::Bool, &[2]), None);
        assert_eq!(Plaintext::from_bytes(ValueKind::Uint64, &[0u8; 4]), None);
    }

    #[test]
    fn test_ciphertext_id_binds_kind() {
        let envelope = vec![5u8; ValueKind::Uint64.sealed_len()];
        let a = CiphertextId::compute(ValueKind::Uint64, &envelope);
        let b = CiphertextId::compute(ValueKind::Address, &envelope);
        assert_ne!(a, b);

        let ct = Ciphertext::from_envelope(ValueKind::Uint64, envelope);
        assert_eq!(ct.id(), a);
    }

    #[test]
    fn test_ciphertext_json_is_hex() {
        let ct = Ciphertext::from_envelope(ValueKind::Bool, vec![0xab; ValueKind::Bool.sealed_len()]);
        let json = serde_json::to_string(&ct).unwrap();
        assert!(json.contains("abababab"));
        let back: Ciphertext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ct);
    }
}
