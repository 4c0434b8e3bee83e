//! In-process backend for development and tests.
//!
//! Values are sealed with AES-256-GCM under a key only the backend holds, the
//! same way a coprocessor keeps its evaluation key to itself. Comparison and
//! selection open their operands internally and re-seal the result under a
//! fresh nonce, so outputs are unlinkable to inputs. This is not homomorphic
//! encryption; it honours the same interface and the same grant-gated
//! decryption, which is all the auction core relies on.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use sha2::Sha256;
use tracing::trace;

use auction_types::ciphertext::{NONCE_LEN, TAG_LEN};
use auction_types::{Address, Ciphertext, EncryptedInput, InputProof, Plaintext, ValueKind};

use crate::backend::{AccessPolicy, HomomorphicComparator, UserDecryptor};
use crate::error::FheError;
use crate::proof::{InputProofIssuer, ProofContext, ProofVerifier};

const AAD_DOMAIN: &[u8] = b"AUCTION_MOCK_FHE_V1";

/// Number of operations evaluated, by type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub gt: u64,
    pub select: u64,
    pub trivial_encrypt: u64,
}

/// Reference backend holding the sealing key and proof key.
pub struct MockFheBackend {
    cipher: Aes256Gcm,
    proof_key: [u8; 32],
    rng: StdRng,
    ops: OpCounts,
}

impl MockFheBackend {
    /// Deterministically derive all keys from a seed.
    pub fn new(seed: [u8; 32]) -> Result<Self, FheError> {
        let hk = Hkdf::<Sha256>::new(Some(AAD_DOMAIN), &seed);

        let mut sealing_key = [0u8; 32];
        hk.expand(b"sealing-key", &mut sealing_key)
            .map_err(|_| FheError::KeyDerivationFailed)?;

        let mut proof_key = [0u8; 32];
        hk.expand(b"proof-key", &mut proof_key)
            .map_err(|_| FheError::KeyDerivationFailed)?;

        let mut nonce_seed = [0u8; 32];
        hk.expand(b"nonce-seed", &mut nonce_seed)
            .map_err(|_| FheError::KeyDerivationFailed)?;

        let cipher = Aes256Gcm::new_from_slice(&sealing_key)
            .map_err(|e| FheError::EncryptionFailed(format!("Failed to create cipher: {}", e)))?;

        Ok(Self {
            cipher,
            proof_key,
            rng: StdRng::from_seed(nonce_seed),
            ops: OpCounts::default(),
        })
    }

    /// Create a backend with a random seed.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, FheError> {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::new(seed)
    }

    /// Verifier sharing this backend's proof key.
    pub fn verifier(&self) -> ProofVerifier {
        ProofVerifier::new(self.proof_key)
    }

    /// Issuer sharing this backend's proof key.
    pub fn issuer(&self) -> InputProofIssuer {
        InputProofIssuer::new(self.proof_key)
    }

    /// Client-side encryption: seal `value` and issue a proof bound to `ctx`.
    pub fn encrypt_input(
        &mut self,
        value: Plaintext,
        ctx: &ProofContext,
    ) -> Result<(EncryptedInput, InputProof), FheError> {
        let sealed = self.seal(value)?;
        let input = EncryptedInput {
            kind: sealed.kind(),
            envelope: sealed.envelope().to_vec(),
        };
        let proof = self.issuer().issue(&input, ctx)?;
        Ok((input, proof))
    }

    pub fn op_counts(&self) -> OpCounts {
        self.ops
    }

    fn seal(&mut self, value: Plaintext) -> Result<Ciphertext, FheError> {
        let kind = value.kind();
        let body = value.to_bytes();

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill_bytes(&mut nonce_bytes);
        let aad = aad_for(kind);

        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &body,
                    aad: &aad,
                },
            )
            .map_err(|e| FheError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e)))?;

        let mut envelope = Vec::with_capacity(kind.sealed_len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&sealed);

        Ok(Ciphertext::from_envelope(kind, envelope))
    }

    fn open(&self, ciphertext: &Ciphertext) -> Result<Plaintext, FheError> {
        let kind = ciphertext.kind();
        let envelope = ciphertext.envelope();
        if envelope.len() != kind.sealed_len() {
            return Err(FheError::MalformedInput(format!(
                "{:?} envelope must be {} bytes",
                kind,
                kind.sealed_len()
            )));
        }

        let (nonce, sealed) = envelope.split_at(NONCE_LEN);
        debug_assert_eq!(sealed.len(), kind.plaintext_len() + TAG_LEN);
        let aad = aad_for(kind);

        let body = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad: &aad })
            .map_err(|_| FheError::DecryptionFailed)?;

        Plaintext::from_bytes(kind, &body).ok_or(FheError::DecryptionFailed)
    }
}

impl HomomorphicComparator for MockFheBackend {
    fn gt(&mut self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError> {
        if !a.kind().is_integer() {
            return Err(FheError::KindMismatch {
                expected: ValueKind::Uint64,
                got: a.kind(),
            });
        }
        if a.kind() != b.kind() {
            return Err(FheError::KindMismatch {
                expected: a.kind(),
                got: b.kind(),
            });
        }

        let lhs = self.open(a)?.as_u64().ok_or(FheError::DecryptionFailed)?;
        let rhs = self.open(b)?.as_u64().ok_or(FheError::DecryptionFailed)?;

        self.ops.gt += 1;
        trace!(a = %a.id(), b = %b.id(), "gt");
        self.seal(Plaintext::Bool(lhs > rhs))
    }

    fn select(
        &mut self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, FheError> {
        if cond.kind() != ValueKind::Bool {
            return Err(FheError::KindMismatch {
                expected: ValueKind::Bool,
                got: cond.kind(),
            });
        }
        if if_true.kind() != if_false.kind() {
            return Err(FheError::KindMismatch {
                expected: if_true.kind(),
                got: if_false.kind(),
            });
        }

        // Open both branches so either choice costs the same.
        let t = self.open(if_true)?;
        let f = self.open(if_false)?;
        let chosen = match self.open(cond)? {
            Plaintext::Bool(c) => {
                if c {
                    t
                } else {
                    f
                }
            }
            _ => return Err(FheError::DecryptionFailed),
        };

        self.ops.select += 1;
        self.seal(chosen)
    }

    fn trivial_encrypt(&mut self, value: Plaintext) -> Result<Ciphertext, FheError> {
        self.ops.trivial_encrypt += 1;
        self.seal(value)
    }
}

impl UserDecryptor for MockFheBackend {
    fn user_decrypt(
        &self,
        ciphertext: &Ciphertext,
        requester: &Address,
        policy: &dyn AccessPolicy,
    ) -> Result<Plaintext, FheError> {
        if !policy.is_allowed(&ciphertext.id(), requester) {
            return Err(FheError::AccessDenied);
        }
        self.open(ciphertext)
    }
}

fn aad_for(kind: ValueKind) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_DOMAIN.len() + 1);
    aad.extend_from_slice(AAD_DOMAIN);
    aad.push(kind.tag());
    aad
}
