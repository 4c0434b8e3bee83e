//! Input proofs binding a ciphertext to a (contract, user) pair.
//!
//! A proof is `version (1) || tag (32)` where the tag is an HKDF-SHA256 output
//! keyed by the backend's proof key over a domain-separated transcript of the
//! context and the envelope. The issuer runs on the encryption side (relayer
//! or client SDK); the verifier runs before the auction trusts a handle.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;

use auction_types::{Address, Ciphertext, EncryptedInput, InputProof, ValueKind};

use crate::error::FheError;

/// Current proof format version.
pub const PROOF_VERSION: u8 = 1;

/// Encoded proof length.
pub const PROOF_LEN: usize = 1 + 32;

/// What a proof must be bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofContext {
    /// Identity of the auction contract receiving the input
    pub contract: Address,
    /// Address submitting the input
    pub user: Address,
}

impl ProofContext {
    pub fn new(contract: Address, user: Address) -> Self {
        Self { contract, user }
    }
}

/// A ciphertext whose input proof has been checked.
///
/// Only [`ProofVerifier::verify`] creates these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedHandle {
    ciphertext: Ciphertext,
    context: ProofContext,
}

impl VerifiedHandle {
    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    pub fn context(&self) -> &ProofContext {
        &self.context
    }

    pub fn kind(&self) -> ValueKind {
        self.ciphertext.kind()
    }

    pub fn into_ciphertext(self) -> Ciphertext {
        self.ciphertext
    }
}

/// Produces input proofs.
#[derive(Clone)]
pub struct InputProofIssuer {
    key: [u8; 32],
}

impl InputProofIssuer {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn issue(&self, input: &EncryptedInput, ctx: &ProofContext) -> Result<InputProof, FheError> {
        let tag = proof_tag(&self.key, input, ctx)?;
        let mut bytes = Vec::with_capacity(PROOF_LEN);
        bytes.push(PROOF_VERSION);
        bytes.extend_from_slice(&tag);
        Ok(InputProof(bytes))
    }
}

/// Checks input proofs. Pure: no state is touched.
#[derive(Clone)]
pub struct ProofVerifier {
    key: [u8; 32],
}

impl fmt::Debug for ProofVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofVerifier").finish_non_exhaustive()
    }
}

impl ProofVerifier {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Verify that `input` was encrypted for exactly `ctx`.
    ///
    /// Returns `MalformedInput` for structurally invalid envelopes or proofs
    /// and `InvalidProof` when the tag does not match.
    pub fn verify(
        &self,
        input: &EncryptedInput,
        proof: &InputProof,
        ctx: &ProofContext,
    ) -> Result<VerifiedHandle, FheError> {
        let expected_len = input.kind.sealed_len();
        if input.envelope.len() != expected_len {
            return Err(FheError::MalformedInput(format!(
                "{:?} envelope must be {} bytes, got {}",
                input.kind,
                expected_len,
                input.envelope.len()
            )));
        }
        if proof.0.len() != PROOF_LEN {
            return Err(FheError::MalformedInput(format!(
                "proof must be {} bytes, got {}",
                PROOF_LEN,
                proof.0.len()
            )));
        }
        if proof.0[0] != PROOF_VERSION {
            return Err(FheError::MalformedInput(format!(
                "unsupported proof version {}",
                proof.0[0]
            )));
        }

        let expected = proof_tag(&self.key, input, ctx)?;
        if !constant_time_eq(&expected, &proof.0[1..]) {
            return Err(FheError::InvalidProof);
        }

        Ok(VerifiedHandle {
            ciphertext: Ciphertext::from_envelope(input.kind, input.envelope.clone()),
            context: *ctx,
        })
    }
}

fn proof_tag(
    key: &[u8; 32],
    input: &EncryptedInput,
    ctx: &ProofContext,
) -> Result<[u8; 32], FheError> {
    let mut transcript = Vec::with_capacity(20 + 64 + 1 + input.envelope.len());
    transcript.extend_from_slice(b"AUCTION_INPUT_PROOF:");
    transcript.extend_from_slice(&ctx.contract);
    transcript.extend_from_slice(&ctx.user);
    transcript.push(input.kind.tag());
    transcript.extend_from_slice(&input.envelope);

    let hk = Hkdf::<Sha256>::new(Some(key.as_slice()), &transcript);
    let mut tag = [0u8; 32];
    hk.expand(b"input-proof-v1", &mut tag)
        .map_err(|_| FheError::KeyDerivationFailed)?;
    Ok(tag)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: Address = [0xc0; 32];
    const ALICE: Address = [0xa1; 32];
    const BOB: Address = [0xb0; 32];

    fn input() -> EncryptedInput {
        EncryptedInput {
            kind: ValueKind::Uint64,
            envelope: vec![3u8; ValueKind::Uint64.sealed_len()],
        }
    }

    #[test]
    fn test_issue_verify() {
        let issuer = InputProofIssuer::new([1u8; 32]);
        let verifier = ProofVerifier::new([1u8; 32]);
        let ctx = ProofContext::new(CONTRACT, ALICE);

        let proof = issuer.issue(&input(), &ctx).unwrap();
        let handle = verifier.verify(&input(), &proof, &ctx).unwrap();

        assert_eq!(handle.kind(), ValueKind::Uint64);
        assert_eq!(handle.context().user, ALICE);
        assert_eq!(handle.ciphertext().envelope(), input().envelope.as_slice());
    }

    #[test]
    fn test_proof_bound_to_user_and_contract() {
        let issuer = InputProofIssuer::new([1u8; 32]);
        let verifier = ProofVerifier::new([1u8; 32]);
        let proof = issuer.issue(&input(), &ProofContext::new(CONTRACT, ALICE)).unwrap();

        assert_eq!(
            verifier.verify(&input(), &proof, &ProofContext::new(CONTRACT, BOB)),
            Err(FheError::InvalidProof)
        );
        assert_eq!(
            verifier.verify(&input(), &proof, &ProofContext::new([0u8; 32], ALICE)),
            Err(FheError::InvalidProof)
        );
    }

    #[test]
    fn test_proof_bound_to_envelope() {
        let issuer = InputProofIssuer::new([1u8; 32]);
        let verifier = ProofVerifier::new([1u8; 32]);
        let ctx = ProofContext::new(CONTRACT, ALICE);
        let proof = issuer.issue(&input(), &ctx).unwrap();

        let mut tampered = input();
        tampered.envelope[5] ^= 0xff;
        assert_eq!(verifier.verify(&tampered, &proof, &ctx), Err(FheError::InvalidProof));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let issuer = InputProofIssuer::new([1u8; 32]);
        let verifier = ProofVerifier::new([2u8; 32]);
        let ctx = ProofContext::new(CONTRACT, ALICE);
        let proof = issuer.issue(&input(), &ctx).unwrap();

        assert_eq!(verifier.verify(&input(), &proof, &ctx), Err(FheError::InvalidProof));
    }

    #[test]
    fn test_malformed_input() {
        let verifier = ProofVerifier::new([1u8; 32]);
        let ctx = ProofContext::new(CONTRACT, ALICE);

        let short = EncryptedInput {
            kind: ValueKind::Uint64,
            envelope: vec![0u8; 4],
        };
        assert!(matches!(
            verifier.verify(&short, &InputProof(vec![PROOF_VERSION; PROOF_LEN]), &ctx),
            Err(FheError::MalformedInput(_))
        ));

        assert!(matches!(
            verifier.verify(&input(), &InputProof(vec![1, 2, 3]), &ctx),
            Err(FheError::MalformedInput(_))
        ));

        let mut wrong_version = vec![0u8; PROOF_LEN];
        wrong_version[0] = 9;
        assert!(matches!(
            verifier.verify(&input(), &InputProof(wrong_version), &ctx),
            Err(FheError::MalformedInput(_))
        ));
    }
}
