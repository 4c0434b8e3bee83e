//! Ciphertext handling for confidential auctions.
//!
//! This crate is the boundary between the auction core and an encryption
//! backend:
//!
//! 1. **Input proofs**: a client encrypts its bid and obtains a proof binding
//!    the ciphertext to (auction contract, submitter). [`ProofVerifier`] checks
//!    it and is the only way to obtain a [`VerifiedHandle`].
//!
//! 2. **Comparison/selection**: [`HomomorphicComparator`] exposes `gt` and
//!    `select` over ciphertexts, producing new ciphertexts only.
//!
//! 3. **Decryption**: [`UserDecryptor`] opens a ciphertext for a requester only
//!    if an [`AccessPolicy`] (the auction's grant log) allows it.
//!
//! [`MockFheBackend`] implements all three for development and tests.

pub mod backend;
pub mod error;
pub mod mock;
pub mod proof;

pub use backend::{AccessPolicy, HomomorphicComparator, UserDecryptor};
pub use error::FheError;
pub use mock::{MockFheBackend, OpCounts};
pub use proof::{InputProofIssuer, ProofContext, ProofVerifier, VerifiedHandle};
