//! Interfaces the auction core consumes from an encryption backend.

use auction_types::{Address, Ciphertext, CiphertextId, Plaintext};

use crate::error::FheError;

/// Comparison and selection over ciphertexts.
///
/// Every operation returns a fresh ciphertext; nothing here reveals a
/// plaintext or lets the caller observe which operand "won".
pub trait HomomorphicComparator {
    /// Encrypted `a > b`. Equal operands yield `false`, so the left operand
    /// (the earlier-seen value in a fold) keeps ties.
    fn gt(&mut self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, FheError>;

    /// Encrypted `if cond { if_true } else { if_false }`.
    ///
    /// `cond` must be a `Bool` ciphertext and both branches must share a kind.
    fn select(
        &mut self,
        cond: &Ciphertext,
        if_true: &Ciphertext,
        if_false: &Ciphertext,
    ) -> Result<Ciphertext, FheError>;

    /// Encrypt a value that is already public (e.g. a bid index) so it can
    /// take part in `select`.
    fn trivial_encrypt(&mut self, value: Plaintext) -> Result<Ciphertext, FheError>;
}

/// Decryption permission lookup.
pub trait AccessPolicy {
    fn is_allowed(&self, ciphertext: &CiphertextId, requester: &Address) -> bool;
}

/// Out-of-band decryption for a party holding an access grant.
pub trait UserDecryptor {
    fn user_decrypt(
        &self,
        ciphertext: &Ciphertext,
        requester: &Address,
        policy: &dyn AccessPolicy,
    ) -> Result<Plaintext, FheError>;
}
