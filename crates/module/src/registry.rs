//! Append-only bid storage for one auction generation.

use tracing::warn;

use auction_fhe::{ProofContext, ProofVerifier, VerifiedHandle};
use auction_types::{Address, Bid, BidIndex, EncryptedInput, InputProof, ValueKind};

use crate::error::AuctionError;

/// Bids of one auction, indexed in submission order.
#[derive(Clone, Debug)]
pub struct BidRegistry {
    generation: u64,
    bids: Vec<Bid>,
}

/// Both inputs of a bid after proof verification.
#[derive(Clone, Debug)]
pub struct VerifiedBid {
    pub submitter: Address,
    pub amount: VerifiedHandle,
    pub identity: VerifiedHandle,
    pub amount_proof: InputProof,
    pub identity_proof: InputProof,
}

impl BidRegistry {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            bids: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bid_count(&self) -> u32 {
        self.bids.len() as u32
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn bid(&self, index: BidIndex) -> Result<&Bid, AuctionError> {
        self.bids
            .get(index.as_usize())
            .ok_or(AuctionError::BidNotFound(index))
    }

    /// Index the next bid will receive.
    ///
    /// Fails with `RegistryFull` once all `u32` indices are taken.
    pub fn next_index(&self) -> Result<BidIndex, AuctionError> {
        Self::index_at(self.generation, self.bids.len())
    }

    fn index_at(generation: u64, position: usize) -> Result<BidIndex, AuctionError> {
        u32::try_from(position)
            .map(BidIndex)
            .map_err(|_| AuctionError::RegistryFull(generation))
    }

    /// Store a verified bid and return its index.
    pub fn append(&mut self, bid: VerifiedBid, now: u64) -> Result<BidIndex, AuctionError> {
        let index = self.next_index()?;
        self.bids.push(Bid {
            index,
            generation: self.generation,
            submitter: bid.submitter,
            encrypted_amount: bid.amount.into_ciphertext(),
            encrypted_submitter_id: bid.identity.into_ciphertext(),
            amount_proof: bid.amount_proof,
            identity_proof: bid.identity_proof,
            submitted_at: now,
        });
        Ok(index)
    }
}

/// Run the proof verifier over both inputs of a bid.
///
/// Any failure (bad proof, malformed bytes, wrong value kind) is reported as
/// `InvalidProof`; the detail goes to the log.
pub fn verify_bid_inputs(
    verifier: &ProofVerifier,
    contract: Address,
    submitter: Address,
    encrypted_amount: &EncryptedInput,
    encrypted_identity: &EncryptedInput,
    amount_proof: &InputProof,
    identity_proof: &InputProof,
) -> Result<VerifiedBid, AuctionError> {
    let ctx = ProofContext::new(contract, submitter);

    let amount = verifier
        .verify(encrypted_amount, amount_proof, &ctx)
        .map_err(|e| {
            warn!(error = %e, "bid amount rejected");
            AuctionError::InvalidProof
        })?;
    let identity = verifier
        .verify(encrypted_identity, identity_proof, &ctx)
        .map_err(|e| {
            warn!(error = %e, "bid identity rejected");
            AuctionError::InvalidProof
        })?;

    if amount.kind() != ValueKind::Uint64 || identity.kind() != ValueKind::Address {
        warn!(
            amount = ?amount.kind(),
            identity = ?identity.kind(),
            "bid inputs have unexpected kinds"
        );
        return Err(AuctionError::InvalidProof);
    }

    Ok(VerifiedBid {
        submitter,
        amount,
        identity,
        amount_proof: amount_proof.clone(),
        identity_proof: identity_proof.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_fhe::MockFheBackend;
    use auction_types::Plaintext;

    const CONTRACT: Address = [0xc0; 32];
    const ALICE: Address = [0xa1; 32];
    const BOB: Address = [0xb0; 32];

    fn backend() -> MockFheBackend {
        MockFheBackend::new([7u8; 32]).unwrap()
    }

    fn inputs(
        backend: &mut MockFheBackend,
        user: Address,
        amount: u64,
    ) -> (EncryptedInput, InputProof, EncryptedInput, InputProof) {
        let ctx = ProofContext::new(CONTRACT, user);
        let (a, ap) = backend.encrypt_input(Plaintext::Uint64(amount), &ctx).unwrap();
        let (i, ip) = backend.encrypt_input(Plaintext::Address(user), &ctx).unwrap();
        (a, ap, i, ip)
    }

    #[test]
    fn test_append_assigns_sequential_indices() {
        let mut backend = backend();
        let verifier = backend.verifier();
        let mut registry = BidRegistry::new(4);

        for (n, user) in [ALICE, BOB, ALICE].into_iter().enumerate() {
            let (a, ap, i, ip) = inputs(&mut backend, user, 100);
            let bid = verify_bid_inputs(&verifier, CONTRACT, user, &a, &i, &ap, &ip).unwrap();
            let index = registry.append(bid, 10 + n as u64).unwrap();
            assert_eq!(index, BidIndex(n as u32));
        }

        assert_eq!(registry.bid_count(), 3);
        let bid = registry.bid(BidIndex(2)).unwrap();
        assert_eq!(bid.submitter, ALICE);
        assert_eq!(bid.generation, 4);
        assert_eq!(bid.submitted_at, 12);
        assert_eq!(
            registry.bid(BidIndex(3)).unwrap_err(),
            AuctionError::BidNotFound(BidIndex(3))
        );
    }

    #[test]
    fn test_index_space_exhaustion() {
        assert_eq!(BidRegistry::new(2).next_index(), Ok(BidIndex(0)));
        assert_eq!(
            BidRegistry::index_at(2, u32::MAX as usize),
            Ok(BidIndex(u32::MAX))
        );
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            BidRegistry::index_at(2, u32::MAX as usize + 1),
            Err(AuctionError::RegistryFull(2))
        );
    }

    #[test]
    fn test_proof_for_other_user_rejected() {
        let mut backend = backend();
        let verifier = backend.verifier();
        let (a, ap, i, ip) = inputs(&mut backend, ALICE, 100);

        let result = verify_bid_inputs(&verifier, CONTRACT, BOB, &a, &i, &ap, &ip);
        assert_eq!(result.unwrap_err(), AuctionError::InvalidProof);
    }

    #[test]
    fn test_swapped_inputs_rejected() {
        let mut backend = backend();
        let verifier = backend.verifier();
        let (a, ap, i, ip) = inputs(&mut backend, ALICE, 100);

        // Identity in the amount slot: proofs verify, kinds do not.
        let result = verify_bid_inputs(&verifier, CONTRACT, ALICE, &i, &a, &ip, &ap);
        assert_eq!(result.unwrap_err(), AuctionError::InvalidProof);
    }

    #[test]
    fn test_malformed_input_reported_as_invalid_proof() {
        let mut backend = backend();
        let verifier = backend.verifier();
        let (mut a, ap, i, ip) = inputs(&mut backend, ALICE, 100);
        a.envelope.truncate(3);

        let result = verify_bid_inputs(&verifier, CONTRACT, ALICE, &a, &i, &ap, &ip);
        assert_eq!(result.unwrap_err(), AuctionError::InvalidProof);
    }
}
