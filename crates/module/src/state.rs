//! On-chain state structures for the auction module.

use std::collections::HashMap;

use auction_fhe::ProofVerifier;
use auction_types::{Auction, AuctionPhase, Bid, WinnerRecord};

use crate::access::AccessControlList;
use crate::events::AuctionEvent;
use crate::genesis::AuctionGenesisConfig;
use crate::lifecycle::AuctionLifecycle;
use crate::registry::BidRegistry;
use crate::tournament::TournamentProgress;

/// Auction module state.
///
/// In a ledger deployment these would be storage maps; here it is an
/// in-memory representation driven by the handlers.
#[derive(Debug)]
pub struct AuctionState {
    /// Deployment configuration
    pub config: AuctionGenesisConfig,

    /// Input proof verifier shared with the encryption backend
    pub verifier: ProofVerifier,

    /// Auction records by generation
    pub lifecycle: AuctionLifecycle,

    /// Bid logs by generation
    pub registries: HashMap<u64, BidRegistry>,

    /// Finalization results by generation
    pub winners: HashMap<u64, WinnerRecord>,

    /// Batched tournament in flight for the current generation
    pub finalizing: Option<TournamentProgress>,

    /// Decryption grants
    pub access: AccessControlList,

    /// Event log
    pub events: Vec<AuctionEvent>,
}

impl AuctionState {
    /// Create a new auction state.
    pub fn new(config: AuctionGenesisConfig, verifier: ProofVerifier) -> Self {
        Self {
            config,
            verifier,
            lifecycle: AuctionLifecycle::new(),
            registries: HashMap::new(),
            winners: HashMap::new(),
            finalizing: None,
            access: AccessControlList::new(),
            events: Vec::new(),
        }
    }

    pub fn current_auction(&self) -> Option<&Auction> {
        self.lifecycle.current()
    }

    pub fn registry(&self, generation: u64) -> Option<&BidRegistry> {
        self.registries.get(&generation)
    }

    /// Bids of a generation, empty if unknown.
    pub fn bids(&self, generation: u64) -> &[Bid] {
        self.registry(generation)
            .map(BidRegistry::bids)
            .unwrap_or_default()
    }

    /// Bid count of the current auction.
    pub fn bid_count(&self) -> u32 {
        self.registry(self.lifecycle.generation())
            .map(BidRegistry::bid_count)
            .unwrap_or(0)
    }

    pub fn winner(&self, generation: u64) -> Option<&WinnerRecord> {
        self.winners.get(&generation)
    }

    pub fn phase(&self, now: u64) -> AuctionPhase {
        self.lifecycle.phase(now, self.finalizing.is_some())
    }

    pub fn emit(&mut self, event: AuctionEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = AuctionState::new(AuctionGenesisConfig::default(), ProofVerifier::new([0u8; 32]));
        assert!(state.current_auction().is_none());
        assert_eq!(state.bid_count(), 0);
        assert!(state.bids(1).is_empty());
        assert_eq!(state.phase(0), AuctionPhase::Uninitialized);
    }
}
