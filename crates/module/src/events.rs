//! Events emitted by successful calls.

use serde::{Deserialize, Serialize};

use auction_types::{Address, BidIndex, CiphertextId};

/// Which finalization branch was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizationReason {
    /// No bids were submitted
    NoBids,
    /// The only bid came from the administrator
    OwnerOnlyBid,
    /// Exactly one bid, taken directly
    SingleBid,
    /// Several bids, all from the administrator
    NoEligibleBids,
    /// Several bids, exactly one eligible after exclusion
    SingleEligibleBid,
    /// Comparator tournament over two or more eligible bids
    Tournament,
}

impl FinalizationReason {
    pub fn has_winner(self) -> bool {
        matches!(
            self,
            FinalizationReason::SingleBid
                | FinalizationReason::SingleEligibleBid
                | FinalizationReason::Tournament
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionEvent {
    AuctionCreated {
        generation: u64,
        end_time: u64,
        metadata_reference: String,
    },
    BidSubmitted {
        generation: u64,
        bidder: Address,
        index: BidIndex,
    },
    TournamentAdvanced {
        generation: u64,
        processed: u32,
        remaining: u32,
    },
    SmartFinalization {
        generation: u64,
        reason: FinalizationReason,
        bid_count: u32,
    },
    AuctionFinalized {
        generation: u64,
        winner_index: Option<BidIndex>,
        encrypted_winning_amount: Option<CiphertextId>,
    },
    AccessGranted {
        generation: u64,
        ciphertext: CiphertextId,
        grantee: Address,
    },
    WinnerRevealed {
        generation: u64,
        winner_index: BidIndex,
        winner: Address,
    },
    AuctionMinted {
        generation: u64,
        winner: Address,
    },
}
