//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state. Queries that
//! take no generation read the current auction.

use serde::{Deserialize, Serialize};

use crate::error::AuctionError;
use crate::handlers::HandlerResult;
use crate::state::AuctionState as ModuleState;
use auction_types::{
    Address, AuctionDetails, AuctionPhase, Bid, BidIndex, CiphertextId, WinnerRecord,
};

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get details of the current auction.
    GetAuctionDetails,

    /// Number of bids in the current auction.
    GetBidCount,

    /// Get a bid of the current auction by index.
    GetBid { index: BidIndex },

    /// Whether the current auction's end time has passed.
    HasAuctionEnded,

    /// Finalization result of a generation.
    GetWinner { generation: u64 },

    /// Revealed, not yet minted winner of the current auction.
    GetMintableWinner,

    /// Whether `who` may decrypt `ciphertext`.
    IsAllowed {
        ciphertext: CiphertextId,
        who: Address,
    },

    /// State of a batched finalization, if one is in flight.
    GetFinalizationProgress,

    /// Lifecycle phase of the current auction.
    GetPhase,
}

/// Query response types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    /// Auction details; default values before the first auction.
    AuctionDetails(AuctionDetails),

    /// Bid count.
    BidCount(u32),

    /// Single bid.
    Bid(Bid),

    /// End time reached.
    HasEnded(bool),

    /// Winner record, absent when the auction finalized without a winner.
    Winner(Option<WinnerRecord>),

    /// Mintable winner.
    MintableWinner(Option<MintableWinner>),

    /// Access check result.
    Allowed(bool),

    /// Batched finalization progress.
    FinalizationProgress(Option<FinalizationProgress>),

    /// Lifecycle phase.
    Phase(AuctionPhase),
}

/// What an external minter needs to deliver the prize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintableWinner {
    pub generation: u64,
    pub winner: Address,
    pub winner_index: BidIndex,
    pub metadata_reference: String,
    pub encrypted_winning_amount: CiphertextId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationProgress {
    pub generation: u64,
    pub processed: u32,
    pub remaining: u32,
    pub bid_count: u32,
}

/// Handle a query.
pub fn handle_query(
    state: &ModuleState,
    query: AuctionQuery,
    now: u64,
) -> HandlerResult<AuctionQueryResponse> {
    let response = match query {
        AuctionQuery::GetAuctionDetails => AuctionQueryResponse::AuctionDetails(
            state
                .current_auction()
                .map(|auction| auction.details())
                .unwrap_or_default(),
        ),

        AuctionQuery::GetBidCount => AuctionQueryResponse::BidCount(state.bid_count()),

        AuctionQuery::GetBid { index } => {
            let generation = state.lifecycle.generation();
            let bid = state
                .registry(generation)
                .ok_or(AuctionError::BidNotFound(index))?
                .bid(index)?;
            AuctionQueryResponse::Bid(bid.clone())
        }

        AuctionQuery::HasAuctionEnded => AuctionQueryResponse::HasEnded(
            state
                .current_auction()
                .is_some_and(|auction| auction.has_ended(now)),
        ),

        AuctionQuery::GetWinner { generation } => {
            let auction = state
                .lifecycle
                .get(generation)
                .ok_or(AuctionError::AuctionNotFound(generation))?;
            if !auction.finalized {
                return Err(AuctionError::NotFinalized);
            }
            AuctionQueryResponse::Winner(state.winner(generation).cloned())
        }

        AuctionQuery::GetMintableWinner => {
            AuctionQueryResponse::MintableWinner(mintable_winner(state))
        }

        AuctionQuery::IsAllowed { ciphertext, who } => {
            AuctionQueryResponse::Allowed(state.access.is_allowed(&ciphertext, &who))
        }

        AuctionQuery::GetFinalizationProgress => AuctionQueryResponse::FinalizationProgress(
            state.finalizing.as_ref().map(|p| FinalizationProgress {
                generation: p.generation,
                processed: p.next as u32,
                remaining: p.remaining() as u32,
                bid_count: p.bid_count,
            }),
        ),

        AuctionQuery::GetPhase => AuctionQueryResponse::Phase(state.phase(now)),
    };

    Ok(response)
}

/// Current auction's winner, if finalized, revealed and not yet minted.
pub fn mintable_winner(state: &ModuleState) -> Option<MintableWinner> {
    let auction = state.current_auction()?;
    if !auction.finalized || auction.minted {
        return None;
    }
    let record: &WinnerRecord = state.winner(auction.generation)?;
    Some(MintableWinner {
        generation: auction.generation,
        winner: record.winner?,
        winner_index: record.winner_index?,
        metadata_reference: auction.metadata_reference.clone(),
        encrypted_winning_amount: record.encrypted_winning_amount.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::AuctionGenesisConfig;
    use crate::handlers::{
        handle_create_auction, handle_record_mint, handle_smart_finalize, handle_submit_bid,
        CallContext,
    };
    use auction_fhe::{MockFheBackend, ProofContext};
    use auction_types::Plaintext;

    const ADMIN: Address = [0xad; 32];
    const CONTRACT: Address = [0xc0; 32];
    const MINTER: Address = [0x3d; 32];
    const ALICE: Address = [0xa1; 32];

    fn ctx(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: 1,
            timestamp,
        }
    }

    fn setup() -> (ModuleState, MockFheBackend) {
        let backend = MockFheBackend::new([5u8; 32]).unwrap();
        let mut config = AuctionGenesisConfig::new(ADMIN, CONTRACT);
        config.minter = Some(MINTER);
        (ModuleState::new(config, backend.verifier()), backend)
    }

    fn query(state: &ModuleState, query: AuctionQuery, now: u64) -> AuctionQueryResponse {
        handle_query(state, query, now).unwrap()
    }

    #[test]
    fn test_queries_before_first_auction() {
        let (state, _) = setup();

        assert_eq!(
            query(&state, AuctionQuery::GetAuctionDetails, 0),
            AuctionQueryResponse::AuctionDetails(AuctionDetails::default())
        );
        assert_eq!(query(&state, AuctionQuery::GetBidCount, 0), AuctionQueryResponse::BidCount(0));
        assert_eq!(
            query(&state, AuctionQuery::HasAuctionEnded, 0),
            AuctionQueryResponse::HasEnded(false)
        );
        assert_eq!(
            query(&state, AuctionQuery::GetPhase, 0),
            AuctionQueryResponse::Phase(AuctionPhase::Uninitialized)
        );
        assert_eq!(
            handle_query(&state, AuctionQuery::GetBid { index: BidIndex(0) }, 0),
            Err(AuctionError::BidNotFound(BidIndex(0)))
        );
    }

    #[test]
    fn test_full_query_walkthrough() {
        let (mut state, mut backend) = setup();
        handle_create_auction(&mut state, &ctx(ADMIN, 100), 600, "ipfs://item".into()).unwrap();

        let proof_ctx = ProofContext::new(CONTRACT, ALICE);
        let (a, ap) = backend.encrypt_input(Plaintext::Uint64(42), &proof_ctx).unwrap();
        let (i, ip) = backend.encrypt_input(Plaintext::Address(ALICE), &proof_ctx).unwrap();
        handle_submit_bid(&mut state, &ctx(ALICE, 200), &a, &i, &ap, &ip).unwrap();

        let AuctionQueryResponse::Bid(bid) = query(&state, AuctionQuery::GetBid { index: BidIndex(0) }, 200)
        else {
            panic!("expected bid");
        };
        assert_eq!(bid.submitter, ALICE);
        assert_eq!(
            handle_query(&state, AuctionQuery::GetWinner { generation: 1 }, 200),
            Err(AuctionError::NotFinalized)
        );
        assert_eq!(
            query(&state, AuctionQuery::HasAuctionEnded, 699),
            AuctionQueryResponse::HasEnded(false)
        );
        assert_eq!(
            query(&state, AuctionQuery::HasAuctionEnded, 700),
            AuctionQueryResponse::HasEnded(true)
        );

        handle_smart_finalize(&mut state, &mut backend, &ctx(ALICE, 700)).unwrap();

        let AuctionQueryResponse::Winner(Some(record)) =
            query(&state, AuctionQuery::GetWinner { generation: 1 }, 700)
        else {
            panic!("expected winner");
        };
        assert_eq!(record.winner, Some(ALICE));
        let amount = record.encrypted_winning_amount.id();
        assert_eq!(
            query(&state, AuctionQuery::IsAllowed { ciphertext: amount, who: ALICE }, 700),
            AuctionQueryResponse::Allowed(true)
        );
        assert_eq!(
            query(&state, AuctionQuery::IsAllowed { ciphertext: amount, who: ADMIN }, 700),
            AuctionQueryResponse::Allowed(false)
        );

        let AuctionQueryResponse::MintableWinner(Some(mintable)) =
            query(&state, AuctionQuery::GetMintableWinner, 700)
        else {
            panic!("expected mintable winner");
        };
        assert_eq!(mintable.winner, ALICE);
        assert_eq!(mintable.metadata_reference, "ipfs://item");

        handle_record_mint(&mut state, &ctx(MINTER, 800), 1).unwrap();
        assert_eq!(
            query(&state, AuctionQuery::GetMintableWinner, 800),
            AuctionQueryResponse::MintableWinner(None)
        );
        assert_eq!(
            query(&state, AuctionQuery::GetFinalizationProgress, 800),
            AuctionQueryResponse::FinalizationProgress(None)
        );
    }

    #[test]
    fn test_get_winner_unknown_generation() {
        let (state, _) = setup();
        assert_eq!(
            handle_query(&state, AuctionQuery::GetWinner { generation: 3 }, 0),
            Err(AuctionError::AuctionNotFound(3))
        );
    }
}
