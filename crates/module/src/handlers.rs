//! Call handlers for the auction module.
//!
//! These functions implement the business logic for each call type. Each one
//! validates every precondition and computes its result before touching
//! `state`, so a returned error always means nothing changed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use auction_fhe::HomomorphicComparator;
use auction_types::{
    short_address, AccessGrant, Address, AuctionPhase, Bid, BidIndex, CiphertextId,
    EncryptedInput, InputProof, WinnerRecord,
};

use crate::error::AuctionError;
use crate::events::{AuctionEvent, FinalizationReason};
use crate::genesis::FinalizePolicy;
use crate::registry::{verify_bid_inputs, BidRegistry};
use crate::state::AuctionState as ModuleState;
use crate::tournament::{eligible_bids, TournamentSelector};

/// Context provided by the runtime for each call.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// What a completed finalization decided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationOutcome {
    pub generation: u64,
    pub reason: FinalizationReason,
    pub bid_count: u32,
    /// Plaintext winner index, when known without decryption
    pub winner_index: Option<BidIndex>,
    pub encrypted_winning_amount: Option<CiphertextId>,
}

/// Result of one batched finalization call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOutcome {
    InProgress {
        generation: u64,
        processed: u32,
        remaining: u32,
    },
    Finalized(FinalizationOutcome),
}

/// Handle CreateAuction call.
pub fn handle_create_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
    duration: u64,
    metadata_reference: String,
) -> HandlerResult<u64> {
    if ctx.sender != state.config.admin {
        return Err(AuctionError::Unauthorized);
    }

    let params = state.config.lifecycle;
    let auction = state.lifecycle.create(
        &params,
        ctx.sender,
        ctx.timestamp,
        duration,
        metadata_reference,
    )?;
    let generation = auction.generation;
    let end_time = auction.end_time;
    let metadata_reference = auction.metadata_reference.clone();

    state
        .registries
        .insert(generation, BidRegistry::new(generation));
    state.emit(AuctionEvent::AuctionCreated {
        generation,
        end_time,
        metadata_reference,
    });

    info!(generation, end_time, "auction created");
    Ok(generation)
}

/// Handle SubmitBid call.
pub fn handle_submit_bid(
    state: &mut ModuleState,
    ctx: &CallContext,
    encrypted_amount: &EncryptedInput,
    encrypted_identity: &EncryptedInput,
    amount_proof: &InputProof,
    identity_proof: &InputProof,
) -> HandlerResult<BidIndex> {
    // Bids are accepted only while Open: not before creation, not at or
    // after end time, never while finalizing or finalized.
    if state.phase(ctx.timestamp) != AuctionPhase::Open {
        return Err(AuctionError::AuctionNotActive);
    }
    let generation = state.lifecycle.generation();

    let bid = verify_bid_inputs(
        &state.verifier,
        state.config.contract_address,
        ctx.sender,
        encrypted_amount,
        encrypted_identity,
        amount_proof,
        identity_proof,
    )?;

    let registry = state
        .registries
        .get_mut(&generation)
        .ok_or(AuctionError::AuctionNotFound(generation))?;
    let index = registry.append(bid, ctx.timestamp)?;

    state.emit(AuctionEvent::BidSubmitted {
        generation,
        bidder: ctx.sender,
        index,
    });

    debug!(generation, %index, bidder = %short_address(&ctx.sender), "bid submitted");
    Ok(index)
}

/// Handle SmartFinalize call.
///
/// Branches on bid count: no bids, a single bid taken directly, or a
/// tournament over the non-administrator bids. The tournament must fit under
/// the per-call compute ceiling; otherwise the call fails with
/// `ComputeBudgetExceeded` and [`handle_finalize_batch`] should be used.
pub fn handle_smart_finalize<B: HomomorphicComparator>(
    state: &mut ModuleState,
    backend: &mut B,
    ctx: &CallContext,
) -> HandlerResult<FinalizationOutcome> {
    let (generation, admin) = check_finalizable(state, ctx)?;
    if state.finalizing.is_some() {
        return Err(AuctionError::FinalizationInProgress);
    }

    let budget = state.config.compute_budget;
    let bids = state.bids(generation);
    let bid_count = bids.len() as u32;

    let (reason, winner) = match bids {
        [] => (FinalizationReason::NoBids, None),
        [only] if only.submitter == admin => (FinalizationReason::OwnerOnlyBid, None),
        [only] => (
            FinalizationReason::SingleBid,
            Some(TournamentSelector::new(backend, budget).sole_winner(only, 1)?),
        ),
        _ => {
            let reason = match eligible_bids(bids, &admin).len() {
                0 => FinalizationReason::NoEligibleBids,
                1 => FinalizationReason::SingleEligibleBid,
                _ => FinalizationReason::Tournament,
            };
            let mut selector = TournamentSelector::new(backend, budget);
            let winner = selector.select_winner(generation, bids, &admin)?;
            debug!(generation, used = selector.meter().used(), "tournament complete");
            (reason, winner)
        }
    };

    Ok(commit_finalization(
        state, ctx, generation, reason, bid_count, winner,
    ))
}

/// Handle FinalizeBatch call.
///
/// Starts or resumes a tournament, folding as many bids as the per-call
/// ceiling allows and persisting the running maximum in between. When the
/// whole finalization fits in one call this behaves like
/// [`handle_smart_finalize`].
pub fn handle_finalize_batch<B: HomomorphicComparator>(
    state: &mut ModuleState,
    backend: &mut B,
    ctx: &CallContext,
) -> HandlerResult<BatchOutcome> {
    let (generation, admin) = check_finalizable(state, ctx)?;
    let budget = state.config.compute_budget;

    let bids = state.bids(generation);
    let bid_count = bids.len() as u32;
    let eligible = eligible_bids(bids, &admin);

    if state.finalizing.is_none() && budget.tournament_cost(eligible.len()) <= budget.per_call_ceiling
    {
        return handle_smart_finalize(state, backend, ctx).map(BatchOutcome::Finalized);
    }

    let mut selector = TournamentSelector::new(backend, budget);
    let mut progress = match &state.finalizing {
        Some(progress) => progress.clone(),
        None => selector.start(generation, bid_count, &eligible)?,
    };
    let steps = selector.advance(&mut progress, &eligible)?;
    if steps == 0 && !progress.is_complete() {
        return Err(AuctionError::ComputeBudgetExceeded {
            required: selector.meter().used().saturating_add(budget.step_cost()),
            available: budget.per_call_ceiling,
        });
    }

    let processed = progress.next as u32;
    let remaining = progress.remaining() as u32;
    state.emit(AuctionEvent::TournamentAdvanced {
        generation,
        processed,
        remaining,
    });

    if progress.is_complete() {
        let winner = progress.into_winner_record();
        let outcome = commit_finalization(
            state,
            ctx,
            generation,
            FinalizationReason::Tournament,
            bid_count,
            Some(winner),
        );
        return Ok(BatchOutcome::Finalized(outcome));
    }

    info!(generation, processed, remaining, "batched finalization in progress");
    state.finalizing = Some(progress);
    Ok(BatchOutcome::InProgress {
        generation,
        processed,
        remaining,
    })
}

/// Handle PublishWinner call from the decryption oracle.
pub fn handle_publish_winner(
    state: &mut ModuleState,
    ctx: &CallContext,
    generation: u64,
    winner_index: BidIndex,
) -> HandlerResult<Address> {
    let oracle = state.config.oracle.ok_or(AuctionError::OracleNotConfigured)?;
    if ctx.sender != oracle {
        return Err(AuctionError::Unauthorized);
    }

    let auction = state
        .lifecycle
        .get(generation)
        .ok_or(AuctionError::AuctionNotFound(generation))?;
    if !auction.finalized {
        return Err(AuctionError::NotFinalized);
    }
    let admin = auction.admin_address;

    let record = state
        .winner(generation)
        .ok_or(AuctionError::NoWinner(generation))?;
    if record.is_revealed() {
        return Err(AuctionError::WinnerAlreadyRevealed);
    }
    let amount = record.encrypted_winning_amount.id();

    let winner = state
        .registry(generation)
        .and_then(|registry| registry.bid(winner_index).ok())
        .filter(|bid: &&Bid| bid.submitter != admin)
        .map(|bid| bid.submitter)
        .ok_or(AuctionError::InvalidWinnerIndex(winner_index))?;

    if let Some(record) = state.winners.get_mut(&generation) {
        record.winner_index = Some(winner_index);
        record.winner = Some(winner);
    }
    let oracle_access = state.config.grant_oracle_amount_access.then_some(oracle);
    let issued = state.access.grant_winner_access(
        winner,
        amount,
        oracle_access,
        generation,
        ctx.timestamp,
    );
    emit_grants(state, issued);
    state.emit(AuctionEvent::WinnerRevealed {
        generation,
        winner_index,
        winner,
    });

    info!(generation, %winner_index, winner = %short_address(&winner), "winner revealed");
    Ok(winner)
}

/// Handle RecordMint call from the external minter.
pub fn handle_record_mint(
    state: &mut ModuleState,
    ctx: &CallContext,
    generation: u64,
) -> HandlerResult<Address> {
    if state.config.minter != Some(ctx.sender) {
        return Err(AuctionError::Unauthorized);
    }

    let auction = state
        .lifecycle
        .get(generation)
        .ok_or(AuctionError::AuctionNotFound(generation))?;
    if !auction.finalized {
        return Err(AuctionError::NotFinalized);
    }
    if auction.minted {
        return Err(AuctionError::AlreadyMinted);
    }
    let winner = state
        .winner(generation)
        .ok_or(AuctionError::NoWinner(generation))?
        .winner
        .ok_or(AuctionError::WinnerNotRevealed)?;

    if let Some(auction) = state.lifecycle.get_mut(generation) {
        auction.minted = true;
    }
    state.emit(AuctionEvent::AuctionMinted { generation, winner });

    info!(generation, winner = %short_address(&winner), "auction minted");
    Ok(winner)
}

/// Common finalization preconditions. Returns the generation and the
/// administrator whose bids are excluded.
fn check_finalizable(state: &ModuleState, ctx: &CallContext) -> HandlerResult<(u64, Address)> {
    let auction = state
        .current_auction()
        .ok_or(AuctionError::AuctionNotActive)?;

    // Repeats report AlreadyFinalized to every caller
    if auction.finalized {
        return Err(AuctionError::AlreadyFinalized);
    }
    if state.config.finalize_policy == FinalizePolicy::AdminOnly && ctx.sender != state.config.admin
    {
        return Err(AuctionError::Unauthorized);
    }
    if !auction.has_ended(ctx.timestamp) {
        return Err(AuctionError::AuctionNotEnded);
    }

    Ok((auction.generation, auction.admin_address))
}

/// Lock the outcome, issue grants and emit events. Infallible: everything
/// that can fail has already run.
fn commit_finalization(
    state: &mut ModuleState,
    ctx: &CallContext,
    generation: u64,
    reason: FinalizationReason,
    bid_count: u32,
    winner: Option<WinnerRecord>,
) -> FinalizationOutcome {
    if let Some(auction) = state.lifecycle.get_mut(generation) {
        auction.finalized = true;
    }
    state.finalizing = None;

    let outcome = FinalizationOutcome {
        generation,
        reason,
        bid_count,
        winner_index: winner.as_ref().and_then(|w| w.winner_index),
        encrypted_winning_amount: winner.as_ref().map(|w| w.encrypted_winning_amount.id()),
    };

    if let Some(record) = winner {
        let oracle = state.config.oracle;
        match (record.winner, &record.encrypted_winner_index) {
            (Some(address), _) => {
                let oracle_access = oracle.filter(|_| state.config.grant_oracle_amount_access);
                let issued = state.access.grant_winner_access(
                    address,
                    record.encrypted_winning_amount.id(),
                    oracle_access,
                    generation,
                    ctx.timestamp,
                );
                emit_grants(state, issued);
            }
            (None, Some(index)) => match oracle {
                Some(oracle) => {
                    let index_id = index.id();
                    let issued = state
                        .access
                        .grant(index_id, oracle, generation, ctx.timestamp)
                        .map(|()| AccessGrant {
                            ciphertext: index_id,
                            grantee: oracle,
                            generation,
                            granted_at: ctx.timestamp,
                        });
                    emit_grants(state, issued.into_iter().collect());
                }
                None => warn!(generation, "no decryption oracle configured; winner index stays sealed"),
            },
            (None, None) => {}
        }
        state.winners.insert(generation, record);
    }

    state.emit(AuctionEvent::SmartFinalization {
        generation,
        reason,
        bid_count,
    });
    state.emit(AuctionEvent::AuctionFinalized {
        generation,
        winner_index: outcome.winner_index,
        encrypted_winning_amount: outcome.encrypted_winning_amount,
    });

    info!(generation, ?reason, bid_count, "auction finalized");
    outcome
}

fn emit_grants(state: &mut ModuleState, grants: Vec<AccessGrant>) {
    for grant in grants {
        state.emit(AuctionEvent::AccessGranted {
            generation: grant.generation,
            ciphertext: grant.ciphertext,
            grantee: grant.grantee,
        });
    }
}
