//! Encrypted tournament over the eligible bids.
//!
//! The running maximum is a triple (amount, index, identity) of ciphertexts.
//! Each eligible bid after the first costs exactly one `gt` and three
//! `select`s, whatever the amounts are, so neither the number nor the shape of
//! operations depends on which bid is winning. Administrator bids are removed
//! before the fold starts.
//!
//! The index and identity operands are encrypted from the ledger's plaintext
//! view of each bid (its position and submitter), so the winner record can
//! only ever name the address that actually submitted the winning bid.
//!
//! A tournament can run in one call or be split across calls: the state
//! between calls is a [`TournamentProgress`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use auction_fhe::HomomorphicComparator;
use auction_types::{Address, Bid, Ciphertext, Plaintext, WinnerRecord};

use crate::error::AuctionError;
use crate::genesis::ComputeBudget;

/// Best-so-far candidate. The three fields are always selected together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub amount: Ciphertext,
    pub index: Ciphertext,
    pub identity: Ciphertext,
}

/// A tournament that has been seeded and possibly partially folded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentProgress {
    pub generation: u64,
    pub best: Candidate,
    /// Position in the eligible sequence of the next bid to fold
    pub next: usize,
    /// Length of the eligible sequence
    pub eligible: usize,
    /// Total bids in the auction, including excluded ones
    pub bid_count: u32,
}

impl TournamentProgress {
    pub fn remaining(&self) -> usize {
        self.eligible.saturating_sub(self.next)
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.eligible
    }

    /// Winner record for a completed tournament. The plaintext index is left
    /// for the decryption oracle to publish.
    pub fn into_winner_record(self) -> WinnerRecord {
        WinnerRecord {
            generation: self.generation,
            encrypted_winner_address: self.best.identity,
            encrypted_winning_amount: self.best.amount,
            encrypted_winner_index: Some(self.best.index),
            winner_index: None,
            winner: None,
            eligible_bids: self.eligible as u32,
        }
    }
}

/// Bids that may win: everything not submitted by the administrator, in
/// submission order.
pub fn eligible_bids<'a>(bids: &'a [Bid], admin: &Address) -> Vec<&'a Bid> {
    bids.iter().filter(|bid| &bid.submitter != admin).collect()
}

/// Tracks compute spent in the current call against the ceiling.
#[derive(Clone, Copy, Debug)]
pub struct ComputeMeter {
    budget: ComputeBudget,
    used: u64,
}

impl ComputeMeter {
    pub fn new(budget: ComputeBudget) -> Self {
        Self { budget, used: 0 }
    }

    pub fn budget(&self) -> &ComputeBudget {
        &self.budget
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.used.saturating_add(cost) <= self.budget.per_call_ceiling
    }

    pub fn charge(&mut self, cost: u64) -> Result<(), AuctionError> {
        if !self.can_afford(cost) {
            return Err(AuctionError::ComputeBudgetExceeded {
                required: self.used.saturating_add(cost),
                available: self.budget.per_call_ceiling,
            });
        }
        self.used += cost;
        Ok(())
    }
}

/// Runs the fold against a comparator backend, metering every step.
pub struct TournamentSelector<'a, B> {
    backend: &'a mut B,
    meter: ComputeMeter,
}

impl<'a, B: HomomorphicComparator> TournamentSelector<'a, B> {
    pub fn new(backend: &'a mut B, budget: ComputeBudget) -> Self {
        Self {
            backend,
            meter: ComputeMeter::new(budget),
        }
    }

    pub fn meter(&self) -> &ComputeMeter {
        &self.meter
    }

    /// Select the winner in a single call.
    ///
    /// Fails with `ComputeBudgetExceeded` before any ciphertext operation if
    /// the whole fold does not fit under the ceiling.
    pub fn select_winner(
        &mut self,
        generation: u64,
        bids: &[Bid],
        admin: &Address,
    ) -> Result<Option<WinnerRecord>, AuctionError> {
        let eligible = eligible_bids(bids, admin);
        match eligible.as_slice() {
            [] => Ok(None),
            [sole] => self.sole_winner(sole, 1).map(Some),
            _ => {
                let required = self.meter.budget().tournament_cost(eligible.len());
                if !self.meter.can_afford(required) {
                    return Err(AuctionError::ComputeBudgetExceeded {
                        required: self.meter.used().saturating_add(required),
                        available: self.meter.budget().per_call_ceiling,
                    });
                }

                let mut progress = self.start(generation, bids.len() as u32, &eligible)?;
                self.advance(&mut progress, &eligible)?;
                debug_assert!(progress.is_complete());
                Ok(Some(progress.into_winner_record()))
            }
        }
    }

    /// Winner record for a bid taken without comparison.
    pub fn sole_winner(&mut self, bid: &Bid, eligible: u32) -> Result<WinnerRecord, AuctionError> {
        self.meter.charge(self.meter.budget().encrypt_cost)?;
        let identity = self.seal_submitter(bid)?;
        Ok(WinnerRecord::from_sole_bid(bid, identity, eligible))
    }

    /// Seed the running maximum from the first eligible bid.
    pub fn start(
        &mut self,
        generation: u64,
        bid_count: u32,
        eligible: &[&Bid],
    ) -> Result<TournamentProgress, AuctionError> {
        let first = eligible.first().ok_or(AuctionError::NoWinner(generation))?;

        self.meter.charge(self.meter.budget().seed_cost())?;
        let index = self
            .backend
            .trivial_encrypt(Plaintext::Uint32(first.index.0))?;
        let identity = self.seal_submitter(first)?;

        Ok(TournamentProgress {
            generation,
            best: Candidate {
                amount: first.encrypted_amount.clone(),
                index,
                identity,
            },
            next: 1,
            eligible: eligible.len(),
            bid_count,
        })
    }

    /// Fold bids until the sequence is exhausted or the next step would
    /// exceed the ceiling. Returns the number of bids folded.
    pub fn advance(
        &mut self,
        progress: &mut TournamentProgress,
        eligible: &[&Bid],
    ) -> Result<usize, AuctionError> {
        debug_assert_eq!(progress.eligible, eligible.len());

        let step_cost = self.meter.budget().step_cost();
        let mut steps = 0;
        while progress.next < eligible.len() && self.meter.can_afford(step_cost) {
            let bid = eligible[progress.next];
            progress.best = self.challenge(&progress.best, bid)?;
            progress.next += 1;
            steps += 1;
        }

        debug!(
            generation = progress.generation,
            steps,
            remaining = progress.remaining(),
            used = self.meter.used(),
            "tournament advanced"
        );
        Ok(steps)
    }

    /// One fold step: the challenger replaces the best only if strictly greater.
    fn challenge(&mut self, best: &Candidate, bid: &Bid) -> Result<Candidate, AuctionError> {
        self.meter.charge(self.meter.budget().step_cost())?;

        let index = self.backend.trivial_encrypt(Plaintext::Uint32(bid.index.0))?;
        let identity = self.seal_submitter(bid)?;
        let wins = self.backend.gt(&bid.encrypted_amount, &best.amount)?;

        Ok(Candidate {
            amount: self
                .backend
                .select(&wins, &bid.encrypted_amount, &best.amount)?,
            index: self.backend.select(&wins, &index, &best.index)?,
            identity: self.backend.select(&wins, &identity, &best.identity)?,
        })
    }

    fn seal_submitter(&mut self, bid: &Bid) -> Result<Ciphertext, AuctionError> {
        Ok(self
            .backend
            .trivial_encrypt(Plaintext::Address(bid.submitter))?)
    }
}
