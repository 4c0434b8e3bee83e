//! End-to-end integration tests for the confidential auction.
//!
//! These tests drive the module through the ledger harness the way external
//! parties would:
//! 1. Administrator opens an auction
//! 2. Bidders encrypt amounts and identities and submit them with proofs
//! 3. Anyone finalizes after the end time
//! 4. The decryption oracle publishes the winner index when needed
//! 5. The winner decrypts the winning amount and the minter records the mint

#![cfg(test)]

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use auction_fhe::{FheError, MockFheBackend, ProofContext};
use auction_module::{
    AuctionCall, AuctionError, AuctionEvent, AuctionGenesisConfig, AuctionQuery,
    AuctionQueryResponse, BatchOutcome, CallOutput, ComputeBudget, FinalizationOutcome,
    FinalizationReason, GenesisValidationError, Ledger,
};
use auction_types::{Address, AuctionPhase, BidIndex, Ciphertext, Plaintext, WinnerRecord};

const ADMIN: Address = [0xad; 32];
const CONTRACT: Address = [0xc0; 32];
const ORACLE: Address = [0x0c; 32];
const MINTER: Address = [0x3d; 32];

const START: u64 = 1_700_000_000;
const DURATION: u64 = 3_600;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_module=debug".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

fn bidder(n: u8) -> Address {
    let mut address = [0u8; 32];
    address[0] = 0xb1;
    address[31] = n;
    address
}

fn default_config() -> AuctionGenesisConfig {
    let mut config = AuctionGenesisConfig::new(ADMIN, CONTRACT);
    config.oracle = Some(ORACLE);
    config.minter = Some(MINTER);
    config
}

/// A ledger plus the off-chain parties around it.
struct Harness {
    ledger: Ledger<MockFheBackend>,
}

impl Harness {
    fn new(config: AuctionGenesisConfig) -> Result<Self> {
        init_tracing();
        let backend = MockFheBackend::new([0x5e; 32])?;
        let verifier = backend.verifier();
        let ledger = Ledger::new(config, backend, verifier)?;
        ledger.set_timestamp(START);
        Ok(Self { ledger })
    }

    fn create_auction(&self) -> Result<u64> {
        let receipt = self.ledger.execute(
            ADMIN,
            AuctionCall::CreateAuction {
                duration: DURATION,
                metadata_reference: "ipfs://bafy-prize".into(),
            },
        )?;
        match receipt.output {
            CallOutput::AuctionCreated { generation } => Ok(generation),
            other => bail!("unexpected output {other:?}"),
        }
    }

    fn bid(&self, sender: Address, amount: u64) -> Result<BidIndex, AuctionError> {
        let call = self.ledger.with_backend(|backend| -> Result<AuctionCall, FheError> {
            let ctx = ProofContext::new(CONTRACT, sender);
            let (encrypted_amount, amount_proof) =
                backend.encrypt_input(Plaintext::Uint64(amount), &ctx)?;
            let (encrypted_identity, identity_proof) =
                backend.encrypt_input(Plaintext::Address(sender), &ctx)?;
            Ok(AuctionCall::SubmitBid {
                encrypted_amount,
                encrypted_identity,
                amount_proof,
                identity_proof,
            })
        })?;
        match self.ledger.execute(sender, call)?.output {
            CallOutput::BidAccepted { index } => Ok(index),
            _ => Err(AuctionError::AuctionNotActive),
        }
    }

    fn end_bidding(&self) {
        self.ledger.set_timestamp(START + DURATION);
    }

    fn finalize(&self) -> Result<FinalizationOutcome> {
        match self.ledger.execute(bidder(0xff), AuctionCall::SmartFinalize)?.output {
            CallOutput::Finalized(outcome) => Ok(outcome),
            other => bail!("unexpected output {other:?}"),
        }
    }

    fn winner_record(&self, generation: u64) -> Result<Option<WinnerRecord>> {
        match self.ledger.query(AuctionQuery::GetWinner { generation })? {
            AuctionQueryResponse::Winner(record) => Ok(record),
            other => bail!("unexpected response {other:?}"),
        }
    }

    /// Oracle side: decrypt the winner index under its grant and publish it.
    fn reveal(&self, generation: u64) -> Result<Address> {
        let record = self
            .winner_record(generation)?
            .context("auction has no winner")?;
        let sealed = record
            .encrypted_winner_index
            .context("winner index is already public")?;
        let index = self
            .ledger
            .user_decrypt(&sealed, &ORACLE)?
            .as_u64()
            .context("winner index is not an integer")?;
        info!(generation, index, "oracle publishing winner");

        let receipt = self.ledger.execute(
            ORACLE,
            AuctionCall::PublishWinner {
                generation,
                winner_index: BidIndex(u32::try_from(index)?),
            },
        )?;
        match receipt.output {
            CallOutput::WinnerPublished { winner } => Ok(winner),
            other => bail!("unexpected output {other:?}"),
        }
    }

    fn decrypt_amount(&self, ciphertext: &Ciphertext, who: &Address) -> Result<u64> {
        self.ledger
            .user_decrypt(ciphertext, who)?
            .as_u64()
            .context("amount is not an integer")
    }

    fn phase(&self) -> Result<AuctionPhase> {
        match self.ledger.query(AuctionQuery::GetPhase)? {
            AuctionQueryResponse::Phase(phase) => Ok(phase),
            other => bail!("unexpected response {other:?}"),
        }
    }
}

/// Complete flow: three bids, tournament, oracle reveal, winner decrypts,
/// minter records the mint.
#[test]
fn test_full_auction_flow() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;
    assert_eq!(harness.phase()?, AuctionPhase::Open);

    harness.bid(bidder(1), 100)?;
    harness.bid(bidder(2), 300)?;
    harness.bid(bidder(3), 200)?;

    assert_eq!(
        harness.ledger.execute(bidder(1), AuctionCall::SmartFinalize).unwrap_err(),
        AuctionError::AuctionNotEnded
    );

    harness.end_bidding();
    assert_eq!(harness.phase()?, AuctionPhase::Ended);
    let outcome = harness.finalize()?;
    assert_eq!(outcome.reason, FinalizationReason::Tournament);
    assert_eq!(outcome.bid_count, 3);
    assert_eq!(harness.phase()?, AuctionPhase::Finalized);

    // Until the oracle publishes, nobody can read the amount
    let record = harness.winner_record(generation)?.context("winner")?;
    assert!(harness
        .ledger
        .user_decrypt(&record.encrypted_winning_amount, &bidder(2))
        .is_err());

    let winner = harness.reveal(generation)?;
    assert_eq!(winner, bidder(2));
    assert_eq!(harness.decrypt_amount(&record.encrypted_winning_amount, &winner)?, 300);
    for loser in [bidder(1), bidder(3), ADMIN] {
        assert_eq!(
            harness
                .ledger
                .user_decrypt(&record.encrypted_winning_amount, &loser)
                .unwrap_err(),
            FheError::AccessDenied
        );
    }

    let receipt = harness
        .ledger
        .execute(MINTER, AuctionCall::RecordMint { generation })?;
    assert_eq!(receipt.output, CallOutput::Minted { winner: bidder(2) });
    assert_eq!(harness.phase()?, AuctionPhase::Minted);

    let events = harness.ledger.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, AuctionEvent::WinnerRevealed { winner, .. } if *winner == bidder(2))));
    assert!(matches!(events.last(), Some(AuctionEvent::AuctionMinted { .. })));
    Ok(())
}

/// Random amounts: the decrypted winning amount is the maximum and the
/// winner is the earliest bidder holding it.
#[test]
fn test_winner_is_earliest_maximum() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..8 {
        let harness = Harness::new(default_config())?;
        let generation = harness.create_auction()?;

        let count = rng.gen_range(2..12u8);
        // Narrow range so ties are common
        let amounts: Vec<u64> = (0..count).map(|_| rng.gen_range(1..8)).collect();
        for (n, amount) in amounts.iter().enumerate() {
            harness.bid(bidder(n as u8), *amount)?;
        }
        // Administrator outbids everyone and must not matter
        harness.bid(ADMIN, u64::MAX)?;

        harness.end_bidding();
        harness.finalize()?;
        let winner = harness.reveal(generation)?;

        let max = *amounts.iter().max().context("amounts")?;
        let first = amounts.iter().position(|a| *a == max).context("position")?;
        assert_eq!(winner, bidder(first as u8), "round {round}: {amounts:?}");

        let record = harness.winner_record(generation)?.context("winner")?;
        assert_eq!(harness.decrypt_amount(&record.encrypted_winning_amount, &winner)?, max);
    }
    Ok(())
}

#[test]
fn test_tie_goes_to_earlier_bid() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;
    harness.bid(bidder(0xa), 150)?;
    harness.bid(bidder(0xb), 150)?;

    harness.end_bidding();
    harness.finalize()?;
    assert_eq!(harness.reveal(generation)?, bidder(0xa));
    Ok(())
}

#[test]
fn test_zero_bids() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;

    harness.end_bidding();
    let outcome = harness.finalize()?;
    assert_eq!(outcome.reason, FinalizationReason::NoBids);
    assert_eq!(harness.winner_record(generation)?, None);
    harness.ledger.with_state(|state| {
        assert!(state.access.grants().is_empty());
        assert!(state.current_auction().is_some_and(|a| a.finalized));
    });
    Ok(())
}

#[test]
fn test_single_bid_wins_directly() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;
    harness.bid(bidder(7), 4_242)?;

    harness.end_bidding();
    let outcome = harness.finalize()?;
    assert_eq!(outcome.reason, FinalizationReason::SingleBid);
    assert_eq!(outcome.winner_index, Some(BidIndex(0)));

    let record = harness.winner_record(generation)?.context("winner")?;
    assert_eq!(record.winner, Some(bidder(7)));
    assert_eq!(harness.decrypt_amount(&record.encrypted_winning_amount, &bidder(7))?, 4_242);
    Ok(())
}

#[test]
fn test_admin_sole_bid_is_excluded() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;
    harness.bid(ADMIN, 1_000_000)?;

    harness.end_bidding();
    let outcome = harness.finalize()?;
    assert_eq!(outcome.reason, FinalizationReason::OwnerOnlyBid);
    assert_eq!(harness.winner_record(generation)?, None);
    Ok(())
}

#[test]
fn test_second_finalize_changes_nothing() -> Result<()> {
    let harness = Harness::new(default_config())?;
    harness.create_auction()?;
    harness.bid(bidder(1), 10)?;
    harness.bid(bidder(2), 20)?;
    harness.end_bidding();
    harness.finalize()?;

    let events_before = harness.ledger.events();
    let grants_before = harness.ledger.with_state(|s| s.access.grants().len());

    let err = harness
        .ledger
        .execute(bidder(3), AuctionCall::SmartFinalize)
        .unwrap_err();
    assert_eq!(err, AuctionError::AlreadyFinalized);
    assert_eq!(harness.ledger.events(), events_before);
    assert_eq!(harness.ledger.with_state(|s| s.access.grants().len()), grants_before);
    Ok(())
}

#[test]
fn test_comparator_matches_plaintext_order() -> Result<()> {
    use auction_fhe::{AccessPolicy, HomomorphicComparator, UserDecryptor};
    use auction_types::CiphertextId;

    struct Everyone;
    impl AccessPolicy for Everyone {
        fn is_allowed(&self, _: &CiphertextId, _: &Address) -> bool {
            true
        }
    }

    let mut rng = StdRng::seed_from_u64(7);
    let mut backend = MockFheBackend::random(&mut rand::rngs::OsRng)?;
    for _ in 0..64 {
        let (a, b): (u64, u64) = (rng.gen(), rng.gen_range(0..4));
        let (ca, cb) = (
            backend.trivial_encrypt(Plaintext::Uint64(a))?,
            backend.trivial_encrypt(Plaintext::Uint64(b))?,
        );
        let gt = backend.gt(&ca, &cb)?;
        assert_eq!(backend.user_decrypt(&gt, &ADMIN, &Everyone)?, Plaintext::Bool(a > b));
        let gt = backend.gt(&cb, &ca)?;
        assert_eq!(backend.user_decrypt(&gt, &ADMIN, &Everyone)?, Plaintext::Bool(b > a));
    }
    Ok(())
}

#[test]
fn test_forged_proof_rejected() -> Result<()> {
    let harness = Harness::new(default_config())?;
    harness.create_auction()?;

    // Proof issued for another user
    let call = harness.ledger.with_backend(|backend| -> Result<AuctionCall, FheError> {
        let ctx = ProofContext::new(CONTRACT, bidder(1));
        let (encrypted_amount, amount_proof) = backend.encrypt_input(Plaintext::Uint64(5), &ctx)?;
        let (encrypted_identity, identity_proof) =
            backend.encrypt_input(Plaintext::Address(bidder(1)), &ctx)?;
        Ok(AuctionCall::SubmitBid {
            encrypted_amount,
            encrypted_identity,
            amount_proof,
            identity_proof,
        })
    })?;

    let err = harness.ledger.execute(bidder(2), call).unwrap_err();
    assert_eq!(err, AuctionError::InvalidProof);
    assert_eq!(
        harness.ledger.query(AuctionQuery::GetBidCount)?,
        AuctionQueryResponse::BidCount(0)
    );
    Ok(())
}

#[test]
fn test_batched_finalization_matches_single_call() -> Result<()> {
    let amounts = [12u64, 55, 31, 55, 8, 40, 54];

    // Default budget: everything in one call
    let single = Harness::new(default_config())?;
    let generation = single.create_auction()?;
    for (n, amount) in amounts.iter().enumerate() {
        single.bid(bidder(n as u8), *amount)?;
    }
    single.end_bidding();
    single.finalize()?;
    let expected = single.reveal(generation)?;

    // Ceiling fits the seed plus two steps
    let mut config = default_config();
    config.compute_budget = ComputeBudget {
        per_call_ceiling: 20 + 2 * 270,
        comparison_cost: 100,
        select_cost: 50,
        encrypt_cost: 10,
    };
    let batched = Harness::new(config)?;
    let generation = batched.create_auction()?;
    for (n, amount) in amounts.iter().enumerate() {
        batched.bid(bidder(n as u8), *amount)?;
    }
    batched.end_bidding();

    let before = batched.ledger.events().len();
    let err = batched
        .ledger
        .execute(bidder(9), AuctionCall::SmartFinalize)
        .unwrap_err();
    assert!(matches!(err, AuctionError::ComputeBudgetExceeded { .. }));
    assert_eq!(batched.ledger.events().len(), before);
    assert_eq!(batched.phase()?, AuctionPhase::Ended);

    let mut calls = 0;
    let outcome = loop {
        calls += 1;
        match batched.ledger.execute(bidder(9), AuctionCall::FinalizeBatch)?.output {
            CallOutput::Batch(BatchOutcome::InProgress { .. }) => {
                assert_eq!(batched.phase()?, AuctionPhase::Finalizing);
                assert_eq!(
                    batched.bid(bidder(20), 1_000).unwrap_err(),
                    AuctionError::AuctionNotActive
                );
            }
            CallOutput::Batch(BatchOutcome::Finalized(outcome)) => break outcome,
            other => bail!("unexpected output {other:?}"),
        }
    };
    // Six folds at two per call
    assert_eq!(calls, 3);
    assert_eq!(outcome.reason, FinalizationReason::Tournament);
    assert_eq!(batched.reveal(generation)?, expected);
    assert_eq!(expected, bidder(1));
    Ok(())
}

#[test]
fn test_new_generation_starts_clean() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let first = harness.create_auction()?;
    harness.bid(bidder(1), 10)?;
    harness.bid(bidder(2), 99)?;

    // Previous auction must be finalized first
    assert!(harness.create_auction().is_err());

    harness.end_bidding();
    harness.finalize()?;
    harness.ledger.advance_time(60);
    let second = harness.create_auction()?;
    assert_eq!(second, first + 1);

    assert_eq!(
        harness.ledger.query(AuctionQuery::GetBidCount)?,
        AuctionQueryResponse::BidCount(0)
    );
    harness.bid(bidder(3), 5)?;
    harness.ledger.set_timestamp(START + DURATION + 60 + DURATION);
    let outcome = harness.finalize()?;
    assert_eq!(outcome.generation, second);
    assert_eq!(outcome.reason, FinalizationReason::SingleBid);

    // Earlier results stay queryable by generation
    assert!(harness.winner_record(first)?.is_some());
    Ok(())
}

#[test]
fn test_mint_requires_reveal() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;
    harness.bid(bidder(1), 10)?;
    harness.bid(bidder(2), 20)?;
    harness.end_bidding();
    harness.finalize()?;

    assert_eq!(
        harness.ledger.query(AuctionQuery::GetMintableWinner)?,
        AuctionQueryResponse::MintableWinner(None)
    );
    let err = harness
        .ledger
        .execute(MINTER, AuctionCall::RecordMint { generation })
        .unwrap_err();
    assert_eq!(err, AuctionError::WinnerNotRevealed);

    harness.reveal(generation)?;
    let AuctionQueryResponse::MintableWinner(Some(mintable)) =
        harness.ledger.query(AuctionQuery::GetMintableWinner)?
    else {
        bail!("expected a mintable winner");
    };
    assert_eq!(mintable.winner, bidder(2));
    harness
        .ledger
        .execute(MINTER, AuctionCall::RecordMint { generation })?;
    Ok(())
}

#[test]
fn test_deployment_requires_oracle() -> Result<()> {
    let mut config = default_config();
    config.oracle = None;
    let backend = MockFheBackend::new([0x5e; 32])?;
    let verifier = backend.verifier();

    let Err(err) = Ledger::new(config, backend, verifier) else {
        bail!("a deployment without a decryption oracle must be rejected");
    };
    assert_eq!(err, GenesisValidationError::OracleRequired);
    Ok(())
}

#[test]
fn test_forged_identity_cannot_name_admin() -> Result<()> {
    let harness = Harness::new(default_config())?;
    let generation = harness.create_auction()?;

    // Valid proofs, but the identity ciphertext seals the administrator
    let call = harness.ledger.with_backend(|backend| -> Result<AuctionCall, FheError> {
        let ctx = ProofContext::new(CONTRACT, bidder(1));
        let (encrypted_amount, amount_proof) =
            backend.encrypt_input(Plaintext::Uint64(500), &ctx)?;
        let (encrypted_identity, identity_proof) =
            backend.encrypt_input(Plaintext::Address(ADMIN), &ctx)?;
        Ok(AuctionCall::SubmitBid {
            encrypted_amount,
            encrypted_identity,
            amount_proof,
            identity_proof,
        })
    })?;
    harness.ledger.execute(bidder(1), call)?;
    harness.bid(bidder(2), 10)?;

    harness.end_bidding();
    harness.finalize()?;
    let winner = harness.reveal(generation)?;
    assert_eq!(winner, bidder(1));

    // Nobody holds a grant on the address ciphertext
    let record = harness.winner_record(generation)?.context("winner")?;
    let address = harness
        .ledger
        .user_decrypt(&record.encrypted_winner_address, &ORACLE);
    assert_eq!(address, Err(FheError::AccessDenied));
    Ok(())
}
