//! In-process ledger harness.
//!
//! Holds the module state, the encryption backend and a simulated clock
//! behind one lock, so calls are applied in a single global order. Each call
//! sees the block height and timestamp current when it is executed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use auction_fhe::{FheError, HomomorphicComparator, ProofVerifier, UserDecryptor};
use auction_types::{short_address, Address, BidIndex, Ciphertext, Plaintext};

use crate::call::AuctionCall;
use crate::events::AuctionEvent;
use crate::genesis::{AuctionGenesisConfig, GenesisValidationError};
use crate::handlers::{self, BatchOutcome, CallContext, FinalizationOutcome, HandlerResult};
use crate::queries::{handle_query, AuctionQuery, AuctionQueryResponse};
use crate::state::AuctionState as ModuleState;

/// Seconds per simulated block.
pub const BLOCK_TIME: u64 = 12;

/// Shared chain state.
struct ChainState<B> {
    /// Module state
    module: ModuleState,
    /// Encryption backend
    backend: B,
    /// Current block height (simulated)
    block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    timestamp: u64,
}

impl<B> ChainState<B> {
    fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME;
    }

    fn context(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }
}

/// Handler-specific result of a call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutput {
    AuctionCreated { generation: u64 },
    BidAccepted { index: BidIndex },
    Finalized(FinalizationOutcome),
    Batch(BatchOutcome),
    WinnerPublished { winner: Address },
    Minted { winner: Address },
}

/// Receipt of a successful call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReceipt {
    pub block_height: u64,
    pub timestamp: u64,
    pub output: CallOutput,
    /// Events emitted by this call, in order
    pub events: Vec<AuctionEvent>,
}

pub struct Ledger<B> {
    state: RwLock<ChainState<B>>,
}

impl<B: HomomorphicComparator> Ledger<B> {
    /// Validate the configuration and start an empty chain at time zero.
    pub fn new(
        config: AuctionGenesisConfig,
        backend: B,
        verifier: ProofVerifier,
    ) -> Result<Self, GenesisValidationError> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(ChainState {
                module: ModuleState::new(config, verifier),
                backend,
                block_height: 0,
                timestamp: 0,
            }),
        })
    }

    pub fn timestamp(&self) -> u64 {
        self.state.read().timestamp
    }

    pub fn block_height(&self) -> u64 {
        self.state.read().block_height
    }

    pub fn set_timestamp(&self, timestamp: u64) {
        let mut state = self.state.write();
        state.timestamp = timestamp;
        debug!(timestamp, "timestamp set");
    }

    /// Move the clock forward by `seconds`.
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state.write();
        state.timestamp = state.timestamp.saturating_add(seconds);
    }

    pub fn advance_block(&self) -> (u64, u64) {
        let mut state = self.state.write();
        state.advance_block();
        (state.block_height, state.timestamp)
    }

    /// Apply a call from `sender`. A failed call leaves the state unchanged.
    pub fn execute(&self, sender: Address, call: AuctionCall) -> HandlerResult<CallReceipt> {
        let mut guard = self.state.write();
        let chain = &mut *guard;
        let ctx = chain.context(sender);
        let name = call.name();
        let events_before = chain.module.events.len();

        let state = &mut chain.module;
        let result = match call {
            AuctionCall::CreateAuction {
                duration,
                metadata_reference,
            } => handlers::handle_create_auction(state, &ctx, duration, metadata_reference)
                .map(|generation| CallOutput::AuctionCreated { generation }),
            AuctionCall::SubmitBid {
                encrypted_amount,
                encrypted_identity,
                amount_proof,
                identity_proof,
            } => handlers::handle_submit_bid(
                state,
                &ctx,
                &encrypted_amount,
                &encrypted_identity,
                &amount_proof,
                &identity_proof,
            )
            .map(|index| CallOutput::BidAccepted { index }),
            AuctionCall::SmartFinalize => {
                handlers::handle_smart_finalize(state, &mut chain.backend, &ctx)
                    .map(CallOutput::Finalized)
            }
            AuctionCall::FinalizeBatch => {
                handlers::handle_finalize_batch(state, &mut chain.backend, &ctx)
                    .map(CallOutput::Batch)
            }
            AuctionCall::PublishWinner {
                generation,
                winner_index,
            } => handlers::handle_publish_winner(state, &ctx, generation, winner_index)
                .map(|winner| CallOutput::WinnerPublished { winner }),
            AuctionCall::RecordMint { generation } => {
                handlers::handle_record_mint(state, &ctx, generation)
                    .map(|winner| CallOutput::Minted { winner })
            }
        };

        match result {
            Ok(output) => Ok(CallReceipt {
                block_height: ctx.block_height,
                timestamp: ctx.timestamp,
                output,
                events: chain.module.events[events_before..].to_vec(),
            }),
            Err(e) => {
                warn!(call = name, sender = %short_address(&sender), error = %e, "call rejected");
                Err(e)
            }
        }
    }

    /// Run a query against the current clock.
    pub fn query(&self, query: AuctionQuery) -> HandlerResult<AuctionQueryResponse> {
        let state = self.state.read();
        handle_query(&state.module, query, state.timestamp)
    }

    /// Run `f` with exclusive access to the backend (e.g. to encrypt inputs).
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.state.write().backend)
    }

    /// Run `f` against a read-only view of the module state.
    pub fn with_state<R>(&self, f: impl FnOnce(&ModuleState) -> R) -> R {
        f(&self.state.read().module)
    }

    /// Full event log.
    pub fn events(&self) -> Vec<AuctionEvent> {
        self.state.read().module.events.clone()
    }
}

impl<B: HomomorphicComparator + UserDecryptor> Ledger<B> {
    /// Decrypt `ciphertext` for `requester`, subject to the grant log.
    pub fn user_decrypt(
        &self,
        ciphertext: &Ciphertext,
        requester: &Address,
    ) -> Result<Plaintext, FheError> {
        let state = self.state.read();
        state
            .backend
            .user_decrypt(ciphertext, requester, &state.module.access)
    }
}
