//! Sealed-bid auction module with confidential bid comparison.
//!
//! Bids arrive as ciphertexts with input proofs. After the bidding window
//! closes the module picks the highest bid with homomorphic comparisons,
//! never decrypting a losing bid, and grants the winner alone the right to
//! decrypt the winning amount.
//!
//! # Architecture
//!
//! The module follows a handler/query split:
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `state`: Module state structures
//! - `lifecycle`: Auction generations and phases
//! - `registry`: Proof-checked bid storage
//! - `tournament`: Encrypted maximum selection and compute metering
//! - `access`: Decryption grants
//! - `ledger`: Single-threaded chain harness with a simulated clock
//! - `genesis`: Deployment configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{AuctionCall, AuctionGenesisConfig, Ledger};
//!
//! let ledger = Ledger::new(AuctionGenesisConfig::new(admin, contract), backend, verifier)?;
//! ledger.execute(admin, AuctionCall::CreateAuction { duration: 3600, metadata_reference })?;
//! ledger.execute(bidder, AuctionCall::SubmitBid { .. })?;
//! ledger.advance_time(3600);
//! ledger.execute(anyone, AuctionCall::SmartFinalize)?;
//! ```

pub mod access;
pub mod call;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod ledger;
pub mod lifecycle;
pub mod queries;
pub mod registry;
pub mod state;
pub mod tournament;

pub use access::{AccessControlList, GrantOutcome};
pub use call::AuctionCall;
pub use error::AuctionError;
pub use events::{AuctionEvent, FinalizationReason};
pub use genesis::{
    AuctionGenesisConfig, ComputeBudget, FinalizePolicy, GenesisValidationError, LifecycleParams,
};
pub use handlers::{BatchOutcome, CallContext, FinalizationOutcome, HandlerResult};
pub use ledger::{CallOutput, CallReceipt, Ledger};
pub use queries::{AuctionQuery, AuctionQueryResponse, FinalizationProgress, MintableWinner};
pub use state::AuctionState;
pub use tournament::{ComputeMeter, TournamentProgress, TournamentSelector};
