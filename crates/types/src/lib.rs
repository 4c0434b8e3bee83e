//! Core type definitions for confidential sealed-bid auctions.
//!
//! This crate provides the shared data structures used across the auction system:
//! ciphertext wire types, the auction record, bids, winner records and access grants.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod ciphertext;

pub use ciphertext::{Ciphertext, CiphertextId, EncryptedInput, InputProof, Plaintext, ValueKind};

// =========================
// AUCTION TYPES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Position of a bid within its auction, assigned in submission order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct BidIndex(pub u32);

impl BidIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BidIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Auction lifecycle phase.
///
/// Only `initialized`/`finalized`/`minted` are stored; the phase is derived
/// from those flags, the clock, and whether a batched finalization is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionPhase {
    /// No auction has been created yet
    Uninitialized,
    /// Accepting bids
    Open,
    /// End time reached, awaiting finalization
    Ended,
    /// Batched tournament in progress
    Finalizing,
    /// Outcome locked
    Finalized,
    /// Winner token minted by the external minter
    Minted,
}

/// The auction record. One per generation; never deleted.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub generation: u64,
    pub admin_address: Address,

    // Timing
    pub start_time: u64,
    pub end_time: u64,

    // Flags
    pub initialized: bool,
    pub finalized: bool,
    pub minted: bool,

    /// Opaque content identifier for artwork/description
    pub metadata_reference: String,
}

impl Auction {
    pub fn has_ended(&self, now: u64) -> bool {
        now >= self.end_time
    }

    pub fn details(&self) -> AuctionDetails {
        AuctionDetails {
            generation: self.generation,
            metadata_reference: self.metadata_reference.clone(),
            end_time: self.end_time,
            finalized: self.finalized,
            initialized: self.initialized,
        }
    }
}

/// Public view of the current auction.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionDetails {
    pub generation: u64,
    pub metadata_reference: String,
    pub end_time: u64,
    pub finalized: bool,
    pub initialized: bool,
}

/// A submitted bid. Both handles passed proof verification before storage.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub index: BidIndex,
    /// Generation of the auction this bid belongs to
    pub generation: u64,
    pub submitter: Address,
    pub encrypted_amount: Ciphertext,
    pub encrypted_submitter_id: Ciphertext,
    pub amount_proof: InputProof,
    pub identity_proof: InputProof,
    pub submitted_at: u64,
}

/// Outcome of a finalization that produced a winner.
///
/// The encrypted fields are fixed at finalization. `winner_index`/`winner`
/// are plaintext and filled in at most once: immediately when only one bid
/// was eligible, otherwise when the decryption oracle publishes the index.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub generation: u64,
    pub encrypted_winner_address: Ciphertext,
    pub encrypted_winning_amount: Ciphertext,
    /// Present only when the index was selected homomorphically
    pub encrypted_winner_index: Option<Ciphertext>,
    pub winner_index: Option<BidIndex>,
    pub winner: Option<Address>,
    /// Number of bids that took part after administrator exclusion
    pub eligible_bids: u32,
}

impl WinnerRecord {
    /// Record for the case where exactly one bid is eligible.
    ///
    /// `encrypted_winner_address` must seal `bid.submitter`; the
    /// bidder-supplied identity ciphertext is never trusted for this field.
    pub fn from_sole_bid(
        bid: &Bid,
        encrypted_winner_address: Ciphertext,
        eligible_bids: u32,
    ) -> Self {
        Self {
            generation: bid.generation,
            encrypted_winner_address,
            encrypted_winning_amount: bid.encrypted_amount.clone(),
            encrypted_winner_index: None,
            winner_index: Some(bid.index),
            winner: Some(bid.submitter),
            eligible_bids,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.winner_index.is_some()
    }
}

/// Permission for `grantee` to request decryption of one ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AccessGrant {
    pub ciphertext: CiphertextId,
    pub grantee: Address,
    pub generation: u64,
    pub granted_at: u64,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

/// Short hex form of an address for logs.
pub fn short_address(address: &Address) -> String {
    hex::encode(&address[..6])
}
