//! Auction module error types.

use thiserror::Error;

use auction_fhe::FheError;
use auction_types::BidIndex;

/// Errors that can occur in the auction module.
///
/// Every handler checks its preconditions before mutating state, so any of
/// these means the call had no effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Invalid input proof")]
    InvalidProof,

    #[error("Auction not active")]
    AuctionNotActive,

    #[error("Auction not ended")]
    AuctionNotEnded,

    #[error("Auction already finalized")]
    AlreadyFinalized,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Compute budget exceeded: need {required}, ceiling {available}")]
    ComputeBudgetExceeded { required: u64, available: u64 },

    #[error("Access grant already exists")]
    GrantAlreadyExists,

    #[error("Batched finalization in progress")]
    FinalizationInProgress,

    #[error("Invalid duration {duration}s: allowed {min}..={max}")]
    InvalidDuration { duration: u64, min: u64, max: u64 },

    #[error("Metadata reference must not be empty")]
    InvalidMetadata,

    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Bid not found: {0}")]
    BidNotFound(BidIndex),

    #[error("Bid registry full: no index left for generation {0}")]
    RegistryFull(u64),

    #[error("Auction {0} has no winner")]
    NoWinner(u64),

    #[error("Auction not finalized")]
    NotFinalized,

    #[error("Winner already revealed")]
    WinnerAlreadyRevealed,

    #[error("Winner not revealed")]
    WinnerNotRevealed,

    #[error("Invalid winner index {0}")]
    InvalidWinnerIndex(BidIndex),

    #[error("Already minted")]
    AlreadyMinted,

    #[error("Decryption oracle not configured")]
    OracleNotConfigured,

    #[error("Encryption backend error: {0}")]
    Backend(#[from] FheError),
}

impl AuctionError {
    /// Whether the same call may succeed later without any other change:
    /// after the end time passes, or via batched finalization.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuctionError::AuctionNotEnded | AuctionError::ComputeBudgetExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(AuctionError::AuctionNotEnded.is_retryable());
        assert!(AuctionError::ComputeBudgetExceeded {
            required: 10,
            available: 5
        }
        .is_retryable());
        assert!(!AuctionError::AlreadyFinalized.is_retryable());
        assert!(!AuctionError::InvalidProof.is_retryable());
        assert!(!AuctionError::RegistryFull(1).is_retryable());
    }

    #[test]
    fn test_backend_error_conversion() {
        let err: AuctionError = FheError::AccessDenied.into();
        assert_eq!(err, AuctionError::Backend(FheError::AccessDenied));
    }
}
