//! Auction lifecycle: one live auction at a time, tracked by generation.

use std::collections::BTreeMap;

use auction_types::{Address, Auction, AuctionPhase};

use crate::error::AuctionError;
use crate::genesis::LifecycleParams;

/// Owner of every auction record.
///
/// Generations start at 1; generation 0 means nothing has been created.
/// Past auctions stay in the archive.
#[derive(Debug, Default)]
pub struct AuctionLifecycle {
    generation: u64,
    auctions: BTreeMap<u64, Auction>,
}

impl AuctionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the most recently created auction.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> Option<&Auction> {
        self.auctions.get(&self.generation)
    }

    pub fn current_mut(&mut self) -> Option<&mut Auction> {
        self.auctions.get_mut(&self.generation)
    }

    pub fn get(&self, generation: u64) -> Option<&Auction> {
        self.auctions.get(&generation)
    }

    pub fn get_mut(&mut self, generation: u64) -> Option<&mut Auction> {
        self.auctions.get_mut(&generation)
    }

    pub fn auctions(&self) -> impl Iterator<Item = &Auction> {
        self.auctions.values()
    }

    /// Check that a new auction may be opened. No state is touched.
    pub fn check_can_create(
        &self,
        params: &LifecycleParams,
        now: u64,
        duration: u64,
        metadata_reference: &str,
    ) -> Result<(), AuctionError> {
        if let Some(current) = self.current() {
            if !current.finalized {
                return Err(AuctionError::AuctionNotActive);
            }
        }
        if duration < params.min_duration
            || duration > params.max_duration
            || now.checked_add(duration).is_none()
        {
            return Err(AuctionError::InvalidDuration {
                duration,
                min: params.min_duration,
                max: params.max_duration,
            });
        }
        if metadata_reference.trim().is_empty() {
            return Err(AuctionError::InvalidMetadata);
        }
        Ok(())
    }

    /// Open the next generation.
    pub fn create(
        &mut self,
        params: &LifecycleParams,
        admin: Address,
        now: u64,
        duration: u64,
        metadata_reference: String,
    ) -> Result<&Auction, AuctionError> {
        self.check_can_create(params, now, duration, &metadata_reference)?;

        self.generation += 1;
        let auction = Auction {
            generation: self.generation,
            admin_address: admin,
            start_time: now,
            end_time: now + duration,
            initialized: true,
            finalized: false,
            minted: false,
            metadata_reference,
        };
        Ok(self.auctions.entry(self.generation).or_insert(auction))
    }

    /// Phase of the current auction.
    pub fn phase(&self, now: u64, finalizing: bool) -> AuctionPhase {
        match self.current() {
            Some(auction) => phase_of(auction, now, finalizing),
            None => AuctionPhase::Uninitialized,
        }
    }
}

/// Derive the phase from stored flags and the clock.
pub fn phase_of(auction: &Auction, now: u64, finalizing: bool) -> AuctionPhase {
    if !auction.initialized {
        AuctionPhase::Uninitialized
    } else if auction.minted {
        AuctionPhase::Minted
    } else if auction.finalized {
        AuctionPhase::Finalized
    } else if finalizing {
        AuctionPhase::Finalizing
    } else if auction.has_ended(now) {
        AuctionPhase::Ended
    } else {
        AuctionPhase::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = [1u8; 32];

    fn params() -> LifecycleParams {
        LifecycleParams {
            min_duration: 10,
            max_duration: 1_000,
        }
    }

    #[test]
    fn test_create_first_auction() {
        let mut lifecycle = AuctionLifecycle::new();
        assert_eq!(lifecycle.phase(0, false), AuctionPhase::Uninitialized);

        let auction = lifecycle
            .create(&params(), ADMIN, 100, 50, "ipfs://a".to_string())
            .unwrap();
        assert_eq!(auction.generation, 1);
        assert_eq!(auction.end_time, 150);
        assert!(auction.initialized);
        assert!(!auction.finalized);

        assert_eq!(lifecycle.phase(149, false), AuctionPhase::Open);
        assert_eq!(lifecycle.phase(150, false), AuctionPhase::Ended);
        assert_eq!(lifecycle.phase(150, true), AuctionPhase::Finalizing);
    }

    #[test]
    fn test_create_requires_previous_finalized() {
        let mut lifecycle = AuctionLifecycle::new();
        lifecycle
            .create(&params(), ADMIN, 100, 50, "ipfs://a".to_string())
            .unwrap();

        let result = lifecycle.create(&params(), ADMIN, 500, 50, "ipfs://b".to_string());
        assert_eq!(result.unwrap_err(), AuctionError::AuctionNotActive);
        assert_eq!(lifecycle.generation(), 1);

        lifecycle.current_mut().unwrap().finalized = true;
        assert_eq!(lifecycle.phase(500, false), AuctionPhase::Finalized);

        let auction = lifecycle
            .create(&params(), ADMIN, 500, 50, "ipfs://b".to_string())
            .unwrap();
        assert_eq!(auction.generation, 2);
        assert!(lifecycle.get(1).unwrap().finalized);
        assert_eq!(lifecycle.auctions().count(), 2);
    }

    #[test]
    fn test_duration_bounds() {
        let lifecycle = AuctionLifecycle::new();
        assert!(matches!(
            lifecycle.check_can_create(&params(), 0, 5, "x"),
            Err(AuctionError::InvalidDuration { .. })
        ));
        assert!(matches!(
            lifecycle.check_can_create(&params(), 0, 5_000, "x"),
            Err(AuctionError::InvalidDuration { .. })
        ));
        assert!(matches!(
            lifecycle.check_can_create(&params(), u64::MAX, 10, "x"),
            Err(AuctionError::InvalidDuration { .. })
        ));
        assert!(lifecycle.check_can_create(&params(), 0, 10, "x").is_ok());
    }

    #[test]
    fn test_empty_metadata_rejected() {
        let lifecycle = AuctionLifecycle::new();
        assert_eq!(
            lifecycle.check_can_create(&params(), 0, 10, "  "),
            Err(AuctionError::InvalidMetadata)
        );
    }

    #[test]
    fn test_minted_phase() {
        let mut lifecycle = AuctionLifecycle::new();
        lifecycle
            .create(&params(), ADMIN, 0, 10, "ipfs://a".to_string())
            .unwrap();
        let auction = lifecycle.current_mut().unwrap();
        auction.finalized = true;
        auction.minted = true;
        assert_eq!(lifecycle.phase(100, false), AuctionPhase::Minted);
    }
}
