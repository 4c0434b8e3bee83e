//! Decryption grants.
//!
//! The grant log is append-only: once a party may decrypt a ciphertext it
//! always may. The encryption backend consults it through [`AccessPolicy`].

use std::collections::HashSet;

use tracing::debug;

use auction_fhe::AccessPolicy;
use auction_types::{AccessGrant, Address, CiphertextId};

use crate::error::AuctionError;

/// Result of a grant request that tolerates repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    AlreadyGranted,
}

#[derive(Debug, Default)]
pub struct AccessControlList {
    grants: Vec<AccessGrant>,
    index: HashSet<(CiphertextId, Address)>,
}

impl AccessControlList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Fails with `GrantAlreadyExists` on a repeat.
    pub fn grant(
        &mut self,
        ciphertext: CiphertextId,
        grantee: Address,
        generation: u64,
        granted_at: u64,
    ) -> Result<(), AuctionError> {
        if !self.index.insert((ciphertext, grantee)) {
            return Err(AuctionError::GrantAlreadyExists);
        }
        self.grants.push(AccessGrant {
            ciphertext,
            grantee,
            generation,
            granted_at,
        });
        Ok(())
    }

    /// Grant, treating a repeat as a successful no-op.
    pub fn ensure_grant(
        &mut self,
        ciphertext: CiphertextId,
        grantee: Address,
        generation: u64,
        granted_at: u64,
    ) -> GrantOutcome {
        match self.grant(ciphertext, grantee, generation, granted_at) {
            Ok(()) => GrantOutcome::Granted,
            Err(_) => {
                debug!(%ciphertext, "grant already exists");
                GrantOutcome::AlreadyGranted
            }
        }
    }

    /// Let the winner (and the oracle, if given) decrypt the winning amount.
    ///
    /// Returns the grants newly issued by this call.
    pub fn grant_winner_access(
        &mut self,
        winner: Address,
        winning_amount: CiphertextId,
        oracle: Option<Address>,
        generation: u64,
        granted_at: u64,
    ) -> Vec<AccessGrant> {
        let before = self.grants.len();
        let grantees = std::iter::once(winner).chain(oracle);
        for grantee in grantees {
            self.ensure_grant(winning_amount, grantee, generation, granted_at);
        }
        self.grants[before..].to_vec()
    }

    pub fn is_allowed(&self, ciphertext: &CiphertextId, who: &Address) -> bool {
        self.index.contains(&(*ciphertext, *who))
    }

    pub fn grants(&self) -> &[AccessGrant] {
        &self.grants
    }

    /// Grants issued for one auction generation.
    pub fn grants_for(&self, generation: u64) -> impl Iterator<Item = &AccessGrant> {
        self.grants.iter().filter(move |g| g.generation == generation)
    }
}

impl AccessPolicy for AccessControlList {
    fn is_allowed(&self, ciphertext: &CiphertextId, requester: &Address) -> bool {
        AccessControlList::is_allowed(self, ciphertext, requester)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: CiphertextId = CiphertextId([9u8; 32]);
    const OTHER: CiphertextId = CiphertextId([8u8; 32]);
    const WINNER: Address = [1u8; 32];
    const ORACLE: Address = [2u8; 32];

    #[test]
    fn test_grant_once() {
        let mut acl = AccessControlList::new();
        assert!(acl.grant(CT, WINNER, 1, 100).is_ok());
        assert_eq!(acl.grant(CT, WINNER, 1, 101), Err(AuctionError::GrantAlreadyExists));
        assert_eq!(acl.grants().len(), 1);
        assert_eq!(acl.grants()[0].granted_at, 100);
    }

    #[test]
    fn test_grants_are_per_ciphertext() {
        let mut acl = AccessControlList::new();
        acl.grant(CT, WINNER, 1, 100).unwrap();

        assert!(acl.is_allowed(&CT, &WINNER));
        assert!(!acl.is_allowed(&OTHER, &WINNER));
        assert!(!acl.is_allowed(&CT, &ORACLE));
    }

    #[test]
    fn test_winner_access_is_retry_safe() {
        let mut acl = AccessControlList::new();

        let issued = acl.grant_winner_access(WINNER, CT, Some(ORACLE), 1, 100);
        assert_eq!(issued.len(), 2);
        assert!(acl.is_allowed(&CT, &ORACLE));

        let issued = acl.grant_winner_access(WINNER, CT, Some(ORACLE), 1, 200);
        assert!(issued.is_empty());
        assert_eq!(acl.grants().len(), 2);
    }

    #[test]
    fn test_ensure_grant_outcome() {
        let mut acl = AccessControlList::new();
        assert_eq!(acl.ensure_grant(CT, WINNER, 1, 0), GrantOutcome::Granted);
        assert_eq!(acl.ensure_grant(CT, WINNER, 1, 0), GrantOutcome::AlreadyGranted);
    }

    #[test]
    fn test_grants_for_generation() {
        let mut acl = AccessControlList::new();
        acl.grant(CT, WINNER, 1, 0).unwrap();
        acl.grant(OTHER, WINNER, 2, 0).unwrap();
        assert_eq!(acl.grants_for(2).count(), 1);
    }
}
