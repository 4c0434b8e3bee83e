//! Genesis configuration for the auction module.
//!
//! This module defines the deployment-time configuration: who administers
//! auctions, which collaborators may call back in, and the compute ceiling
//! that bounds finalization.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use auction_types::Address;

/// Genesis configuration for the auction module.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// Only address allowed to create auctions
    #[serde_as(as = "Hex")]
    pub admin: Address,

    /// Identity of this auction contract; input proofs must be bound to it
    #[serde_as(as = "Hex")]
    pub contract_address: Address,

    /// Decryption oracle that publishes the winning index; required
    #[serde_as(as = "Option<Hex>")]
    pub oracle: Option<Address>,

    /// External minter allowed to record the mint
    #[serde_as(as = "Option<Hex>")]
    pub minter: Option<Address>,

    /// Also grant the oracle access to the winning amount
    #[serde(default)]
    pub grant_oracle_amount_access: bool,

    #[serde(default)]
    pub finalize_policy: FinalizePolicy,

    #[serde(default)]
    pub compute_budget: ComputeBudget,

    #[serde(default)]
    pub lifecycle: LifecycleParams,
}

/// Who may call `smart_finalize` / `finalize_batch`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    #[default]
    Anyone,
    AdminOnly,
}

/// Per-call compute ceiling and per-operation costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeBudget {
    /// Maximum units one call may spend on ciphertext operations
    pub per_call_ceiling: u64,
    pub comparison_cost: u64,
    pub select_cost: u64,
    pub encrypt_cost: u64,
}

impl ComputeBudget {
    /// Cost of folding one more bid into the running maximum: index and
    /// identity encryption, one comparison and three selects.
    ///
    /// Saturates at `u64::MAX`; [`AuctionGenesisConfig::validate`] rejects
    /// budgets where it would.
    pub fn step_cost(&self) -> u64 {
        self.checked_step_cost().unwrap_or(u64::MAX)
    }

    /// Cost of seeding the running maximum from the first eligible bid.
    pub fn seed_cost(&self) -> u64 {
        self.encrypt_cost.saturating_mul(2)
    }

    /// Total cost of a tournament over `eligible` bids, saturating.
    pub fn tournament_cost(&self, eligible: usize) -> u64 {
        if eligible < 2 {
            return 0;
        }
        let steps = u64::try_from(eligible - 1).unwrap_or(u64::MAX);
        self.seed_cost()
            .saturating_add(steps.saturating_mul(self.step_cost()))
    }

    /// Largest eligible-bid count a single call can finalize.
    pub fn max_bids_per_call(&self) -> u64 {
        let step = self.step_cost().max(1);
        (self.per_call_ceiling.saturating_sub(self.seed_cost()) / step).saturating_add(1)
    }

    fn checked_step_cost(&self) -> Option<u64> {
        self.encrypt_cost
            .checked_mul(2)?
            .checked_add(self.comparison_cost)?
            .checked_add(self.select_cost.checked_mul(3)?)
    }

    /// Seed plus one step, or `None` if the costs overflow.
    fn checked_minimum(&self) -> Option<u64> {
        self.encrypt_cost
            .checked_mul(2)?
            .checked_add(self.checked_step_cost()?)
    }
}

impl Default for ComputeBudget {
    fn default() -> Self {
        Self {
            per_call_ceiling: 2_000_000,
            comparison_cost: 50_000,
            select_cost: 30_000,
            encrypt_cost: 10_000,
        }
    }
}

/// Bounds on auction creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleParams {
    /// Minimum bidding duration (seconds)
    pub min_duration: u64,
    /// Maximum bidding duration (seconds)
    pub max_duration: u64,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            min_duration: 60,            // 1 minute
            max_duration: 30 * 24 * 3600, // 30 days
        }
    }
}

impl Default for AuctionGenesisConfig {
    fn default() -> Self {
        Self {
            admin: [0u8; 32],
            contract_address: [0u8; 32],
            oracle: None,
            minter: None,
            grant_oracle_amount_access: false,
            finalize_policy: FinalizePolicy::default(),
            compute_budget: ComputeBudget::default(),
            lifecycle: LifecycleParams::default(),
        }
    }
}

impl AuctionGenesisConfig {
    /// Create a config for the given admin and contract identity.
    pub fn new(admin: Address, contract_address: Address) -> Self {
        Self {
            admin,
            contract_address,
            ..Default::default()
        }
    }

    /// Parse a JSON config file.
    pub fn from_json(json: &str) -> Result<Self, GenesisValidationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GenesisValidationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.lifecycle.min_duration == 0 {
            return Err(GenesisValidationError::InvalidLifecycle(
                "Minimum duration cannot be zero".into(),
            ));
        }
        if self.lifecycle.min_duration > self.lifecycle.max_duration {
            return Err(GenesisValidationError::InvalidLifecycle(
                "Minimum duration exceeds maximum".into(),
            ));
        }

        // A call must be able to seed the tournament and fold at least one bid
        let budget = &self.compute_budget;
        let minimum = budget
            .checked_minimum()
            .ok_or(GenesisValidationError::ComputeCostOverflow)?;
        if budget.per_call_ceiling < minimum {
            return Err(GenesisValidationError::InvalidComputeBudget {
                ceiling: budget.per_call_ceiling,
                minimum,
            });
        }

        // Without an oracle a tournament winner could never be revealed
        if self.oracle.is_none() {
            return Err(GenesisValidationError::OracleRequired);
        }

        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid lifecycle parameters: {0}")]
    InvalidLifecycle(String),

    #[error("Compute ceiling {ceiling} below one tournament step ({minimum})")]
    InvalidComputeBudget { ceiling: u64, minimum: u64 },

    #[error("Operation costs overflow the compute unit range")]
    ComputeCostOverflow,

    #[error("A decryption oracle must be configured")]
    OracleRequired,

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuctionGenesisConfig {
        let mut config = AuctionGenesisConfig::new([1u8; 32], [2u8; 32]);
        config.oracle = Some([5u8; 32]);
        config
    }

    #[test]
    fn test_default_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_min_duration_zero() {
        let mut config = AuctionGenesisConfig::default();
        config.lifecycle.min_duration = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidLifecycle(_))
        ));
    }

    #[test]
    fn test_invalid_min_exceeds_max() {
        let mut config = AuctionGenesisConfig::default();
        config.lifecycle.min_duration = 100;
        config.lifecycle.max_duration = 50;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidLifecycle(_))
        ));
    }

    #[test]
    fn test_ceiling_too_small() {
        let mut config = AuctionGenesisConfig::default();
        config.compute_budget.per_call_ceiling = 1;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidComputeBudget { .. })
        ));
    }

    #[test]
    fn test_oracle_required() {
        let mut config = valid_config();
        config.oracle = None;
        assert_eq!(config.validate(), Err(GenesisValidationError::OracleRequired));

        config.grant_oracle_amount_access = true;
        assert_eq!(config.validate(), Err(GenesisValidationError::OracleRequired));

        config.oracle = Some([5u8; 32]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overflowing_costs_rejected() {
        let mut config = valid_config();
        config.compute_budget = ComputeBudget {
            per_call_ceiling: u64::MAX,
            comparison_cost: u64::MAX / 4,
            select_cost: u64::MAX / 2,
            encrypt_cost: 1,
        };
        assert_eq!(config.validate(), Err(GenesisValidationError::ComputeCostOverflow));
        assert_eq!(config.compute_budget.step_cost(), u64::MAX);
    }

    #[test]
    fn test_large_costs_saturate() {
        // Valid on its own, but a long tournament exceeds the unit range
        let budget = ComputeBudget {
            per_call_ceiling: u64::MAX,
            comparison_cost: u64::MAX / 4,
            select_cost: 1,
            encrypt_cost: 1,
        };
        let mut config = valid_config();
        config.compute_budget = budget;
        assert!(config.validate().is_ok());

        assert_eq!(budget.tournament_cost(6), u64::MAX);
        assert_eq!(budget.tournament_cost(usize::MAX), u64::MAX);
        assert_eq!(budget.max_bids_per_call(), 4);

        let tiny = ComputeBudget {
            per_call_ceiling: u64::MAX,
            comparison_cost: 0,
            select_cost: 0,
            encrypt_cost: 0,
        };
        assert_eq!(tiny.max_bids_per_call(), u64::MAX);
    }

    #[test]
    fn test_from_json_overflowing_costs() {
        let json = format!(
            r#"{{
                "admin": "{}",
                "contract_address": "{}",
                "oracle": "{}",
                "compute_budget": {{
                    "per_call_ceiling": 1000,
                    "comparison_cost": 1,
                    "select_cost": {},
                    "encrypt_cost": 1
                }}
            }}"#,
            "11".repeat(32),
            "22".repeat(32),
            "33".repeat(32),
            i64::MAX
        );
        assert_eq!(
            AuctionGenesisConfig::from_json(&json),
            Err(GenesisValidationError::ComputeCostOverflow)
        );
    }

    #[test]
    fn test_budget_arithmetic() {
        let budget = ComputeBudget {
            per_call_ceiling: 1_000,
            comparison_cost: 100,
            select_cost: 50,
            encrypt_cost: 10,
        };
        assert_eq!(budget.step_cost(), 270);
        assert_eq!(budget.seed_cost(), 20);
        assert_eq!(budget.tournament_cost(0), 0);
        assert_eq!(budget.tournament_cost(1), 0);
        assert_eq!(budget.tournament_cost(3), 20 + 2 * 270);
        // (1000 - 20) / 270 = 3 steps, plus the seed bid
        assert_eq!(budget.max_bids_per_call(), 4);
        assert!(budget.tournament_cost(4) <= budget.per_call_ceiling);
        assert!(budget.tournament_cost(5) > budget.per_call_ceiling);
    }

    #[test]
    fn test_from_json() {
        let admin = "11".repeat(32);
        let contract = "22".repeat(32);
        let oracle = "33".repeat(32);
        let json = format!(
            r#"{{
                "admin": "{admin}",
                "contract_address": "{contract}",
                "oracle": "{oracle}",
                "finalize_policy": "admin_only"
            }}"#
        );
        let config = AuctionGenesisConfig::from_json(&json).unwrap();
        assert_eq!(config.admin, [0x11u8; 32]);
        assert_eq!(config.contract_address, [0x22u8; 32]);
        assert_eq!(config.finalize_policy, FinalizePolicy::AdminOnly);
        assert_eq!(config.compute_budget, ComputeBudget::default());
        assert_eq!(config.oracle, Some([0x33u8; 32]));
        assert!(config.minter.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            AuctionGenesisConfig::from_json("{"),
            Err(GenesisValidationError::Parse(_))
        ));
    }
}
