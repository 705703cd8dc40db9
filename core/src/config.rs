//! Configuration types for KESTREL

use serde::{Deserialize, Serialize};

/// Deterministic function deriving voting power from stake.
///
/// Fixed at configuration time for an epoch; every node must use the same
/// weighting or quorum arithmetic diverges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeWeighting {
    /// Voting power equals stake.
    Linear,
    /// Every registered validator carries one unit of power.
    Uniform,
}

impl StakeWeighting {
    pub fn power_of(&self, stake: u128) -> u128 {
        match self {
            StakeWeighting::Linear => stake,
            StakeWeighting::Uniform => 1,
        }
    }
}

/// Consensus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Stake-to-power weighting function for the epoch
    pub stake_weighting: StakeWeighting,

    /// Capacity of the outbound consensus event channel
    pub event_capacity: usize,

    /// Largest validator-set size the exhaustive quorum-intersection
    /// check in the safety monitor will enumerate
    pub intersection_check_limit: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            stake_weighting: StakeWeighting::Linear,
            event_capacity: 256,
            intersection_check_limit: 12,
        }
    }
}
