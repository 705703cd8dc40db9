//! Validator registry and quorum arithmetic

use dashmap::DashMap;
use kestrel_core::{
    ConsensusConfig, KestrelError, KestrelResult, Stake, StakeWeighting, ValidatorId, VotingPower,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Validator status, maintained out-of-band by an external reputation
/// system between epochs. Only `Active` validators count toward
/// membership, voting power, and quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorStatus {
    Active,
    Suspected,
    Slashed,
}

/// A registered validator with stake-derived voting power
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub id: ValidatorId,
    pub stake: Stake,
    pub voting_power: VotingPower,
    pub status: ValidatorStatus,
}

impl Validator {
    pub fn new(id: ValidatorId, stake: Stake, weighting: StakeWeighting) -> Self {
        Self {
            id,
            stake,
            voting_power: VotingPower::new(weighting.power_of(stake.0)),
            status: ValidatorStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Active
    }
}

/// Validator set for an epoch.
///
/// Read-mostly: registration and status changes happen out-of-band between
/// epochs, while the vote hot path only reads. The aggregate active power
/// is cached and adjusted incrementally on every mutation.
pub struct ValidatorSet {
    weighting: StakeWeighting,
    validators: DashMap<ValidatorId, Validator>,
    total_power: RwLock<VotingPower>,
    active_count: RwLock<usize>,
}

impl ValidatorSet {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            weighting: config.stake_weighting,
            validators: DashMap::new(),
            total_power: RwLock::new(VotingPower::ZERO),
            active_count: RwLock::new(0),
        }
    }

    /// Register a validator and derive its voting power.
    pub fn register(&self, id: ValidatorId, stake: Stake) -> KestrelResult<()> {
        if self.validators.contains_key(&id) {
            return Err(KestrelError::DuplicateValidator(id));
        }

        let validator = Validator::new(id, stake, self.weighting);
        let power = validator.voting_power;
        self.validators.insert(id, validator);
        {
            let mut total = self.total_power.write();
            *total = total.saturating_add(power);
        }
        *self.active_count.write() += 1;

        info!("Registered {} with stake {} (power {})", id, stake, power);
        Ok(())
    }

    /// Update a validator's status. Epoch-maintenance seam for an external
    /// reputation system; adjusts the cached aggregate power.
    pub fn set_status(&self, id: &ValidatorId, status: ValidatorStatus) -> KestrelResult<()> {
        let mut entry = self
            .validators
            .get_mut(id)
            .ok_or(KestrelError::NotRegistered(*id))?;

        let was_active = entry.is_active();
        entry.status = status;
        let is_active = entry.is_active();
        let power = entry.voting_power;
        drop(entry);

        if was_active && !is_active {
            let mut total = self.total_power.write();
            *total = total.saturating_sub(power);
            drop(total);
            *self.active_count.write() -= 1;
        } else if !was_active && is_active {
            let mut total = self.total_power.write();
            *total = total.saturating_add(power);
            drop(total);
            *self.active_count.write() += 1;
        }

        debug!("Validator {} status set to {:?}", id, status);
        Ok(())
    }

    /// Check active membership
    pub fn is_member(&self, id: &ValidatorId) -> bool {
        self.validators
            .get(id)
            .map(|v| v.is_active())
            .unwrap_or(false)
    }

    /// Get validator info
    pub fn get(&self, id: &ValidatorId) -> Option<Validator> {
        self.validators.get(id).map(|v| v.clone())
    }

    /// Voting power of an active validator
    pub fn voting_power_of(&self, id: &ValidatorId) -> Option<VotingPower> {
        self.validators
            .get(id)
            .filter(|v| v.is_active())
            .map(|v| v.voting_power)
    }

    /// Sum of voting power over active validators
    pub fn total_voting_power(&self) -> VotingPower {
        *self.total_power.read()
    }

    /// Number of active validators
    pub fn member_count(&self) -> usize {
        *self.active_count.read()
    }

    /// Largest Byzantine count the configured assumption `n >= 3f+1`
    /// tolerates for the current set: `f = (n - 1) / 3`.
    pub fn max_byzantine(&self) -> usize {
        let n = self.member_count();
        if n == 0 {
            0
        } else {
            (n - 1) / 3
        }
    }

    /// Minimum approving power that crosses the strict two-thirds bound:
    /// the smallest `p` with `p * 3 > total * 2`.
    pub fn quorum_threshold(&self) -> VotingPower {
        VotingPower::new(self.total_voting_power().0 * 2 / 3 + 1)
    }

    /// Strict two-thirds quorum test against the current total power.
    pub fn quorum_reached(&self, approving: VotingPower) -> bool {
        approving.exceeds_two_thirds_of(self.total_voting_power())
    }

    /// All active validators
    pub fn active_validators(&self) -> Vec<Validator> {
        self.validators
            .iter()
            .filter(|v| v.is_active())
            .map(|v| v.clone())
            .collect()
    }
}

/// Shared validator set snapshot
pub type SharedValidatorSet = Arc<ValidatorSet>;
