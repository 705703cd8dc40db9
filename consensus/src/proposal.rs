//! Proposal records for consensus

use kestrel_core::{Hash, Hashable, ProposalRef, Round, Timestamp, ValidatorId, Value};
use serde::{Deserialize, Serialize};

/// A proposed value for one round. Immutable once accepted.
///
/// The proposal id is content-derived: re-submitting the same
/// `(round, proposer, value)` triple yields the same `ProposalRef`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Content-derived proposal id
    pub id: ProposalRef,
    /// Proposing validator
    pub proposer: ValidatorId,
    /// Round this proposal targets
    pub round: Round,
    /// The value under agreement
    pub value: Value,
    /// Arrival timestamp, audit only
    pub timestamp: Timestamp,
}

impl Proposal {
    pub fn new(round: Round, proposer: ValidatorId, value: Value) -> Self {
        let id = Self::derive_id(round, &proposer, &value);
        Self {
            id,
            proposer,
            round,
            value,
            timestamp: Timestamp::now(),
        }
    }

    /// Derive the content id for a proposal
    pub fn derive_id(round: Round, proposer: &ValidatorId, value: &Value) -> ProposalRef {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"KESTREL_PROPOSAL:");
        hasher.update(&round.0.to_le_bytes());
        hasher.update(proposer.as_bytes());
        hasher.update(value.as_bytes());
        Hash::from_bytes(*hasher.finalize().as_bytes())
    }
}

impl Hashable for Proposal {
    fn hash(&self) -> Hash {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(byte: u8) -> ValidatorId {
        ValidatorId::from_bytes([byte; 32])
    }

    #[test]
    fn test_proposal_id_is_content_derived() {
        let a = Proposal::new(Round::new(1), vid(1), Value::from("v1"));
        let b = Proposal::new(Round::new(1), vid(1), Value::from("v1"));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_proposal_id_distinguishes_content() {
        let base = Proposal::new(Round::new(1), vid(1), Value::from("v1"));

        let other_value = Proposal::new(Round::new(1), vid(1), Value::from("v2"));
        assert_ne!(base.id, other_value.id);

        let other_round = Proposal::new(Round::new(2), vid(1), Value::from("v1"));
        assert_ne!(base.id, other_round.id);

        let other_proposer = Proposal::new(Round::new(1), vid(2), Value::from("v1"));
        assert_ne!(base.id, other_proposer.id);
    }
}
