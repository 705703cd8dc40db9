//! Incremental quorum evaluation
//!
//! Approving power per proposal is maintained as counted votes arrive,
//! O(1) amortized per vote. Nothing here rescans the vote log.

use kestrel_core::{ProposalRef, ValidatorId, VotingPower};
use std::collections::{BTreeSet, HashMap};

/// Running approval tally for one proposal.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    approving_power: VotingPower,
    signatories: BTreeSet<ValidatorId>,
}

impl Tally {
    pub fn approving_power(&self) -> VotingPower {
        self.approving_power
    }

    /// Validators whose counted approving vote contributed to this tally.
    pub fn signatories(&self) -> &BTreeSet<ValidatorId> {
        &self.signatories
    }
}

/// Per-round quorum evaluator over all proposals of the round.
#[derive(Debug, Default)]
pub struct QuorumEvaluator {
    tallies: HashMap<ProposalRef, Tally>,
}

impl QuorumEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a first approving vote. The ledger guarantees at most one
    /// counted vote per validator per round, so a voter can appear in at
    /// most one tally; the insert is a no-op on a repeated signatory.
    ///
    /// Returns the proposal's approving power after the update.
    pub fn count_approval(
        &mut self,
        proposal: ProposalRef,
        voter: ValidatorId,
        power: VotingPower,
    ) -> VotingPower {
        let tally = self.tallies.entry(proposal).or_default();
        if tally.signatories.insert(voter) {
            tally.approving_power = tally.approving_power.saturating_add(power);
        }
        tally.approving_power
    }

    /// Approving power accumulated for a proposal
    pub fn approving_power(&self, proposal: &ProposalRef) -> VotingPower {
        self.tallies
            .get(proposal)
            .map(|t| t.approving_power)
            .unwrap_or(VotingPower::ZERO)
    }

    /// Strict two-thirds test against the given total power
    pub fn has_quorum(&self, proposal: &ProposalRef, total: VotingPower) -> bool {
        self.approving_power(proposal).exceeds_two_thirds_of(total)
    }

    /// Tally for a proposal, if any approving vote was counted
    pub fn tally(&self, proposal: &ProposalRef) -> Option<&Tally> {
        self.tallies.get(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::Hash;

    fn vid(byte: u8) -> ValidatorId {
        ValidatorId::from_bytes([byte; 32])
    }

    fn pref(byte: u8) -> ProposalRef {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_incremental_tally() {
        let mut eval = QuorumEvaluator::new();
        let p = pref(1);

        assert_eq!(eval.approving_power(&p), VotingPower::ZERO);
        eval.count_approval(p, vid(1), VotingPower::new(1));
        eval.count_approval(p, vid(2), VotingPower::new(1));
        assert_eq!(eval.approving_power(&p), VotingPower::new(2));
        assert!(!eval.has_quorum(&p, VotingPower::new(4)));

        eval.count_approval(p, vid(3), VotingPower::new(1));
        assert_eq!(eval.approving_power(&p), VotingPower::new(3));
        assert!(eval.has_quorum(&p, VotingPower::new(4)));
    }

    #[test]
    fn test_repeated_signatory_not_double_counted() {
        let mut eval = QuorumEvaluator::new();
        let p = pref(1);

        eval.count_approval(p, vid(1), VotingPower::new(5));
        eval.count_approval(p, vid(1), VotingPower::new(5));
        assert_eq!(eval.approving_power(&p), VotingPower::new(5));
        assert_eq!(eval.tally(&p).unwrap().signatories().len(), 1);
    }

    #[test]
    fn test_tallies_are_per_proposal() {
        let mut eval = QuorumEvaluator::new();
        eval.count_approval(pref(1), vid(1), VotingPower::new(3));
        eval.count_approval(pref(2), vid(2), VotingPower::new(1));

        assert_eq!(eval.approving_power(&pref(1)), VotingPower::new(3));
        assert_eq!(eval.approving_power(&pref(2)), VotingPower::new(1));
        assert!(eval.has_quorum(&pref(1), VotingPower::new(4)));
        assert!(!eval.has_quorum(&pref(2), VotingPower::new(4)));
    }
}
