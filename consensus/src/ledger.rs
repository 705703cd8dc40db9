//! Per-round append-only proposal/vote ledger
//!
//! Records are created by message arrival and never mutated. The ledger
//! enforces first-vote-wins per validator: later votes from the same
//! validator in the same round become evidence, never tally input.

use crate::proposal::Proposal;
use crate::vote::{DuplicateVoteEvidence, Vote, VoteOutcome};
use kestrel_core::{ProposalRef, Round, ValidatorId, VoteRef};
use std::collections::HashMap;
use tracing::debug;

/// Append-only ledger for one round.
#[derive(Debug)]
pub struct RoundLedger {
    round: Round,
    proposals: HashMap<ProposalRef, Proposal>,
    proposal_order: Vec<ProposalRef>,
    votes: Vec<Vote>,
    first_by_voter: HashMap<ValidatorId, VoteRef>,
    evidence: Vec<DuplicateVoteEvidence>,
}

impl RoundLedger {
    pub fn new(round: Round) -> Self {
        Self {
            round,
            proposals: HashMap::new(),
            proposal_order: Vec::new(),
            votes: Vec::new(),
            first_by_voter: HashMap::new(),
            evidence: Vec::new(),
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    /// Record a proposal. Idempotent: a proposal with the same content id
    /// is accepted again without creating a second record.
    ///
    /// Returns true if the proposal was newly recorded.
    pub fn record_proposal(&mut self, proposal: Proposal) -> bool {
        debug_assert_eq!(proposal.round, self.round);
        if self.proposals.contains_key(&proposal.id) {
            return false;
        }
        self.proposal_order.push(proposal.id);
        self.proposals.insert(proposal.id, proposal);
        true
    }

    pub fn has_proposal(&self, id: &ProposalRef) -> bool {
        self.proposals.contains_key(id)
    }

    pub fn proposal(&self, id: &ProposalRef) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    /// Proposals in acceptance order
    pub fn proposals(&self) -> Vec<&Proposal> {
        self.proposal_order
            .iter()
            .filter_map(|id| self.proposals.get(id))
            .collect()
    }

    /// Record a vote. The first vote per validator is counted and gets a
    /// `VoteRef`; every later vote from the same validator is preserved as
    /// duplicate evidence and leaves the counted log untouched.
    pub fn record_vote(&mut self, vote: Vote) -> VoteOutcome {
        debug_assert_eq!(vote.round, self.round);
        if let Some(&first) = self.first_by_voter.get(&vote.voter) {
            debug!(
                "Duplicate vote from {} in {} (first was {})",
                vote.voter, self.round, first
            );
            let evidence = DuplicateVoteEvidence {
                round: self.round,
                voter: vote.voter,
                first,
                duplicate: vote,
            };
            self.evidence.push(evidence.clone());
            return VoteOutcome::Duplicate(evidence);
        }

        let vote_ref = VoteRef::new(self.votes.len() as u64);
        self.first_by_voter.insert(vote.voter, vote_ref);
        self.votes.push(vote);
        VoteOutcome::Counted(vote_ref)
    }

    /// Counted votes for a proposal
    pub fn votes_for(&self, proposal: &ProposalRef) -> Vec<Vote> {
        self.votes
            .iter()
            .filter(|v| v.proposal == *proposal)
            .cloned()
            .collect()
    }

    /// All counted votes in acceptance order
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn vote(&self, vote_ref: VoteRef) -> Option<&Vote> {
        self.votes.get(vote_ref.0 as usize)
    }

    /// The counted vote of a validator in this round, if any
    pub fn counted_vote_of(&self, voter: &ValidatorId) -> Option<&Vote> {
        self.first_by_voter
            .get(voter)
            .and_then(|r| self.vote(*r))
    }

    /// Duplicate-vote evidence accumulated this round
    pub fn evidence(&self) -> &[DuplicateVoteEvidence] {
        &self.evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::{Round, Value};

    fn vid(byte: u8) -> ValidatorId {
        ValidatorId::from_bytes([byte; 32])
    }

    fn ledger_with_proposal() -> (RoundLedger, ProposalRef) {
        let mut ledger = RoundLedger::new(Round::new(1));
        let proposal = Proposal::new(Round::new(1), vid(1), Value::from("v1"));
        let id = proposal.id;
        assert!(ledger.record_proposal(proposal));
        (ledger, id)
    }

    #[test]
    fn test_proposal_resubmission_is_idempotent() {
        let (mut ledger, _) = ledger_with_proposal();
        let again = Proposal::new(Round::new(1), vid(1), Value::from("v1"));
        assert!(!ledger.record_proposal(again));
        assert_eq!(ledger.proposals().len(), 1);
    }

    #[test]
    fn test_first_vote_wins() {
        let (mut ledger, p) = ledger_with_proposal();

        let first = ledger.record_vote(Vote::new(Round::new(1), vid(2), p, true));
        assert_eq!(first, VoteOutcome::Counted(VoteRef::new(0)));

        // Second vote from the same validator, even a contradictory one,
        // becomes evidence and does not enter the counted log.
        let second = ledger.record_vote(Vote::new(Round::new(1), vid(2), p, false));
        match second {
            VoteOutcome::Duplicate(evidence) => {
                assert_eq!(evidence.voter, vid(2));
                assert_eq!(evidence.first, VoteRef::new(0));
                assert!(!evidence.duplicate.approve);
            }
            other => panic!("expected duplicate evidence, got {:?}", other),
        }

        assert_eq!(ledger.votes().len(), 1);
        assert_eq!(ledger.evidence().len(), 1);
        assert!(ledger.counted_vote_of(&vid(2)).unwrap().approve);
    }

    #[test]
    fn test_votes_for_filters_by_proposal() {
        let (mut ledger, p1) = ledger_with_proposal();
        let other = Proposal::new(Round::new(1), vid(3), Value::from("v2"));
        let p2 = other.id;
        ledger.record_proposal(other);

        ledger.record_vote(Vote::new(Round::new(1), vid(2), p1, true));
        ledger.record_vote(Vote::new(Round::new(1), vid(3), p2, true));
        ledger.record_vote(Vote::new(Round::new(1), vid(4), p1, false));

        let for_p1 = ledger.votes_for(&p1);
        assert_eq!(for_p1.len(), 2);
        assert!(for_p1.iter().all(|v| v.proposal == p1));
        assert_eq!(ledger.votes_for(&p2).len(), 1);
    }
}
