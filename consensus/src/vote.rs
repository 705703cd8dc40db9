//! Vote records and duplicate-vote evidence

use kestrel_core::{Hash, Hashable, ProposalRef, Round, Timestamp, ValidatorId, VoteRef};
use serde::{Deserialize, Serialize};

/// A vote on a proposal. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Proposal being voted on
    pub proposal: ProposalRef,
    /// Voting validator
    pub voter: ValidatorId,
    /// Round the vote belongs to
    pub round: Round,
    /// Approval or rejection
    pub approve: bool,
    /// Arrival timestamp, audit only
    pub timestamp: Timestamp,
}

impl Vote {
    pub fn new(round: Round, voter: ValidatorId, proposal: ProposalRef, approve: bool) -> Self {
        Self {
            proposal,
            voter,
            round,
            approve,
            timestamp: Timestamp::now(),
        }
    }
}

impl Hashable for Vote {
    fn hash(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"KESTREL_VOTE:");
        hasher.update(&self.round.0.to_le_bytes());
        hasher.update(self.voter.as_bytes());
        hasher.update(self.proposal.as_bytes());
        hasher.update(&[u8::from(self.approve)]);
        Hash::from_bytes(*hasher.finalize().as_bytes())
    }
}

/// Evidence of a second vote from one validator in one round.
///
/// Recorded, never tallied. Forwarded to an external evidence collaborator
/// for potential sanction; the first recorded vote stays the counted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateVoteEvidence {
    pub round: Round,
    pub voter: ValidatorId,
    /// Reference to the counted first vote
    pub first: VoteRef,
    /// The conflicting later vote, kept verbatim
    pub duplicate: Vote,
}

/// Outcome of a vote submission.
///
/// A duplicate is not an error: the call succeeds, the tally is untouched,
/// and the conflicting vote is preserved as evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote from this validator in this round; counted.
    Counted(VoteRef),
    /// A later vote from a validator that already voted this round.
    Duplicate(DuplicateVoteEvidence),
}

impl VoteOutcome {
    pub fn is_counted(&self) -> bool {
        matches!(self, VoteOutcome::Counted(_))
    }
}
