//! Safety invariant monitor
//!
//! A testing/fuzzing oracle, not a runtime gate. After every mutation a
//! test can re-check the full invariant set against a state snapshot; a
//! violation means a software defect or a broken fault-tolerance
//! assumption, and the harness fails fast.

use crate::engine::Decision;
use crate::proposal::Proposal;
use crate::validator::Validator;
use crate::vote::{DuplicateVoteEvidence, Vote};
use kestrel_core::{ConsensusConfig, Round, ValidatorId, Value, VotingPower};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Everything the ledger accepted for one round.
#[derive(Debug, Clone)]
pub struct RoundRecords {
    pub round: Round,
    pub proposals: Vec<Proposal>,
    pub votes: Vec<Vote>,
    pub evidence: Vec<DuplicateVoteEvidence>,
    pub decision: Option<Decision>,
}

/// Aggregate audit snapshot of the consensus core.
#[derive(Debug, Clone)]
pub struct ConsensusState {
    pub validators: Vec<Validator>,
    pub total_power: VotingPower,
    pub rounds: Vec<RoundRecords>,
    pub current_round: Round,
}

/// A violated safety property.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{members} validators cannot tolerate {assumed_byzantine} Byzantine members (need n >= 3f+1)")]
    FaultBoundExceeded {
        members: usize,
        assumed_byzantine: usize,
    },

    #[error("Conflicting decision values recorded for round {round}")]
    ConflictingDecision { round: Round },

    #[error("Decision for round {round} does not match any accepted proposal")]
    DecisionWithoutProposal { round: Round },

    #[error("Two disjoint two-thirds quorums exist over {members} validators")]
    NonIntersectingQuorums { members: usize },

    #[error("Validator {voter} has more than one counted vote in round {round}")]
    DoubleCountedVote { round: Round, voter: ValidatorId },

    #[error("Counted vote from unregistered validator {voter} in round {round}")]
    UnregisteredVoter { round: Round, voter: ValidatorId },

    #[error("Decision for round {round} lacks a two-thirds quorum of voting power")]
    DecisionWithoutQuorum { round: Round },

    #[error("Signatory {validator} of round {round} has no counted approving vote for the decided value")]
    SignatoryWithoutApproval { round: Round, validator: ValidatorId },
}

/// Re-evaluates the full safety property set against a state snapshot.
pub struct SafetyMonitor {
    /// Byzantine count the deployment is configured to tolerate. Not
    /// observable at runtime; supplied by the test scenario.
    assumed_byzantine: usize,
    /// Exhaustive quorum-overlap enumeration is exponential; sets larger
    /// than this are skipped by that one check.
    intersection_check_limit: usize,
}

impl SafetyMonitor {
    pub fn new(assumed_byzantine: usize) -> Self {
        Self {
            assumed_byzantine,
            intersection_check_limit: ConsensusConfig::default().intersection_check_limit,
        }
    }

    pub fn from_config(config: &ConsensusConfig, assumed_byzantine: usize) -> Self {
        Self {
            assumed_byzantine,
            intersection_check_limit: config.intersection_check_limit,
        }
    }

    /// Check every safety property; an empty result means the state is sound.
    pub fn check(&self, state: &ConsensusState) -> Vec<Violation> {
        let mut violations = Vec::new();

        self.check_fault_bound(state, &mut violations);
        self.check_quorum_overlap(state, &mut violations);

        let powers: HashMap<ValidatorId, VotingPower> = state
            .validators
            .iter()
            .map(|v| (v.id, v.voting_power))
            .collect();

        let mut decided_values: HashMap<Round, Value> = HashMap::new();

        for records in &state.rounds {
            self.check_vote_accounting(records, &powers, &mut violations);

            if let Some(decision) = &records.decision {
                if decision.round != records.round {
                    violations.push(Violation::ConflictingDecision {
                        round: records.round,
                    });
                }
                match decided_values.get(&decision.round) {
                    Some(value) if *value != decision.value => {
                        violations.push(Violation::ConflictingDecision {
                            round: decision.round,
                        });
                    }
                    _ => {
                        decided_values.insert(decision.round, decision.value.clone());
                    }
                }
                self.check_decision(records, decision, &powers, state.total_power, &mut violations);
            }
        }

        violations
    }

    /// Fail-fast variant for tests and fuzzing: panic on the first unsound
    /// snapshot with every violated property listed.
    pub fn assert_holds(&self, state: &ConsensusState) {
        let violations = self.check(state);
        if !violations.is_empty() {
            let mut msg = String::from("consensus safety violated:\n");
            for violation in &violations {
                msg.push_str(&format!("  - {}\n", violation));
            }
            panic!("{}", msg);
        }
    }

    fn check_fault_bound(&self, state: &ConsensusState, violations: &mut Vec<Violation>) {
        let members = state.validators.len();
        if members < 3 * self.assumed_byzantine + 1 {
            violations.push(Violation::FaultBoundExceeded {
                members,
                assumed_byzantine: self.assumed_byzantine,
            });
        }
    }

    fn check_quorum_overlap(&self, state: &ConsensusState, violations: &mut Vec<Violation>) {
        let powers: Vec<VotingPower> = state.validators.iter().map(|v| v.voting_power).collect();
        if powers.is_empty() || powers.len() > self.intersection_check_limit {
            return;
        }
        if !quorums_intersect(&powers) {
            violations.push(Violation::NonIntersectingQuorums {
                members: powers.len(),
            });
        }
    }

    fn check_vote_accounting(
        &self,
        records: &RoundRecords,
        powers: &HashMap<ValidatorId, VotingPower>,
        violations: &mut Vec<Violation>,
    ) {
        let mut seen: HashSet<ValidatorId> = HashSet::new();
        for vote in &records.votes {
            if !seen.insert(vote.voter) {
                violations.push(Violation::DoubleCountedVote {
                    round: records.round,
                    voter: vote.voter,
                });
            }
            if !powers.contains_key(&vote.voter) {
                violations.push(Violation::UnregisteredVoter {
                    round: records.round,
                    voter: vote.voter,
                });
            }
        }
    }

    fn check_decision(
        &self,
        records: &RoundRecords,
        decision: &Decision,
        powers: &HashMap<ValidatorId, VotingPower>,
        total_power: VotingPower,
        violations: &mut Vec<Violation>,
    ) {
        // Decided value must come from an accepted proposal of the round.
        let matching = records
            .proposals
            .iter()
            .any(|p| p.id == decision.proposal && p.value == decision.value);
        if !matching {
            violations.push(Violation::DecisionWithoutProposal {
                round: records.round,
            });
        }

        // Signatories must hold an aggregate two-thirds quorum...
        let mut signatory_power = VotingPower::ZERO;
        for signatory in &decision.signatories {
            signatory_power = signatory_power
                .saturating_add(powers.get(signatory).copied().unwrap_or(VotingPower::ZERO));
        }
        if !signatory_power.exceeds_two_thirds_of(total_power) {
            violations.push(Violation::DecisionWithoutQuorum {
                round: records.round,
            });
        }

        // ...and each one a counted approving vote for exactly the decided
        // proposal. The counted vote is the first (and only) log entry per
        // voter.
        for signatory in &decision.signatories {
            let approved = records
                .votes
                .iter()
                .find(|v| v.voter == *signatory)
                .map(|v| v.approve && v.proposal == decision.proposal)
                .unwrap_or(false);
            if !approved {
                violations.push(Violation::SignatoryWithoutApproval {
                    round: records.round,
                    validator: *signatory,
                });
            }
        }
    }
}

/// Exhaustive quorum-overlap check: every pair of validator subsets whose
/// power strictly exceeds two thirds of the total must share a member.
/// A pigeonhole consequence of the weights; feasible for small sets only.
pub fn quorums_intersect(powers: &[VotingPower]) -> bool {
    let n = powers.len();
    debug_assert!(n <= 20, "exhaustive enumeration is exponential");
    let total: VotingPower = powers
        .iter()
        .fold(VotingPower::ZERO, |acc, p| acc.saturating_add(*p));

    let mut quorum_masks: Vec<u32> = Vec::new();
    for mask in 1u32..(1 << n) {
        let mut sum = VotingPower::ZERO;
        for (i, power) in powers.iter().enumerate() {
            if mask & (1 << i) != 0 {
                sum = sum.saturating_add(*power);
            }
        }
        if sum.exceeds_two_thirds_of(total) {
            quorum_masks.push(mask);
        }
    }

    for (i, a) in quorum_masks.iter().enumerate() {
        for b in &quorum_masks[i..] {
            if a & b == 0 {
                return false;
            }
        }
    }
    true
}
