//! Main consensus engine implementation

use crate::ledger::RoundLedger;
use crate::proposal::Proposal;
use crate::quorum::QuorumEvaluator;
use crate::validator::SharedValidatorSet;
use crate::vote::{DuplicateVoteEvidence, Vote, VoteOutcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kestrel_core::{
    ConsensusConfig, InvariantViolation, KestrelError, KestrelResult, ProposalRef, RecordLog,
    Round, Timestamp, ValidatorId, Value, VotingPower,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the consensus engine
#[derive(Debug, Clone)]
pub enum ConsensusEvent {
    /// Proposal accepted into the ledger
    ProposalAccepted(Round, ProposalRef),
    /// Counted vote recorded
    VoteRecorded(Round, ValidatorId, ProposalRef, bool),
    /// Duplicate vote preserved as evidence
    DuplicateVote(DuplicateVoteEvidence),
    /// Round decided
    Decided(Decision),
    /// Fatal safety violation; the round is halted
    InvariantAlert(Round, InvariantViolation),
}

/// A finalized decision for one round. Created exactly once, immutable,
/// retained permanently for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub round: Round,
    pub value: Value,
    pub proposal: ProposalRef,
    pub signatories: BTreeSet<ValidatorId>,
    pub decided_at: Timestamp,
}

impl Decision {
    /// Semantic equality, ignoring the audit timestamp. Used when checking
    /// a replayed decision record against a recomputed one.
    pub fn agrees_with(&self, other: &Decision) -> bool {
        self.round == other.round
            && self.value == other.value
            && self.proposal == other.proposal
            && self.signatories == other.signatories
    }
}

/// Record shape persisted by the external append-only store.
/// Replaying records in append order reconstructs the engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogRecord {
    Proposal(Proposal),
    Vote(Vote),
    Decision(Decision),
}

impl LogRecord {
    pub fn round(&self) -> Round {
        match self {
            LogRecord::Proposal(p) => p.round,
            LogRecord::Vote(v) => v.round,
            LogRecord::Decision(d) => d.round,
        }
    }

    pub fn encode(&self) -> KestrelResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> KestrelResult<Self> {
        bincode::deserialize(bytes).map_err(|e| KestrelError::DeserializationError(e.to_string()))
    }
}

/// Mutable state of one round. All access is serialized behind the
/// per-round mutex; distinct rounds never contend.
struct RoundState {
    ledger: RoundLedger,
    quorum: QuorumEvaluator,
    /// Set when a fatal invariant violation fired; no further decision
    /// may be produced for this round.
    halted: bool,
}

impl RoundState {
    fn new(round: Round) -> Self {
        Self {
            ledger: RoundLedger::new(round),
            quorum: QuorumEvaluator::new(),
            halted: false,
        }
    }
}

/// Consensus engine for KESTREL.
///
/// Owns the round state machines and the decision map. Submissions are
/// synchronous and non-blocking; decisions are observed through the event
/// channel, never by polling.
pub struct ConsensusEngine {
    config: ConsensusConfig,
    validators: SharedValidatorSet,
    rounds: DashMap<Round, Arc<Mutex<RoundState>>>,
    decisions: DashMap<Round, Decision>,
    current_round: RwLock<Round>,
    event_tx: Option<mpsc::Sender<ConsensusEvent>>,
}

impl ConsensusEngine {
    /// Create a new consensus engine over a validator-set snapshot
    pub fn new(config: ConsensusConfig, validators: SharedValidatorSet) -> Self {
        Self {
            config,
            validators,
            rounds: DashMap::new(),
            decisions: DashMap::new(),
            current_round: RwLock::new(Round::default()),
            event_tx: None,
        }
    }

    /// Set event channel
    pub fn set_event_channel(&mut self, tx: mpsc::Sender<ConsensusEvent>) {
        self.event_tx = Some(tx);
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn validators(&self) -> &SharedValidatorSet {
        &self.validators
    }

    /// Submit a proposal for a round.
    ///
    /// Fails with `NotRegistered` for an unknown or inactive proposer and
    /// with `RoundClosed` once the round has a decision. Re-submission of
    /// identical content is idempotent and returns the same ref.
    pub fn submit_proposal(
        &self,
        round: Round,
        proposer: ValidatorId,
        value: Value,
    ) -> KestrelResult<ProposalRef> {
        if !self.validators.is_member(&proposer) {
            return Err(KestrelError::NotRegistered(proposer));
        }
        if self.decisions.contains_key(&round) {
            return Err(KestrelError::RoundClosed(round));
        }

        let state = self.round_state(round);
        let mut state = state.lock();

        let proposal = Proposal::new(round, proposer, value);
        let id = proposal.id;
        if state.ledger.record_proposal(proposal) {
            info!("Proposal {} accepted for {} from {}", id, round, proposer);
            self.emit_event(ConsensusEvent::ProposalAccepted(round, id));
        }
        Ok(id)
    }

    /// Submit a vote for a proposal.
    ///
    /// Fails with `NotRegistered` or `UnknownProposal`. A validator's
    /// second vote in a round succeeds but returns duplicate evidence and
    /// never changes the tally. Votes for already-decided rounds are still
    /// logged for audit; they cannot create or alter a decision.
    pub fn submit_vote(
        &self,
        round: Round,
        voter: ValidatorId,
        proposal: ProposalRef,
        approve: bool,
    ) -> KestrelResult<VoteOutcome> {
        if !self.validators.is_member(&voter) {
            return Err(KestrelError::NotRegistered(voter));
        }

        let state = self.round_state(round);
        let mut state = state.lock();

        if !state.ledger.has_proposal(&proposal) {
            return Err(KestrelError::UnknownProposal { round, proposal });
        }

        let outcome = state.ledger.record_vote(Vote::new(round, voter, proposal, approve));
        match &outcome {
            VoteOutcome::Duplicate(evidence) => {
                warn!("Duplicate vote from {} in {}", voter, round);
                self.emit_event(ConsensusEvent::DuplicateVote(evidence.clone()));
            }
            VoteOutcome::Counted(_) => {
                debug!(
                    "Vote recorded for {} in {}: {} from {}",
                    proposal,
                    round,
                    if approve { "approve" } else { "reject" },
                    voter
                );
                self.emit_event(ConsensusEvent::VoteRecorded(round, voter, proposal, approve));

                if approve {
                    // The registry is read-mostly; a status flip between the
                    // membership check above and here resolves to zero power.
                    let power = self
                        .validators
                        .voting_power_of(&voter)
                        .unwrap_or(VotingPower::ZERO);
                    let approving = state.quorum.count_approval(proposal, voter, power);

                    if !state.halted
                        && !self.decisions.contains_key(&round)
                        && self.validators.quorum_reached(approving)
                    {
                        self.finalize(round, proposal, &mut state)?;
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Finalize the round's decision. Called under the round mutex, at the
    /// instant the first proposal of the round crosses the threshold.
    fn finalize(
        &self,
        round: Round,
        proposal: ProposalRef,
        state: &mut RoundState,
    ) -> KestrelResult<()> {
        let value = state
            .ledger
            .proposal(&proposal)
            .map(|p| p.value.clone())
            .ok_or(KestrelError::UnknownProposal { round, proposal })?;
        let signatories = state
            .quorum
            .tally(&proposal)
            .map(|t| t.signatories().clone())
            .unwrap_or_default();

        // Final gate before the insert: every signatory must hold a counted
        // approving vote for exactly this proposal, and their aggregate
        // power must still clear the threshold. Failing either is fatal.
        let mut signatory_power = VotingPower::ZERO;
        for signatory in &signatories {
            let approved = state
                .ledger
                .counted_vote_of(signatory)
                .map(|v| v.approve && v.proposal == proposal)
                .unwrap_or(false);
            if !approved {
                return Err(self.fatal(
                    round,
                    state,
                    InvariantViolation::SignatoryWithoutVote {
                        round,
                        validator: *signatory,
                    },
                ));
            }
            signatory_power = signatory_power.saturating_add(
                self.validators
                    .voting_power_of(signatory)
                    .unwrap_or(VotingPower::ZERO),
            );
        }
        if !self.validators.quorum_reached(signatory_power) {
            return Err(self.fatal(round, state, InvariantViolation::QuorumNotMet { round }));
        }

        let decision = Decision {
            round,
            value,
            proposal,
            signatories,
            decided_at: Timestamp::now(),
        };

        // Insert-if-absent is the one-decision-per-round discipline. An
        // occupied slot here is unreachable under correct operation: all
        // mutations for the round serialize on its mutex and the decided
        // check precedes this call.
        match self.decisions.entry(round) {
            Entry::Vacant(entry) => {
                entry.insert(decision.clone());
            }
            Entry::Occupied(_) => {
                return Err(self.fatal(round, state, InvariantViolation::DoubleDecision { round }));
            }
        }

        info!(
            "Round {} decided on {} with {} signatories",
            round,
            proposal,
            decision.signatories.len()
        );
        self.emit_event(ConsensusEvent::Decided(decision));
        Ok(())
    }

    /// Mark a round unsalvageable: halt its decisions, raise the CRITICAL
    /// alert, and hand the violation back as the terminal error. Never
    /// retried; once one of these fires, agreement may already be broken.
    fn fatal(
        &self,
        round: Round,
        state: &mut RoundState,
        violation: InvariantViolation,
    ) -> KestrelError {
        state.halted = true;
        error!("CRITICAL: {}; halting decisions for {}", violation, round);
        self.emit_event(ConsensusEvent::InvariantAlert(round, violation.clone()));
        violation.into()
    }

    /// Decision for a round, if finalized
    pub fn decision(&self, round: Round) -> Option<Decision> {
        self.decisions.get(&round).map(|d| d.clone())
    }

    pub fn is_decided(&self, round: Round) -> bool {
        self.decisions.contains_key(&round)
    }

    /// All decisions, ordered by round
    pub fn decisions(&self) -> Vec<Decision> {
        let mut all: Vec<Decision> = self.decisions.iter().map(|d| d.clone()).collect();
        all.sort_by_key(|d| d.round);
        all
    }

    /// Approving power accumulated for a proposal
    pub fn approving_power(&self, round: Round, proposal: &ProposalRef) -> VotingPower {
        self.round_state(round).lock().quorum.approving_power(proposal)
    }

    /// Whether a proposal currently holds a two-thirds quorum
    pub fn has_quorum(&self, round: Round, proposal: &ProposalRef) -> bool {
        self.validators
            .quorum_reached(self.approving_power(round, proposal))
    }

    /// Counted votes for a proposal
    pub fn votes_for(&self, round: Round, proposal: &ProposalRef) -> Vec<Vote> {
        self.round_state(round).lock().ledger.votes_for(proposal)
    }

    /// Duplicate-vote evidence accumulated in a round
    pub fn duplicate_evidence(&self, round: Round) -> Vec<DuplicateVoteEvidence> {
        self.round_state(round).lock().ledger.evidence().to_vec()
    }

    /// Current round cursor
    pub fn current_round(&self) -> Round {
        *self.current_round.read()
    }

    /// Advance the round cursor. Round advancement policy (timeouts,
    /// proposer rotation) belongs to the external driver; the engine only
    /// keeps the cursor monotonic and keeps accepting old-round votes.
    pub fn advance_round(&self, to: Round) -> Round {
        let mut current = self.current_round.write();
        if to > *current {
            debug!("Round advanced {} -> {}", *current, to);
            *current = to;
        } else {
            warn!("Ignoring non-monotonic round advance {} -> {}", *current, to);
        }
        *current
    }

    /// Apply a single replayed record.
    ///
    /// Proposals and votes route through the normal submission path, so a
    /// replayed log reproduces the same decisions. A replayed decision
    /// record is checked against the recomputed one; disagreement is fatal.
    pub fn apply_record(&self, record: LogRecord) -> KestrelResult<()> {
        match record {
            LogRecord::Proposal(p) => {
                let id = self.submit_proposal(p.round, p.proposer, p.value)?;
                if id != p.id {
                    return Err(KestrelError::Internal(format!(
                        "replayed proposal {} re-derived as {}",
                        p.id, id
                    )));
                }
                Ok(())
            }
            LogRecord::Vote(v) => {
                self.submit_vote(v.round, v.voter, v.proposal, v.approve)?;
                Ok(())
            }
            LogRecord::Decision(d) => match self.decisions.entry(d.round) {
                Entry::Occupied(entry) => {
                    if entry.get().agrees_with(&d) {
                        Ok(())
                    } else {
                        let round = d.round;
                        drop(entry);
                        let state = self.round_state(round);
                        let mut state = state.lock();
                        Err(self.fatal(
                            round,
                            &mut state,
                            InvariantViolation::DoubleDecision { round },
                        ))
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(d);
                    Ok(())
                }
            },
        }
    }

    /// Rebuild state from an external record log
    pub async fn replay_from(&self, log: &dyn RecordLog, from: Round) -> KestrelResult<usize> {
        let records = log.replay(from).await?;
        let count = records.len();
        for (_, bytes) in records {
            self.apply_record(LogRecord::decode(&bytes)?)?;
        }
        info!("Replayed {} records from {}", count, from);
        Ok(count)
    }

    /// Audit snapshot of everything the engine has accepted
    pub fn state_snapshot(&self) -> crate::monitor::ConsensusState {
        let mut rounds: Vec<crate::monitor::RoundRecords> = self
            .rounds
            .iter()
            .map(|entry| {
                let round = *entry.key();
                let state = entry.value().lock();
                crate::monitor::RoundRecords {
                    round,
                    proposals: state.ledger.proposals().into_iter().cloned().collect(),
                    votes: state.ledger.votes().to_vec(),
                    evidence: state.ledger.evidence().to_vec(),
                    decision: self.decision(round),
                }
            })
            .collect();
        rounds.sort_by_key(|r| r.round);

        crate::monitor::ConsensusState {
            validators: self.validators.active_validators(),
            total_power: self.validators.total_voting_power(),
            rounds,
            current_round: self.current_round(),
        }
    }

    fn round_state(&self, round: Round) -> Arc<Mutex<RoundState>> {
        self.rounds
            .entry(round)
            .or_insert_with(|| Arc::new(Mutex::new(RoundState::new(round))))
            .clone()
    }

    fn emit_event(&self, event: ConsensusEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.try_send(event);
        }
    }
}

/// Shared consensus engine
pub type SharedEngine = Arc<ConsensusEngine>;

/// Create consensus event channel
pub fn create_event_channel(
    capacity: usize,
) -> (mpsc::Sender<ConsensusEvent>, mpsc::Receiver<ConsensusEvent>) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatorSet;
    use kestrel_core::{MemoryRecordLog, Stake};

    fn vid(byte: u8) -> ValidatorId {
        ValidatorId::from_bytes([byte; 32])
    }

    fn engine_with_equal_validators(count: u8) -> ConsensusEngine {
        let config = ConsensusConfig::default();
        let set = Arc::new(ValidatorSet::new(&config));
        for i in 1..=count {
            set.register(vid(i), Stake::new(1)).unwrap();
        }
        ConsensusEngine::new(config, set)
    }

    #[test]
    fn test_quorum_decides_round() {
        // 4 validators, equal power 1. Approvals from A, B, C give power 3,
        // and 3*3=9 > 4*2=8.
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();

        for i in 1..=2 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
            assert!(!engine.is_decided(round));
        }
        engine.submit_vote(round, vid(3), p1, true).unwrap();

        let decision = engine.decision(round).expect("round should be decided");
        assert_eq!(decision.round, round);
        assert_eq!(decision.value, Value::from("v1"));
        assert_eq!(decision.proposal, p1);
        let expected: BTreeSet<ValidatorId> = [vid(1), vid(2), vid(3)].into_iter().collect();
        assert_eq!(decision.signatories, expected);
    }

    #[test]
    fn test_minority_proposal_cannot_decide() {
        // Byzantine validator D backs a different proposal; its power of 1
        // is far from quorum and no second decision appears.
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();
        let p2 = engine
            .submit_proposal(round, vid(4), Value::from("v2"))
            .unwrap();

        for i in 1..=3 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
        }
        engine.submit_vote(round, vid(4), p2, true).unwrap();

        assert_eq!(engine.approving_power(round, &p2), VotingPower::new(1));
        assert!(!engine.has_quorum(round, &p2));

        let decision = engine.decision(round).unwrap();
        assert_eq!(decision.value, Value::from("v1"));
        assert_eq!(engine.decisions().len(), 1);
    }

    #[test]
    fn test_double_vote_counted_once() {
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();

        let first = engine.submit_vote(round, vid(1), p1, true).unwrap();
        assert!(first.is_counted());
        assert_eq!(engine.approving_power(round, &p1), VotingPower::new(1));

        let second = engine.submit_vote(round, vid(1), p1, true).unwrap();
        assert!(matches!(second, VoteOutcome::Duplicate(_)));
        assert_eq!(engine.approving_power(round, &p1), VotingPower::new(1));
        assert_eq!(engine.duplicate_evidence(round).len(), 1);
    }

    #[test]
    fn test_unregistered_submissions_rejected() {
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();

        let err = engine.submit_vote(round, vid(99), p1, true).unwrap_err();
        assert!(matches!(err, KestrelError::NotRegistered(_)));
        assert_eq!(engine.approving_power(round, &p1), VotingPower::ZERO);

        let err = engine
            .submit_proposal(round, vid(99), Value::from("vx"))
            .unwrap_err();
        assert!(matches!(err, KestrelError::NotRegistered(_)));
    }

    #[test]
    fn test_seven_validators_need_five_approvals() {
        // 7 equal validators: power 4 gives 12 <= 14, power 5 gives 15 > 14.
        let engine = engine_with_equal_validators(7);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();

        for i in 1..=4 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
        }
        assert!(!engine.is_decided(round));

        engine.submit_vote(round, vid(5), p1, true).unwrap();
        let decision = engine.decision(round).unwrap();
        assert_eq!(decision.signatories.len(), 5);
    }

    #[test]
    fn test_unknown_proposal_rejected() {
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();

        let bogus = kestrel_core::Hash::from_bytes([9u8; 32]);
        let err = engine.submit_vote(round, vid(2), bogus, true).unwrap_err();
        assert!(matches!(err, KestrelError::UnknownProposal { .. }));
    }

    #[test]
    fn test_decided_round_closed_to_proposals_open_to_votes() {
        let engine = engine_with_equal_validators(4);
        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();
        for i in 1..=3 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
        }
        assert!(engine.is_decided(round));

        let err = engine
            .submit_proposal(round, vid(4), Value::from("v2"))
            .unwrap_err();
        assert!(matches!(err, KestrelError::RoundClosed(_)));

        // A late vote is still logged for audit but the decision is frozen.
        let before = engine.decision(round).unwrap();
        engine.submit_vote(round, vid(4), p1, true).unwrap();
        let after = engine.decision(round).unwrap();
        assert!(before.agrees_with(&after));
        assert_eq!(engine.votes_for(round, &p1).len(), 4);
    }

    #[test]
    fn test_rounds_are_independent() {
        let engine = engine_with_equal_validators(4);
        let r1 = Round::new(1);
        let r2 = Round::new(2);
        let p1 = engine.submit_proposal(r1, vid(1), Value::from("v1")).unwrap();
        let p2 = engine.submit_proposal(r2, vid(2), Value::from("v2")).unwrap();

        for i in 1..=3 {
            engine.submit_vote(r1, vid(i), p1, true).unwrap();
            engine.submit_vote(r2, vid(i), p2, true).unwrap();
        }

        assert_eq!(engine.decision(r1).unwrap().value, Value::from("v1"));
        assert_eq!(engine.decision(r2).unwrap().value, Value::from("v2"));
    }

    #[test]
    fn test_round_cursor_is_monotonic() {
        let engine = engine_with_equal_validators(4);
        assert_eq!(engine.current_round(), Round::new(0));
        assert_eq!(engine.advance_round(Round::new(3)), Round::new(3));
        assert_eq!(engine.advance_round(Round::new(1)), Round::new(3));
        assert_eq!(engine.advance_round(Round::new(4)), Round::new(4));
    }

    #[test]
    fn test_events_emitted_in_order() {
        let mut engine = engine_with_equal_validators(4);
        let (tx, mut rx) = create_event_channel(64);
        engine.set_event_channel(tx);

        let round = Round::new(1);
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();
        for i in 1..=3 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
        }
        engine.submit_vote(round, vid(1), p1, true).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            ConsensusEvent::ProposalAccepted(_, _)
        ));
        for _ in 0..2 {
            assert!(matches!(
                rx.try_recv().unwrap(),
                ConsensusEvent::VoteRecorded(_, _, _, true)
            ));
        }
        // Third approval crosses the threshold: vote event then decision.
        assert!(matches!(
            rx.try_recv().unwrap(),
            ConsensusEvent::VoteRecorded(_, _, _, true)
        ));
        match rx.try_recv().unwrap() {
            ConsensusEvent::Decided(decision) => assert_eq!(decision.round, round),
            other => panic!("expected decision event, got {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            ConsensusEvent::DuplicateVote(_)
        ));
    }

    #[tokio::test]
    async fn test_log_replay_reconstructs_decisions() {
        let engine = engine_with_equal_validators(4);
        let log = MemoryRecordLog::new();
        let round = Round::new(1);

        // Drive a round to a decision, journaling every accepted record.
        let p1 = engine
            .submit_proposal(round, vid(1), Value::from("v1"))
            .unwrap();
        let proposal = engine.state_snapshot().rounds[0].proposals[0].clone();
        log.append(round, LogRecord::Proposal(proposal).encode().unwrap())
            .await
            .unwrap();
        for i in 1..=3 {
            engine.submit_vote(round, vid(i), p1, true).unwrap();
            let vote = Vote::new(round, vid(i), p1, true);
            log.append(round, LogRecord::Vote(vote).encode().unwrap())
                .await
                .unwrap();
        }
        let decision = engine.decision(round).unwrap();
        log.append(round, LogRecord::Decision(decision.clone()).encode().unwrap())
            .await
            .unwrap();

        // A fresh engine over the same validator set replays to the same state.
        let replayed = engine_with_equal_validators(4);
        let count = replayed.replay_from(&log, Round::new(0)).await.unwrap();
        assert_eq!(count, 5);

        let rebuilt = replayed.decision(round).unwrap();
        assert!(rebuilt.agrees_with(&decision));
        assert_eq!(replayed.approving_power(round, &p1), VotingPower::new(3));
    }
}
