//! Error types for KESTREL

use crate::types::{ProposalRef, Round, ValidatorId};
use thiserror::Error;

/// Main error type for KESTREL
#[derive(Error, Debug)]
pub enum KestrelError {
    // ============ Validation Errors ============
    // Rejected locally at the point of submission; never a protocol fault.
    #[error("Validator {0} is not registered")]
    NotRegistered(ValidatorId),

    #[error("Validator {0} is already registered")]
    DuplicateValidator(ValidatorId),

    #[error("Unknown proposal {proposal} in round {round}")]
    UnknownProposal { round: Round, proposal: ProposalRef },

    #[error("Round {0} already has a decision")]
    RoundClosed(Round),

    // ============ Invariant Violations ============
    // Fatal: a software defect or a violated fault-tolerance assumption.
    // The engine halts further decisions for the affected round.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    // ============ Storage / Serialization Errors ============
    #[error("Record serialization failed: {0}")]
    SerializationError(String),

    #[error("Record deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Record log error: {0}")]
    RecordLogError(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ General Errors ============
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A broken safety invariant. Never retried: once one of these fires,
/// agreement may already be broken for the affected round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Second decision attempted for round {round}")]
    DoubleDecision { round: Round },

    #[error("Decision for round {round} lacks a two-thirds quorum")]
    QuorumNotMet { round: Round },

    #[error("Signatory {validator} of round {round} has no matching approving vote")]
    SignatoryWithoutVote { round: Round, validator: ValidatorId },
}

impl From<std::io::Error> for KestrelError {
    fn from(err: std::io::Error) -> Self {
        KestrelError::RecordLogError(err.to_string())
    }
}

impl From<bincode::Error> for KestrelError {
    fn from(err: bincode::Error) -> Self {
        KestrelError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for KestrelError {
    fn from(err: serde_json::Error) -> Self {
        KestrelError::SerializationError(err.to_string())
    }
}
