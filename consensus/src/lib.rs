//! KESTREL Consensus Engine
//!
//! Implements weighted single-decree Byzantine fault-tolerant consensus with:
//! - Stake-weighted validator registry
//! - Append-only proposal/vote ledger with duplicate-vote evidence
//! - Incremental two-thirds quorum evaluation
//! - One decision per round, finalized exactly once

pub mod engine;
pub mod ledger;
pub mod monitor;
pub mod proposal;
pub mod quorum;
pub mod validator;
pub mod vote;

pub use engine::*;
pub use ledger::*;
pub use monitor::*;
pub use proposal::*;
pub use quorum::*;
pub use validator::*;
pub use vote::*;
