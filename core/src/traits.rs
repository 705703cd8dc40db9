//! Core traits defining KESTREL interfaces
//!
//! These traits define the contracts between the consensus core and its
//! external collaborators (transport, storage, application sink).

use crate::error::KestrelError;
use crate::types::*;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Result type for KESTREL operations
pub type KestrelResult<T> = Result<T, KestrelError>;

/// Trait for content-addressed types
pub trait Hashable {
    /// Compute the content hash of this object
    fn hash(&self) -> Hash;
}

/// Append-only log of consensus records, keyed by round.
///
/// Owned by an external storage collaborator. Records are opaque bytes at
/// this seam; the consensus crate defines the concrete record encoding.
/// Replaying the log in order reconstructs the engine state
/// deterministically.
#[async_trait]
pub trait RecordLog: Send + Sync {
    /// Append a record for a round
    async fn append(&self, round: Round, record: Vec<u8>) -> KestrelResult<()>;

    /// Replay all records at or after a round, in append order
    async fn replay(&self, from: Round) -> KestrelResult<Vec<(Round, Vec<u8>)>>;
}

/// In-memory record log, for tests and single-process replay.
#[derive(Default)]
pub struct MemoryRecordLog {
    records: Mutex<Vec<(Round, Vec<u8>)>>,
}

impl MemoryRecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RecordLog for MemoryRecordLog {
    async fn append(&self, round: Round, record: Vec<u8>) -> KestrelResult<()> {
        self.records.lock().push((round, record));
        Ok(())
    }

    async fn replay(&self, from: Round) -> KestrelResult<Vec<(Round, Vec<u8>)>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(r, _)| *r >= from)
            .cloned()
            .collect())
    }
}
