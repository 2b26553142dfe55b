//! In-memory transaction history.
//!
//! One log is shared by every engine on a page. Entries are unique by
//! transaction hash, so a receipt watcher that fires twice still produces a
//! single entry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::B256;

use crate::types::ActionRecord;

#[derive(Debug, Default)]
struct Entries {
    records: Vec<ActionRecord>,
    hashes: HashSet<B256>,
}

/// Cloneable handle to an append-only, hash-deduplicated action log.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    inner: Arc<Mutex<Entries>>,
}

impl HistoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `record` unless its hash is already present.
    ///
    /// Returns `false` for a duplicate.
    pub fn append(&self, record: ActionRecord) -> bool {
        let mut entries = self.lock();
        if !entries.hashes.insert(record.transaction_hash) {
            tracing::debug!(hash = %record.transaction_hash, "duplicate history entry ignored");
            return false;
        }
        entries.records.push(record);
        true
    }

    /// Records, most recent first.
    #[must_use]
    pub fn list(&self) -> Vec<ActionRecord> {
        self.lock().records.iter().rev().cloned().collect()
    }

    /// Whether `hash` has been recorded.
    #[must_use]
    pub fn contains(&self, hash: &B256) -> bool {
        self.lock().hashes.contains(hash)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
