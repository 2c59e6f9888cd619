use std::collections::VecDeque;

use crate::types::TransactionRecord;

/// Default number of transactions retained.
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Ledger -- bounded newest-first buffer
// ---------------------------------------------------------------------------

/// Most-recent-first buffer of transactions. Index 0 is always the latest
/// ingested record; once `capacity` is exceeded the oldest entries fall off
/// the back.
#[derive(Debug)]
pub struct Ledger {
    entries: VecDeque<TransactionRecord>,
    capacity: usize,
}

impl Ledger {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Prepend `record` and drop anything beyond `capacity`.
    pub fn ingest(&mut self, record: TransactionRecord) {
        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
    }

    /// Owned copy of the newest `limit` entries (fewer if the ledger holds
    /// less). Later ingests are not visible through the returned vector.
    pub fn snapshot(&self, limit: usize) -> Vec<TransactionRecord> {
        self.entries.iter().take(limit).cloned().collect()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&TransactionRecord> {
        self.entries.front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}
