//! Version manager: per-epoch processor lookup.
//!
//! Protocol rules may differ across historical epochs of the ledger. The
//! resolver asks the version manager for the processor to use for *each*
//! operation's transaction time, never caching one per DID.

use std::sync::Arc;

use crate::processor::OperationProcessor;

/// Maps a transaction time to the operation processor whose rules were in
/// force at that time.
pub trait VersionManager: Send + Sync {
    fn operation_processor(&self, transaction_time: u64) -> Arc<dyn OperationProcessor>;
}

/// [VersionManager] over a table of epochs.
///
/// Each entry is `(starting_transaction_time, processor)`; lookup picks the
/// entry with the greatest starting time not after the queried time.
pub struct VersionTable {
    // Sorted ascending by starting transaction time.
    entries: Vec<(u64, Arc<dyn OperationProcessor>)>,
}

impl VersionTable {
    /// A single protocol version covering all of history.
    pub fn single(processor: Arc<dyn OperationProcessor>) -> Self {
        Self {
            entries: vec![(0, processor)],
        }
    }

    pub fn new(mut entries: Vec<(u64, Arc<dyn OperationProcessor>)>) -> Self {
        assert!(!entries.is_empty(), "version table must not be empty");
        entries.sort_by_key(|(starting_time, _)| *starting_time);
        Self { entries }
    }
}

impl VersionManager for VersionTable {
    fn operation_processor(&self, transaction_time: u64) -> Arc<dyn OperationProcessor> {
        let index = self
            .entries
            .partition_point(|(starting_time, _)| *starting_time <= transaction_time);
        // partition_point is at least 1 because the first epoch starts at or
        // below any queried time; fall back to the earliest epoch otherwise.
        let index = index.saturating_sub(1);
        self.entries[index].1.clone()
    }
}
