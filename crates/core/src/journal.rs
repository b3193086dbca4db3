use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::Level;
use parking_lot::Mutex;

/// One narrated event: a severity and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub level: Level,
    pub message: String,
}

/// Round-grouped event sink.
///
/// Agents and the engine only ever append; the orchestrator sets the
/// current round and flushes each round's entries to the logger once the
/// round closes. Entries are tagged with whatever round was current when
/// they were appended.
#[derive(Debug, Default)]
pub struct Journal {
    round: AtomicU64,
    rounds: Mutex<BTreeMap<u64, Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(&self) -> u64 {
        self.round.load(Ordering::Acquire)
    }

    pub fn set_round(&self, round: u64) {
        self.round.store(round, Ordering::Release);
    }

    pub fn append(&self, level: Level, message: impl Into<String>) {
        let entry = JournalEntry {
            level,
            message: message.into(),
        };
        self.rounds
            .lock()
            .entry(self.round())
            .or_default()
            .push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(Level::Info, message);
    }

    /// Entries recorded for `round`, in append order.
    pub fn entries(&self, round: u64) -> Vec<JournalEntry> {
        self.rounds
            .lock()
            .get(&round)
            .cloned()
            .unwrap_or_default()
    }
}
