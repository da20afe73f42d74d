//! Per-actor ring of recent dispatch results.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::dispatch::{DecisionTier, DispatchEntry, Outcome, RejectReason};
use crate::ledger::ActorHandle;

/// Entries kept per actor.
pub const HISTORY_CAPACITY: usize = 8;

/// One resolved dispatch, as remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Tick number.
    pub tick: u64,
    /// Decision tier.
    pub tier: DecisionTier,
    /// Outcome.
    pub outcome: Outcome,
    /// Rejection reason.
    pub reason: RejectReason,
}

impl HistoryEntry {
    /// Snapshot a resolved entry.
    #[must_use]
    pub const fn from_entry(tick: u64, entry: &DispatchEntry) -> Self {
        Self {
            tick,
            tier: entry.tier,
            outcome: entry.outcome,
            reason: entry.reason,
        }
    }
}

/// Fixed-capacity ring, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchHistory {
    entries: VecDeque<HistoryEntry>,
}

impl DispatchHistory {
    /// An empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append, evicting the oldest entry when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entry at `index`, 0 being the oldest kept.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Number of entries kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Histories for every actor a configurator has ever resolved.
#[derive(Debug, Clone, Default)]
pub struct HistoryBook {
    rings: HashMap<ActorHandle, DispatchHistory>,
}

impl HistoryBook {
    /// Record a resolved entry.
    pub fn record(&mut self, tick: u64, entry: &DispatchEntry) {
        self.rings
            .entry(entry.actor)
            .or_default()
            .push(HistoryEntry::from_entry(tick, entry));
    }

    /// History of one actor.
    #[must_use]
    pub fn for_actor(&self, actor: ActorHandle) -> Option<&DispatchHistory> {
        self.rings.get(&actor)
    }
}
