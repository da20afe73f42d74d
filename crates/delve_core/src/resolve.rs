//! Resolve/commit: apply a dispatch queue against live occupancy.
//!
//! Entries are processed strictly in queue order and every accepted move is
//! written to the map before the next entry is looked at. A later entry
//! therefore always sees earlier commits, which is what keeps two actors
//! from ending a tick on the same cell.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aiu::AiuMode;
use crate::configurator::Configurator;
use crate::dispatch::{DispatchEntry, DispatchQueue, Outcome, RejectReason};
use crate::ledger::ActorHandle;
use crate::permit::MovementPermit;

/// A resolved tick: the queue's entries with outcomes filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTick {
    tick: u64,
    entries: Vec<DispatchEntry>,
}

impl ResolvedTick {
    /// Tick number.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Entries in the order they were processed.
    #[must_use]
    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    /// Entry for `actor`.
    #[must_use]
    pub fn find(&self, actor: ActorHandle) -> Option<&DispatchEntry> {
        self.entries.iter().find(|e| e.actor == actor)
    }

    /// Entries accepted.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.count(|e| e.outcome == Outcome::Accepted)
    }

    /// Entries rejected.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.count(|e| e.outcome == Outcome::Rejected)
    }

    /// Entries rejected for `reason`.
    #[must_use]
    pub fn rejected_for(&self, reason: RejectReason) -> usize {
        self.count(|e| e.outcome == Outcome::Rejected && e.reason == reason)
    }

    /// Actors in cultivate mode this tick.
    #[must_use]
    pub fn cultivating(&self) -> usize {
        self.count(|e| e.mode == AiuMode::Cultivate)
    }

    fn count(&self, pred: impl Fn(&DispatchEntry) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(e)).count()
    }
}

impl Configurator {
    /// Resolve a queue, consuming it.
    pub fn resolve(&mut self, queue: DispatchQueue) -> ResolvedTick {
        let (tick, mut entries) = queue.into_parts();

        for entry in &mut entries {
            let verdict = self.apply_permit(&MovementPermit {
                actor: entry.actor,
                tick,
                step: entry.step,
                tier: entry.tier,
            });
            entry.outcome = verdict.outcome();
            entry.reason = verdict.reason();
            self.history.record(tick, entry);
        }

        #[cfg(feature = "debug-validation")]
        self.assert_occupancy_consistent();

        let resolved = ResolvedTick { tick, entries };
        debug!(
            tick,
            accepted = resolved.accepted(),
            rejected = resolved.rejected(),
            "tick resolved"
        );
        resolved
    }
}
