//! Append-only placement ledgers.
//!
//! Every placement made through a configurator is recorded here as well as
//! mirrored into the [`LevelMap`](crate::level_map::LevelMap). The ledgers
//! are the audit trail; the map is the live state.

use serde::{Deserialize, Serialize};

use crate::geometry::CellPos;

/// Unique identifier for actors. `0` means "no actor".
pub type ActorHandle = u32;

/// How the dispatch builder treats an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActorRole {
    /// Scheduled every tick.
    #[default]
    Mobile,
    /// Holds its cell permanently; only moved by teleport.
    Barrier,
}

/// One actor placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPlacementEntry {
    /// Actor handle.
    pub handle: ActorHandle,
    /// Cell the actor was placed on.
    pub position: CellPos,
    /// Scheduling role.
    pub role: ActorRole,
}

/// One floor placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacePlacementEntry {
    /// Cell that received a floor.
    pub position: CellPos,
    /// Floor material.
    pub substrate: u16,
}

/// Append-only list of placement records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger<T> {
    entries: Vec<T>,
}

impl<T> Default for Ledger<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Ledger<T> {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its index.
    pub fn record(&mut self, entry: T) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in placement order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Ledger of actor placements.
pub type ActorLedger = Ledger<ActorPlacementEntry>;

/// Ledger of floor placements.
pub type SurfaceLedger = Ledger<SurfacePlacementEntry>;

impl ActorLedger {
    /// The most recent placement record for `handle`.
    #[must_use]
    pub fn latest_for(&self, handle: ActorHandle) -> Option<&ActorPlacementEntry> {
        self.entries.iter().rev().find(|e| e.handle == handle)
    }
}
