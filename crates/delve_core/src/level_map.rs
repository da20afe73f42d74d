//! Sparse layered grid: floors, features, occupancy, portals and stairs.
//!
//! Cells only exist where something was placed. A cell with substrate `0`
//! is a hole in the floor: nothing can stand on it and it cannot host a
//! portal, a stair or an actor.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::geometry::{CellPos, Step};
use crate::ledger::ActorHandle;

/// Substrate id meaning "no floor".
pub const NO_SUBSTRATE: u16 = 0;

/// Actor handle meaning "unoccupied".
pub const NO_ACTOR: ActorHandle = 0;

/// Portal marker on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PortalKind {
    /// No portal.
    #[default]
    None = 0,
    /// Level entrance.
    Entrance = 1,
    /// Level exit.
    Exit = 2,
}

/// Stair marker on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum StairKind {
    /// No stair.
    #[default]
    None = 0,
    /// Leads to `level - 1`.
    Up = 1,
    /// Leads to `level + 1`.
    Down = 2,
}

/// A placed feature (furniture, rubble, a door...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    /// Feature handle assigned by the caller.
    pub handle: u32,
    /// Whether the feature prevents actors from entering.
    pub blocking: bool,
}

/// One cell of the layered map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Floor material, `0` for none.
    pub substrate: u16,
    /// Feature on the cell, if any.
    pub feature: Option<Feature>,
    /// Occupying actor, `0` for empty.
    pub occupant: ActorHandle,
    /// Portal marker.
    pub portal: PortalKind,
    /// Stair marker.
    pub stair: StairKind,
}

impl Cell {
    /// Whether the cell has a floor.
    #[must_use]
    pub const fn has_substrate(&self) -> bool {
        self.substrate != NO_SUBSTRATE
    }

    /// Whether a blocking feature sits on the cell.
    #[must_use]
    pub fn is_feature_blocked(&self) -> bool {
        self.feature.is_some_and(|f| f.blocking)
    }

    /// Floor present, not blocked, and nobody standing on it.
    #[must_use]
    pub fn is_enterable(&self) -> bool {
        self.has_substrate() && !self.is_feature_blocked() && self.occupant == NO_ACTOR
    }
}

/// The layered dungeon map.
///
/// Occupancy is mirrored in a reverse index so an actor can be moved
/// without scanning for its old cell.
#[derive(Debug, Clone, Default)]
pub struct LevelMap {
    cells: HashMap<CellPos, Cell>,
    actor_cells: HashMap<ActorHandle, CellPos>,
}

impl LevelMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every cell and occupant.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.actor_cells.clear();
    }

    /// Number of cells that have been touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the map has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Look up a cell.
    #[must_use]
    pub fn cell(&self, pos: CellPos) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// Whether the cell has a floor.
    #[must_use]
    pub fn has_substrate(&self, pos: CellPos) -> bool {
        self.cell(pos).is_some_and(Cell::has_substrate)
    }

    /// Set the floor material of a cell.
    ///
    /// Removing a floor (`substrate == 0`) is refused while the cell hosts an
    /// actor, a portal or a stair.
    pub fn set_surface(&mut self, pos: CellPos, substrate: u16) -> bool {
        if substrate == NO_SUBSTRATE {
            let Some(cell) = self.cells.get_mut(&pos) else {
                return true;
            };
            if cell.occupant != NO_ACTOR
                || cell.portal != PortalKind::None
                || cell.stair != StairKind::None
            {
                return false;
            }
            cell.substrate = NO_SUBSTRATE;
            return true;
        }

        self.cells.entry(pos).or_default().substrate = substrate;
        true
    }

    /// Place a feature on a floored cell.
    ///
    /// A blocking feature cannot be dropped onto an occupied cell.
    pub fn set_feature(&mut self, pos: CellPos, handle: u32, blocking: bool) -> bool {
        let Some(cell) = self.cells.get_mut(&pos) else {
            return false;
        };
        if !cell.has_substrate() || (blocking && cell.occupant != NO_ACTOR) {
            return false;
        }
        cell.feature = Some(Feature { handle, blocking });
        true
    }

    /// Remove the feature from a cell. Returns `false` if there was none.
    pub fn clear_feature(&mut self, pos: CellPos) -> bool {
        self.cells
            .get_mut(&pos)
            .and_then(|cell| cell.feature.take())
            .is_some()
    }

    /// Put `actor` on `pos`.
    ///
    /// Rejects cells without floor, with a blocking feature, or held by a
    /// different actor. If `actor` already stands elsewhere, that cell is
    /// vacated first.
    pub fn set_actor(&mut self, pos: CellPos, actor: ActorHandle) -> bool {
        if actor == NO_ACTOR {
            return false;
        }
        let Some(cell) = self.cells.get(&pos) else {
            return false;
        };
        if !cell.has_substrate() || cell.is_feature_blocked() {
            return false;
        }
        if cell.occupant != NO_ACTOR && cell.occupant != actor {
            return false;
        }

        if let Some(old) = self.actor_cells.insert(actor, pos) {
            if old != pos {
                if let Some(old_cell) = self.cells.get_mut(&old) {
                    old_cell.occupant = NO_ACTOR;
                }
            }
        }
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.occupant = actor;
        }
        true
    }

    /// Remove `actor` from the map. Returns `false` if it was not placed.
    pub fn clear_actor(&mut self, actor: ActorHandle) -> bool {
        let Some(pos) = self.actor_cells.remove(&actor) else {
            return false;
        };
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.occupant = NO_ACTOR;
        }
        true
    }

    /// The actor on `pos`, or `0`.
    #[must_use]
    pub fn actor_at(&self, pos: CellPos) -> ActorHandle {
        self.cell(pos).map_or(NO_ACTOR, |c| c.occupant)
    }

    /// Where `actor` currently stands.
    #[must_use]
    pub fn position_of(&self, actor: ActorHandle) -> Option<CellPos> {
        self.actor_cells.get(&actor).copied()
    }

    /// Number of placed actors.
    #[must_use]
    pub fn occupant_count(&self) -> usize {
        self.actor_cells.len()
    }

    /// Mark a floored cell as a portal.
    pub fn set_portal(&mut self, pos: CellPos, kind: PortalKind) -> bool {
        match self.cells.get_mut(&pos) {
            Some(cell) if cell.has_substrate() => {
                cell.portal = kind;
                true
            }
            _ => false,
        }
    }

    /// Mark a floored cell as a stair.
    pub fn set_stair(&mut self, pos: CellPos, kind: StairKind) -> bool {
        match self.cells.get_mut(&pos) {
            Some(cell) if cell.has_substrate() => {
                cell.stair = kind;
                true
            }
            _ => false,
        }
    }

    /// Portal marker on a cell.
    #[must_use]
    pub fn portal_at(&self, pos: CellPos) -> PortalKind {
        self.cell(pos).map_or(PortalKind::None, |c| c.portal)
    }

    /// Stair marker on a cell.
    #[must_use]
    pub fn stair_at(&self, pos: CellPos) -> StairKind {
        self.cell(pos).map_or(StairKind::None, |c| c.stair)
    }

    /// Floor present, not feature-blocked, and unoccupied.
    #[must_use]
    pub fn is_enterable(&self, pos: CellPos) -> bool {
        self.cell(pos).is_some_and(Cell::is_enterable)
    }

    /// Whether an actor on `origin` may take `step` against current occupancy.
    ///
    /// Holding is always allowed. Level changes need a matching stair under
    /// the actor and an enterable cell on the other level.
    #[must_use]
    pub fn can_take(&self, origin: CellPos, step: Step) -> bool {
        if step.is_hold() {
            return true;
        }
        if !step.is_well_formed() {
            return false;
        }
        if step.changes_level() {
            let needed = if step.dz > 0 {
                StairKind::Down
            } else {
                StairKind::Up
            };
            if self.stair_at(origin) != needed {
                return false;
            }
        }
        origin
            .checked_offset(step)
            .is_some_and(|dest| self.is_enterable(dest))
    }

    /// Can `to` ever be reached from `from` walking on floor?
    ///
    /// Breadth-first over substrate adjacency and stair links. Actors and
    /// features are ignored, so the answer does not change as actors move.
    #[must_use]
    pub fn verify_surface_path(&self, from: CellPos, to: CellPos) -> bool {
        if !self.has_substrate(from) || !self.has_substrate(to) {
            return false;
        }
        if from == to {
            return true;
        }

        let mut visited: HashSet<CellPos> = HashSet::new();
        let mut frontier: VecDeque<CellPos> = VecDeque::new();
        visited.insert(from);
        frontier.push_back(from);

        while let Some(current) = frontier.pop_front() {
            for next in self.surface_links(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    frontier.push_back(next);
                }
            }
        }

        false
    }

    /// Floored cells connected to `pos`: the four planar neighbours plus
    /// whatever stairs join this cell to the levels above and below.
    fn surface_links(&self, pos: CellPos) -> impl Iterator<Item = CellPos> + '_ {
        let here = self.stair_at(pos);
        let below = pos
            .checked_offset(Step::DESCEND)
            .filter(|below| here == StairKind::Down || self.stair_at(*below) == StairKind::Up);
        let above = pos
            .checked_offset(Step::ASCEND)
            .filter(|above| here == StairKind::Up || self.stair_at(*above) == StairKind::Down);

        Step::CARDINALS
            .into_iter()
            .filter_map(move |step| pos.checked_offset(step))
            .chain(below)
            .chain(above)
            .filter(|next| self.has_substrate(*next))
    }

    /// Manhattan-nearest portal of `kind` on `level`.
    ///
    /// Ties go to the lowest `(y, x)`.
    #[must_use]
    pub fn find_nearest_portal(
        &self,
        from: CellPos,
        kind: PortalKind,
        level: i32,
    ) -> Option<CellPos> {
        if kind == PortalKind::None {
            return None;
        }
        self.cells
            .iter()
            .filter(|(pos, cell)| pos.level == level && cell.portal == kind)
            .map(|(pos, _)| *pos)
            .min_by_key(|pos| (pos.manhattan(from), pos.y, pos.x))
    }

    /// Occupied cells in sorted order (for hashing and diagnostics).
    #[must_use]
    pub fn sorted_occupancy(&self) -> Vec<(CellPos, ActorHandle)> {
        let mut occupied: Vec<_> = self
            .actor_cells
            .iter()
            .map(|(actor, pos)| (*pos, *actor))
            .collect();
        occupied.sort_unstable();
        occupied
    }
}
