//! Local 3×3 evaluation around an actor.
//!
//! The grid is indexed `[row][col]` with row 0 at the top (`dy = +1`) and
//! col 0 on the left (`dx = -1`); the actor sits at `[1][1]`. Only the four
//! cardinals are candidate moves, in N, E, S, W order.

use serde::{Deserialize, Serialize};

use crate::actor::Pool;
use crate::config::SimConfig;
use crate::geometry::{CellPos, Step};
use crate::level_map::{LevelMap, NO_ACTOR};
use crate::permit::step_cost;

/// What the actor sees in one cell of its neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalCell {
    /// The actor's own cell.
    Origin,
    /// Floor, no blocking feature, nobody there.
    Open,
    /// Floor held by another actor; may clear later.
    Occupied,
    /// No floor or a blocking feature.
    Blocked,
}

/// The local decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalChoice {
    /// Take this cardinal step.
    Move(Step),
    /// Stay put and wait for an occupied neighbour to clear.
    Wait,
}

impl LocalChoice {
    /// The step this choice amounts to.
    #[must_use]
    pub const fn step(self) -> Step {
        match self {
            Self::Move(step) => step,
            Self::Wait => Step::HOLD,
        }
    }
}

/// Full result of a local evaluation, kept for telemetry and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEvaluation {
    /// Centre of the grid.
    pub origin: CellPos,
    /// Observed neighbourhood.
    pub grid: [[LocalCell; 3]; 3],
    /// Destinations of valid cardinal moves, in N, E, S, W order.
    pub valid: Vec<CellPos>,
    /// Destinations of invalid cardinal moves, in N, E, S, W order. Moves
    /// past the edge of the coordinate range have no destination to list.
    pub invalid: Vec<CellPos>,
    /// Whether waiting is an option.
    pub wait_available: bool,
    /// First valid move, else wait if available.
    pub choice: Option<LocalChoice>,
}

impl LocalEvaluation {
    /// The cell the choice leads to.
    #[must_use]
    pub fn chosen(&self) -> Option<CellPos> {
        self.choice
            .and_then(|choice| self.origin.checked_offset(choice.step()))
    }

    /// Grid cell for a planar offset in `{-1, 0, 1}²`.
    #[must_use]
    pub fn at(&self, dx: i8, dy: i8) -> LocalCell {
        let row = usize::from((1 - dy).unsigned_abs());
        let col = usize::from((dx + 1).unsigned_abs());
        self.grid[row][col]
    }
}

fn observe(map: &LevelMap, pos: CellPos) -> LocalCell {
    match map.cell(pos) {
        Some(cell) if cell.is_enterable() => LocalCell::Open,
        Some(cell)
            if cell.has_substrate() && !cell.is_feature_blocked() && cell.occupant != NO_ACTOR =>
        {
            LocalCell::Occupied
        }
        _ => LocalCell::Blocked,
    }
}

/// Evaluate the 3×3 neighbourhood of `origin` for an actor with `stamina`.
#[must_use]
pub fn evaluate_local(
    map: &LevelMap,
    origin: CellPos,
    stamina: &Pool,
    config: &SimConfig,
) -> LocalEvaluation {
    let mut grid = [[LocalCell::Blocked; 3]; 3];
    for (row, dy) in [1i8, 0, -1].into_iter().enumerate() {
        for (col, dx) in [-1i8, 0, 1].into_iter().enumerate() {
            grid[row][col] = if dx == 0 && dy == 0 {
                LocalCell::Origin
            } else {
                origin
                    .checked_offset(Step::planar(dx, dy))
                    .map_or(LocalCell::Blocked, |pos| observe(map, pos))
            };
        }
    }

    let mut evaluation = LocalEvaluation {
        origin,
        grid,
        valid: Vec::with_capacity(4),
        invalid: Vec::with_capacity(4),
        wait_available: false,
        choice: None,
    };

    let mut first_valid = None;
    for step in Step::CARDINALS {
        let Some(dest) = origin.checked_offset(step) else {
            continue;
        };
        let cell = evaluation.at(step.dx, step.dy);
        let affordable = step_cost(stamina.max, config.move_cost_percent, step) <= stamina.current;
        if cell == LocalCell::Open && affordable {
            evaluation.valid.push(dest);
            first_valid.get_or_insert(step);
        } else {
            evaluation.invalid.push(dest);
            if cell == LocalCell::Occupied {
                evaluation.wait_available = true;
            }
        }
    }

    evaluation.choice = match first_valid {
        Some(step) => Some(LocalChoice::Move(step)),
        None if evaluation.wait_available => Some(LocalChoice::Wait),
        None => None,
    };
    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(map: &mut LevelMap, w: i32, h: i32) {
        for y in 0..h {
            for x in 0..w {
                map.set_surface(CellPos::new(x, y, 0), 1);
            }
        }
    }

    #[test]
    fn test_north_and_west_open() {
        let mut map = LevelMap::new();
        room(&mut map, 3, 3);
        map.set_feature(CellPos::new(2, 1, 0), 1, true);
        map.set_feature(CellPos::new(1, 0, 0), 2, true);
        let origin = CellPos::new(1, 1, 0);
        map.set_actor(origin, 1);

        let eval = evaluate_local(&map, origin, &Pool::full(100), &SimConfig::default());
        assert_eq!(eval.valid, vec![CellPos::new(1, 2, 0), CellPos::new(0, 1, 0)]);
        assert_eq!(eval.invalid, vec![CellPos::new(2, 1, 0), CellPos::new(1, 0, 0)]);
        assert_eq!(eval.chosen(), Some(CellPos::new(1, 2, 0)));
        assert_eq!(eval.choice, Some(LocalChoice::Move(Step::NORTH)));
        assert_eq!(eval.at(1, 0), LocalCell::Blocked);
        assert_eq!(eval.at(0, 0), LocalCell::Origin);
        assert_eq!(eval.at(-1, 1), LocalCell::Open);
    }

    #[test]
    fn test_wait_only_when_blocked_by_actor() {
        let mut map = LevelMap::new();
        room(&mut map, 2, 1);
        map.set_actor(CellPos::new(0, 0, 0), 1);
        map.set_actor(CellPos::new(1, 0, 0), 2);

        let eval = evaluate_local(
            &map,
            CellPos::new(0, 0, 0),
            &Pool::full(100),
            &SimConfig::default(),
        );
        assert!(eval.valid.is_empty());
        assert!(eval.wait_available);
        assert_eq!(eval.choice, Some(LocalChoice::Wait));
        assert_eq!(eval.chosen(), Some(CellPos::new(0, 0, 0)));
    }

    #[test]
    fn test_nothing_when_walled_in() {
        let mut map = LevelMap::new();
        room(&mut map, 1, 1);
        let eval = evaluate_local(
            &map,
            CellPos::new(0, 0, 0),
            &Pool::full(100),
            &SimConfig::default(),
        );
        assert!(!eval.wait_available);
        assert_eq!(eval.choice, None);
        assert_eq!(eval.invalid.len(), 4);
    }

    #[test]
    fn test_unaffordable_moves_are_invalid() {
        let mut map = LevelMap::new();
        room(&mut map, 3, 3);
        let eval = evaluate_local(
            &map,
            CellPos::new(1, 1, 0),
            &Pool::with_current(0, 100),
            &SimConfig::default(),
        );
        assert!(eval.valid.is_empty());
        assert_eq!(eval.choice, None);
    }

    #[test]
    fn test_coordinate_edge_reads_as_blocked() {
        let mut map = LevelMap::new();
        let origin = CellPos::new(i32::MAX, 0, 0);
        map.set_surface(origin, 1);
        map.set_surface(CellPos::new(i32::MAX - 1, 0, 0), 1);

        let eval = evaluate_local(&map, origin, &Pool::full(100), &SimConfig::default());
        assert_eq!(eval.at(1, 0), LocalCell::Blocked);
        assert_eq!(eval.at(1, 1), LocalCell::Blocked);
        assert_eq!(eval.valid, vec![CellPos::new(i32::MAX - 1, 0, 0)]);
        assert_eq!(eval.invalid.len(), 2);
        assert_eq!(eval.choice, Some(LocalChoice::Move(Step::WEST)));
    }
}
