//! Cell coordinates and unit steps.
//!
//! North is `+y`, east is `+x`. Levels count downward: a "down" stair at
//! level `L` leads to level `L + 1`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::StepScale;

/// A cell address in the layered map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellPos {
    /// Column.
    pub x: i32,
    /// Row (north is `+y`).
    pub y: i32,
    /// Level index (deeper levels are larger).
    pub level: i32,
}

impl CellPos {
    /// Create a cell address.
    #[must_use]
    pub const fn new(x: i32, y: i32, level: i32) -> Self {
        Self { x, y, level }
    }

    /// The cell reached by taking `step` from here, or `None` past the edge
    /// of the coordinate range.
    #[must_use]
    pub const fn checked_offset(self, step: Step) -> Option<Self> {
        let (Some(x), Some(y), Some(level)) = (
            self.x.checked_add(step.dx as i32),
            self.y.checked_add(step.dy as i32),
            self.level.checked_add(step.dz as i32),
        ) else {
            return None;
        };
        Some(Self { x, y, level })
    }

    /// Manhattan distance within the plane (levels ignored), saturating.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// The 3×3 neighbourhood offset of `other` relative to `self`, if it is
    /// on the same level and at most one cell away on each axis.
    #[must_use]
    pub fn step_to(self, other: Self) -> Option<Step> {
        if self.level != other.level {
            return None;
        }
        if self.x.abs_diff(other.x) > 1 || self.y.abs_diff(other.y) > 1 {
            return None;
        }
        let dx = i64::from(other.x) - i64::from(self.x);
        let dy = i64::from(other.y) - i64::from(self.y);
        Some(Step::planar(dx as i8, dy as i8))
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, L{})", self.x, self.y, self.level)
    }
}

/// A one-cell movement vector. Each component is in `{-1, 0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Step {
    /// East/west component.
    pub dx: i8,
    /// North/south component.
    pub dy: i8,
    /// Level component (`+1` descends).
    #[serde(default)]
    pub dz: i8,
}

impl Step {
    /// Stay in place.
    pub const HOLD: Self = Self::planar(0, 0);
    /// One cell north.
    pub const NORTH: Self = Self::planar(0, 1);
    /// One cell east.
    pub const EAST: Self = Self::planar(1, 0);
    /// One cell south.
    pub const SOUTH: Self = Self::planar(0, -1);
    /// One cell west.
    pub const WEST: Self = Self::planar(-1, 0);
    /// One level down (stairs).
    pub const DESCEND: Self = Self { dx: 0, dy: 0, dz: 1 };
    /// One level up (stairs).
    pub const ASCEND: Self = Self { dx: 0, dy: 0, dz: -1 };

    /// Cardinal directions in N, E, S, W order.
    pub const CARDINALS: [Self; 4] = [Self::NORTH, Self::EAST, Self::SOUTH, Self::WEST];

    /// All eight planar directions, clockwise from north.
    pub const COMPASS: [Self; 8] = [
        Self::NORTH,
        Self::planar(1, 1),
        Self::EAST,
        Self::planar(1, -1),
        Self::SOUTH,
        Self::planar(-1, -1),
        Self::WEST,
        Self::planar(-1, 1),
    ];

    /// A step on the current level.
    #[must_use]
    pub const fn planar(dx: i8, dy: i8) -> Self {
        Self { dx, dy, dz: 0 }
    }

    /// Build a step from arbitrary integers, clamping each axis to `{-1, 0, 1}`.
    #[must_use]
    pub fn clamped(dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            dx: dx.signum() as i8,
            dy: dy.signum() as i8,
            dz: dz.signum() as i8,
        }
    }

    /// Whether this is the zero vector.
    #[must_use]
    pub const fn is_hold(self) -> bool {
        self.dx == 0 && self.dy == 0 && self.dz == 0
    }

    /// Whether the step changes level.
    #[must_use]
    pub const fn changes_level(self) -> bool {
        self.dz != 0
    }

    /// Whether the step is a planar diagonal.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        self.dx != 0 && self.dy != 0
    }

    /// Whether every component is in `{-1, 0, 1}` and a level change is not
    /// combined with a planar move.
    #[must_use]
    pub const fn is_well_formed(self) -> bool {
        let unit =
            self.dx.unsigned_abs() <= 1 && self.dy.unsigned_abs() <= 1 && self.dz.unsigned_abs() <= 1;
        unit && (self.dz == 0 || (self.dx == 0 && self.dy == 0))
    }

    /// Cost scale for this step, or `None` for a hold.
    #[must_use]
    pub const fn scale(self) -> Option<StepScale> {
        if self.is_hold() {
            None
        } else if self.changes_level() {
            Some(StepScale::LevelChange)
        } else if self.is_diagonal() {
            Some(StepScale::Diagonal)
        } else {
            Some(StepScale::Cardinal)
        }
    }

    /// Collapse a planar step to a single axis.
    ///
    /// On a diagonal, keeps the axis where `bias` (usually the remaining
    /// distance to a goal) has the larger magnitude; x wins ties.
    #[must_use]
    pub fn single_axis(self, bias_x: i64, bias_y: i64) -> Self {
        if !self.is_diagonal() {
            return self;
        }
        if bias_x.unsigned_abs() >= bias_y.unsigned_abs() {
            Self::planar(self.dx, 0)
        } else {
            Self::planar(0, self.dy)
        }
    }

    /// Short compass label used by telemetry.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match (self.dx, self.dy, self.dz) {
            (0, 0, 0) => "hold",
            (_, _, 1) => "down",
            (_, _, -1) => "up",
            (0, 1, _) => "N",
            (1, 1, _) => "NE",
            (1, 0, _) => "E",
            (1, -1, _) => "SE",
            (0, -1, _) => "S",
            (-1, -1, _) => "SW",
            (-1, 0, _) => "W",
            (-1, 1, _) => "NW",
            _ => "?",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
