//! Path-solver contract and the built-in grid solver.
//!
//! AIU modules talk to a solver through [`SolverRequest`] / [`SolverResult`]
//! only. Verdicts other than SAT are ordinary answers, not failures: every
//! module has a fallback for them.
//!
//! [`GridSolver`] answers reachability with a deterministic A* over the
//! enterable cells of one level. Guard-radius and waypoint queries are
//! answered UNSAT.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{CellPos, Step};
use crate::level_map::LevelMap;

/// Which query schema a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuerySchema {
    /// Is there a walkable route from A to B?
    Reachability,
    /// Can the actor hold a radius around a point?
    GuardRadius,
    /// Is there a waypoint loop of a given length?
    Waypoint,
}

/// A single solver query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverRequest {
    /// Route from `from` to `to` within `budget` node expansions.
    Reachability {
        /// Start cell.
        from: CellPos,
        /// Goal cell.
        to: CellPos,
        /// Expansion budget requested by the module.
        budget: u32,
    },
    /// Guard `center` within `radius` starting at `from`.
    GuardRadius {
        /// Actor cell.
        from: CellPos,
        /// Point to guard.
        center: CellPos,
        /// Guard radius in cells.
        radius: u32,
    },
    /// Waypoint loop of `length` starting at `from`.
    Waypoint {
        /// Actor cell.
        from: CellPos,
        /// Number of waypoints.
        length: u32,
    },
}

impl SolverRequest {
    /// Schema tag of this request.
    #[must_use]
    pub const fn schema(&self) -> QuerySchema {
        match self {
            Self::Reachability { .. } => QuerySchema::Reachability,
            Self::GuardRadius { .. } => QuerySchema::GuardRadius,
            Self::Waypoint { .. } => QuerySchema::Waypoint,
        }
    }
}

/// Solver verdict. The numeric codes are part of the host contract; `0` is
/// reserved for "no query issued".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SolverVerdict {
    /// A step was found.
    Sat = 1,
    /// Provably no route.
    Unsat = 2,
    /// Budget exhausted.
    Timeout = 3,
    /// Malformed query.
    Error = 4,
    /// Query not supported (or no solver bound).
    Unimplemented = 5,
}

impl SolverVerdict {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Sat),
            2 => Some(Self::Unsat),
            3 => Some(Self::Timeout),
            4 => Some(Self::Error),
            5 => Some(Self::Unimplemented),
            _ => None,
        }
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sat => "SAT",
            Self::Unsat => "UNSAT",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
            Self::Unimplemented => "UNIMPLEMENTED",
        }
    }
}

impl fmt::Display for SolverVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Solver answer. `step` is present exactly when the verdict is SAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolverResult {
    verdict: SolverVerdict,
    step: Option<Step>,
}

impl SolverResult {
    /// SAT with the next step.
    #[must_use]
    pub const fn sat(step: Step) -> Self {
        Self {
            verdict: SolverVerdict::Sat,
            step: Some(step),
        }
    }

    /// A non-SAT verdict. Passing `Sat` here yields a SAT with a hold step.
    #[must_use]
    pub const fn verdict_only(verdict: SolverVerdict) -> Self {
        match verdict {
            SolverVerdict::Sat => Self::sat(Step::HOLD),
            other => Self {
                verdict: other,
                step: None,
            },
        }
    }

    /// UNSAT.
    #[must_use]
    pub const fn unsat() -> Self {
        Self::verdict_only(SolverVerdict::Unsat)
    }

    /// UNIMPLEMENTED.
    #[must_use]
    pub const fn unimplemented() -> Self {
        Self::verdict_only(SolverVerdict::Unimplemented)
    }

    /// The verdict.
    #[must_use]
    pub const fn verdict(&self) -> SolverVerdict {
        self.verdict
    }

    /// The next step, when SAT.
    #[must_use]
    pub const fn step(&self) -> Option<Step> {
        self.step
    }

    /// Whether the verdict is SAT.
    #[must_use]
    pub const fn is_sat(&self) -> bool {
        matches!(self.verdict, SolverVerdict::Sat)
    }
}

/// A path-solving oracle bound to a configurator.
pub trait PathSolver: fmt::Debug + Send {
    /// Answer one query against the current map.
    fn solve(&mut self, map: &LevelMap, request: &SolverRequest) -> SolverResult;
}

/// Built-in solver: A* over enterable cells of a single level.
#[derive(Debug, Clone)]
pub struct GridSolver {
    /// Hard cap on node expansions, applied on top of each request's budget.
    max_expansions: u32,
    /// Queries answered so far.
    queries: u64,
}

impl GridSolver {
    /// Create a solver capped at `max_expansions` expansions per query.
    #[must_use]
    pub const fn new(max_expansions: u32) -> Self {
        Self {
            max_expansions,
            queries: 0,
        }
    }

    /// Number of queries answered.
    #[must_use]
    pub const fn queries(&self) -> u64 {
        self.queries
    }
}

impl Default for GridSolver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl PathSolver for GridSolver {
    fn solve(&mut self, map: &LevelMap, request: &SolverRequest) -> SolverResult {
        self.queries += 1;
        match *request {
            SolverRequest::Reachability { from, to, budget } => {
                first_step(map, from, to, budget.min(self.max_expansions))
            }
            SolverRequest::GuardRadius { from, .. } | SolverRequest::Waypoint { from, .. } => {
                if map.has_substrate(from) {
                    SolverResult::unsat()
                } else {
                    SolverResult::verdict_only(SolverVerdict::Error)
                }
            }
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: CellPos,
    /// f_score = g_score + heuristic
    f_score: u32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so reverse for min-heap behaviour.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Convert coordinates to a tie-breaker value for deterministic ordering.
#[inline]
fn coords_to_tie_breaker(pos: CellPos) -> u64 {
    (u64::from(pos.y as u32) << 32) | u64::from(pos.x as u32)
}

/// Cells a route may pass through: enterable, or the goal itself as long as
/// only an actor (not terrain) is in the way.
fn passable(map: &LevelMap, pos: CellPos, goal: CellPos) -> bool {
    if pos == goal {
        return map
            .cell(pos)
            .is_some_and(|c| c.has_substrate() && !c.is_feature_blocked());
    }
    map.is_enterable(pos)
}

/// A* from `start` to `goal`, returning only the first step.
fn first_step(map: &LevelMap, start: CellPos, goal: CellPos, budget: u32) -> SolverResult {
    if !map.has_substrate(start) {
        return SolverResult::verdict_only(SolverVerdict::Error);
    }
    if start.level != goal.level {
        return SolverResult::unimplemented();
    }
    if start == goal {
        return SolverResult::sat(Step::HOLD);
    }
    if !passable(map, goal, goal) {
        return SolverResult::unsat();
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<CellPos, CellPos> = HashMap::new();
    let mut g_score: HashMap<CellPos, u32> = HashMap::new();
    let mut expansions = 0u32;

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        pos: start,
        f_score: start.manhattan(goal),
        tie_breaker: coords_to_tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return SolverResult::sat(reconstruct_first_step(&came_from, start, goal));
        }

        expansions += 1;
        if expansions > budget {
            return SolverResult::verdict_only(SolverVerdict::Timeout);
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(u32::MAX);

        for step in Step::CARDINALS {
            let Some(next) = current.pos.checked_offset(step) else {
                continue;
            };
            if !passable(map, next, goal) {
                continue;
            }

            let tentative_g = current_g.saturating_add(1);
            let neighbor_g = g_score.get(&next).copied().unwrap_or(u32::MAX);
            if tentative_g < neighbor_g {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g.saturating_add(next.manhattan(goal)),
                    tie_breaker: coords_to_tie_breaker(next),
                });
            }
        }
    }

    SolverResult::unsat()
}

/// Walk the came-from chain back to the cell adjacent to `start`.
fn reconstruct_first_step(
    came_from: &HashMap<CellPos, CellPos>,
    start: CellPos,
    goal: CellPos,
) -> Step {
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        current = prev;
    }
    start.step_to(current).unwrap_or(Step::HOLD)
}
