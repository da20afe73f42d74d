//! Test fixtures and helpers.
//!
//! Pre-built rooms, corridors and actor placements for consistent testing,
//! plus a solver whose answers are scripted in advance.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use delve_core::actor::{ActorSpawn, ResourcePools};
use delve_core::config::SimConfig;
use delve_core::configurator::Configurator;
use delve_core::coordinator::Coordinator;
use delve_core::geometry::CellPos;
use delve_core::ledger::ActorHandle;
use delve_core::level_map::LevelMap;
use delve_core::solver::{PathSolver, SolverRequest, SolverResult};

/// Substrate id used by every fixture floor.
pub const FLOOR: u16 = 1;

/// Shorthand for a level-0 cell.
#[must_use]
pub const fn cell(x: i32, y: i32) -> CellPos {
    CellPos::new(x, y, 0)
}

/// Lay a `width` x `height` floor with its south-west corner at the origin.
pub fn fill_room(configurator: &mut Configurator, width: i32, height: i32, level: i32) {
    for y in 0..height {
        for x in 0..width {
            configurator.set_surface(CellPos::new(x, y, level), FLOOR);
        }
    }
}

/// A configurator holding a single open room on level 0.
#[must_use]
pub fn room(width: i32, height: i32) -> Configurator {
    room_with(SimConfig::default(), width, height)
}

/// Like [`room`] with explicit tunables.
#[must_use]
pub fn room_with(config: SimConfig, width: i32, height: i32) -> Configurator {
    let mut configurator = Configurator::new(config);
    fill_room(&mut configurator, width, height, 0);
    configurator
}

/// A one-cell-wide east-west corridor of `length` cells.
#[must_use]
pub fn corridor(length: i32) -> Configurator {
    room(length, 1)
}

/// A coordinator around an open room.
#[must_use]
pub fn room_coordinator(config: SimConfig, width: i32, height: i32) -> Coordinator {
    Coordinator::with_configurator(room_with(config, width, height))
}

/// Place a default mobile actor.
///
/// # Panics
///
/// Panics if the cell cannot host the actor.
pub fn place(configurator: &mut Configurator, x: i32, y: i32) -> ActorHandle {
    place_with(configurator, cell(x, y), ActorSpawn::default())
}

/// Place an actor from explicit spawn parameters.
///
/// # Panics
///
/// Panics if the cell cannot host the actor.
pub fn place_with(configurator: &mut Configurator, pos: CellPos, spawn: ActorSpawn) -> ActorHandle {
    match configurator.place_actor(pos, spawn) {
        Ok(handle) => handle,
        Err(err) => panic!("fixture placement at {pos} failed: {err}"),
    }
}

/// Place one default actor on every `stride`-th cell of a `width` x `height`
/// room, row by row. Returns the handles in placement order.
pub fn crowd(configurator: &mut Configurator, width: i32, height: i32, stride: usize) -> Vec<ActorHandle> {
    let stride = stride.max(1);
    let mut handles = Vec::new();
    let cells = (0..height).flat_map(|y| (0..width).map(move |x| cell(x, y)));
    for pos in cells.step_by(stride) {
        if let Ok(handle) = configurator.place_actor(pos, ActorSpawn::default()) {
            handles.push(handle);
        }
    }
    handles
}

/// Set an actor's stamina to `percent` of its max and its other pools full.
///
/// # Panics
///
/// Panics if the actor is unknown.
pub fn drain_stamina(configurator: &mut Configurator, actor: ActorHandle, percent: u32) {
    let Some(record) = configurator.record(actor) else {
        panic!("unknown fixture actor {actor}");
    };
    let max = record.pools.stamina.max;
    let mut pools = ResourcePools::uniform(max);
    pools.stamina.current = max * percent.min(100) / 100;
    if let Err(err) = configurator.set_pools(actor, pools) {
        panic!("draining actor {actor} failed: {err}");
    }
}

/// Requests seen by a [`ScriptedSolver`], readable after the solver has
/// been handed to a configurator.
#[derive(Debug, Clone, Default)]
pub struct SolverLog {
    requests: Arc<Mutex<Vec<SolverRequest>>>,
}

impl SolverLog {
    fn push(&self, request: SolverRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    /// Every request so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<SolverRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the solver was never asked anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Answers queries from a queue, then repeats a fallback answer forever.
#[derive(Debug)]
pub struct ScriptedSolver {
    script: VecDeque<SolverResult>,
    fallback: SolverResult,
    log: SolverLog,
}

impl ScriptedSolver {
    /// A solver that answers `fallback` to everything.
    #[must_use]
    pub fn always(fallback: SolverResult) -> Self {
        Self {
            script: VecDeque::new(),
            fallback,
            log: SolverLog::default(),
        }
    }

    /// A solver that plays `script` in order, then answers UNSAT.
    #[must_use]
    pub fn scripted(script: impl IntoIterator<Item = SolverResult>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::always(SolverResult::unsat())
        }
    }

    /// Handle to the request log.
    #[must_use]
    pub fn log(&self) -> SolverLog {
        self.log.clone()
    }

    /// Box the solver and bind it to `configurator`, returning the log.
    pub fn bind(self, configurator: &mut Configurator) -> SolverLog {
        let log = self.log();
        configurator.bind_solver(Box::new(self));
        log
    }
}

impl PathSolver for ScriptedSolver {
    fn solve(&mut self, _map: &LevelMap, request: &SolverRequest) -> SolverResult {
        self.log.push(*request);
        self.script.pop_front().unwrap_or(self.fallback)
    }
}
