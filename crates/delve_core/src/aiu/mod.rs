//! AIU decision modules.
//!
//! An AIU proposes one movement intent per tick. Every module follows the
//! same protocol:
//!
//! 1. [`AiuKind::prepare`] may produce one [`SolverRequest`].
//! 2. If it does, the request goes to the bound solver and the answer is
//!    handed to [`AiuKind::interpret`].
//! 3. If it does not, [`AiuKind::plan_without_solver`] runs instead.
//!
//! Modules are stateless; anything that must survive between ticks (patrol
//! progress, visited cells) lives on the actor record and arrives through
//! [`AiuContext`].

mod cultivate;
mod exit;
mod explore;
mod patrol;
mod probe;
mod sentinel;
mod wander;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actor::{ActorRecord, ResourcePools};
use crate::config::SimConfig;
use crate::cultivation::CultivationTracker;
use crate::error::{CoreError, Result};
use crate::geometry::{CellPos, Step};
use crate::ledger::ActorHandle;
use crate::level_map::LevelMap;
use crate::solver::{PathSolver, SolverRequest, SolverResult, SolverVerdict};

pub use probe::{probe, ProbeOutcome};
pub use wander::rotation_seed;

/// AIU module identifier. `0` means "instinct only".
pub type AiuId = u32;

/// The "no module" id.
pub const NO_AIU: AiuId = 0;

/// Ids at or above this run a generic solver probe before their own logic.
pub const SOLVER_PROBE_THRESHOLD: AiuId = 9000;

/// Module kinds in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiuKind {
    /// Deterministic pseudo-random wandering.
    RandomWalk,
    /// Head for unvisited neighbouring cells.
    Explore,
    /// Probe a guard radius and hold.
    GuardRadius,
    /// Probe a waypoint loop and hold.
    Waypoint,
    /// Walk towards the nearest exit portal.
    FindExit,
    /// Stay close to the nearest exit portal.
    DefendExit,
    /// Cycle N, E, S, W along a corridor.
    PatrolCorridor,
    /// Stand still and regenerate.
    Cultivation,
}

impl AiuKind {
    /// Build the solver request for this tick, if the module wants one.
    #[must_use]
    pub fn prepare(self, ctx: &AiuContext<'_>) -> Option<SolverRequest> {
        match self {
            Self::Explore => explore::prepare(ctx),
            Self::GuardRadius => sentinel::prepare_guard(ctx),
            Self::Waypoint => sentinel::prepare_waypoint(ctx),
            Self::FindExit => exit::prepare_find(ctx),
            Self::DefendExit => exit::prepare_defend(ctx),
            Self::RandomWalk | Self::PatrolCorridor | Self::Cultivation => None,
        }
    }

    /// Turn a solver answer into an intent.
    #[must_use]
    pub fn interpret(
        self,
        ctx: &AiuContext<'_>,
        request: &SolverRequest,
        result: &SolverResult,
    ) -> Option<AiuIntent> {
        let intent = match self {
            Self::Explore => explore::interpret(ctx, request, result),
            Self::GuardRadius | Self::Waypoint => Some(AiuIntent::hold()),
            Self::FindExit => exit::interpret_find(ctx, request, result),
            Self::DefendExit => exit::interpret_defend(ctx, request, result),
            Self::RandomWalk | Self::PatrolCorridor | Self::Cultivation => {
                self.plan_without_solver(ctx)
            }
        };
        intent.map(|i| i.with_verdict(result.verdict()))
    }

    /// Plan when no solver request was produced.
    #[must_use]
    pub fn plan_without_solver(self, ctx: &AiuContext<'_>) -> Option<AiuIntent> {
        match self {
            Self::RandomWalk | Self::Explore => wander::walk(ctx),
            Self::GuardRadius | Self::Waypoint | Self::DefendExit => Some(AiuIntent::hold()),
            Self::FindExit => exit::plan_find_without_solver(ctx),
            Self::PatrolCorridor => patrol::plan(ctx),
            Self::Cultivation => cultivate::plan(ctx),
        }
    }

    /// Run the full prepare → solve → interpret protocol.
    pub fn evaluate(self, ctx: &AiuContext<'_>, solver: &mut SolverLink<'_>) -> Option<AiuIntent> {
        match self.prepare(ctx) {
            Some(request) => {
                let result = solver.query(&request);
                self.interpret(ctx, &request, &result)
            }
            None => self.plan_without_solver(ctx),
        }
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RandomWalk => "random-walk",
            Self::Explore => "explore",
            Self::GuardRadius => "guard-radius",
            Self::Waypoint => "waypoint",
            Self::FindExit => "find-exit",
            Self::DefendExit => "defend-exit",
            Self::PatrolCorridor => "patrol-corridor",
            Self::Cultivation => "cultivation",
        }
    }
}

impl fmt::Display for AiuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side-state mode attached to an intent. Codes are part of the host contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AiuMode {
    /// No side effect.
    #[default]
    None = 0,
    /// Holding still to regenerate.
    Cultivate = 1,
    /// Walking a patrol; `aux` carries the next waypoint index.
    Patrol = 2,
}

impl AiuMode {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cultivate => "cultivate",
            Self::Patrol => "patrol",
        }
    }
}

/// What a module proposes for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AiuIntent {
    /// Proposed step.
    pub step: Step,
    /// Verdict of the solver query behind this intent, if one was issued.
    pub solver: Option<SolverVerdict>,
    /// Side-state mode.
    pub mode: AiuMode,
    /// Module-specific auxiliary value.
    pub aux: i32,
}

impl AiuIntent {
    /// Move by `step` with no side effects.
    #[must_use]
    pub const fn step(step: Step) -> Self {
        Self {
            step,
            solver: None,
            mode: AiuMode::None,
            aux: 0,
        }
    }

    /// Stay in place.
    #[must_use]
    pub const fn hold() -> Self {
        Self::step(Step::HOLD)
    }

    /// Record the verdict that produced this intent (first one wins).
    #[must_use]
    pub const fn with_verdict(mut self, verdict: SolverVerdict) -> Self {
        if self.solver.is_none() {
            self.solver = Some(verdict);
        }
        self
    }
}

/// Read-only view of everything a module may consult.
#[derive(Debug, Clone, Copy)]
pub struct AiuContext<'a> {
    /// Deciding actor.
    pub actor: ActorHandle,
    /// Module id being evaluated.
    pub aiu: AiuId,
    /// Actor's current cell.
    pub origin: CellPos,
    /// Per-tick seed.
    pub tick_seed: u32,
    /// Live map.
    pub map: &'a LevelMap,
    /// Actor's pools.
    pub pools: &'a ResourcePools,
    /// Actor's cultivation counters.
    pub cultivation: CultivationTracker,
    /// Actor's stored patrol index.
    pub patrol_index: u8,
    /// Cells the actor has visited.
    pub visited: &'a BTreeSet<CellPos>,
    /// Tunables.
    pub config: &'a SimConfig,
}

impl AiuContext<'_> {
    /// Whether `step` from the origin passes the map's enterability check.
    #[must_use]
    pub fn can_take(&self, step: Step) -> bool {
        self.map.can_take(self.origin, step)
    }

    /// Rotation seed shared by random walk and the fallback scan.
    #[must_use]
    pub fn rotation_seed(&self) -> u32 {
        rotation_seed(self.aiu, self.actor, self.tick_seed)
    }

    /// Solver budget for this actor: its remaining stamina.
    #[must_use]
    pub fn solver_budget(&self) -> u32 {
        self.pools.stamina.current
    }
}

/// The configurator's solver, if one is bound.
///
/// Without a solver every query is answered UNIMPLEMENTED, which every
/// module already treats as "fall back".
#[derive(Debug)]
pub struct SolverLink<'a> {
    solver: Option<&'a mut Box<dyn PathSolver>>,
    map: &'a LevelMap,
    queries: u32,
}

impl<'a> SolverLink<'a> {
    /// Wrap an optional solver for queries against `map`.
    #[must_use]
    pub fn new(solver: Option<&'a mut Box<dyn PathSolver>>, map: &'a LevelMap) -> Self {
        Self {
            solver,
            map,
            queries: 0,
        }
    }

    /// A link with no solver.
    #[must_use]
    pub fn detached(map: &'a LevelMap) -> Self {
        Self::new(None, map)
    }

    /// Send one request.
    pub fn query(&mut self, request: &SolverRequest) -> SolverResult {
        self.queries += 1;
        let result = match self.solver.as_mut() {
            Some(solver) => solver.solve(self.map, request),
            None => SolverResult::unimplemented(),
        };
        tracing::trace!(
            schema = ?request.schema(),
            verdict = %result.verdict(),
            "solver query"
        );
        result
    }

    /// Queries sent through this link.
    #[must_use]
    pub const fn queries(&self) -> u32 {
        self.queries
    }
}

/// One catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiuSpec {
    /// Module id.
    pub id: AiuId,
    /// Module kind.
    pub kind: AiuKind,
    /// Activation cost (reported to telemetry).
    pub base_cost: u32,
    /// Per-tick upkeep (reported to telemetry).
    pub upkeep_cost: u32,
    /// Minimum current stamina to be assigned.
    pub min_stamina: u32,
    /// Whether enhanced observation is required.
    #[serde(default)]
    pub requires_enhanced_observation: bool,
}

impl AiuSpec {
    const fn new(id: AiuId, kind: AiuKind, base: u32, upkeep: u32, min_stamina: u32) -> Self {
        Self {
            id,
            kind,
            base_cost: base,
            upkeep_cost: upkeep,
            min_stamina,
            requires_enhanced_observation: false,
        }
    }

    const fn observing(mut self) -> Self {
        self.requires_enhanced_observation = true;
        self
    }

    /// Whether this module runs the generic solver probe first.
    #[must_use]
    pub const fn uses_solver_probe(&self) -> bool {
        self.id >= SOLVER_PROBE_THRESHOLD
    }

    /// Check an actor against this module's prerequisites.
    pub fn check_prerequisites(&self, record: &ActorRecord) -> Result<()> {
        if record.pools.stamina.current < self.min_stamina {
            return Err(CoreError::PrerequisiteNotMet {
                aiu: self.id,
                reason: format!(
                    "stamina {} below minimum {}",
                    record.pools.stamina.current, self.min_stamina
                ),
            });
        }
        if self.requires_enhanced_observation && !record.enhanced_observation {
            return Err(CoreError::PrerequisiteNotMet {
                aiu: self.id,
                reason: "enhanced observation required".into(),
            });
        }
        Ok(())
    }
}

/// The shared, stateless module catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiuCatalog {
    entries: BTreeMap<AiuId, AiuSpec>,
}

impl AiuCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard module set.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for spec in [
            AiuSpec::new(1, AiuKind::RandomWalk, 1, 0, 0),
            AiuSpec::new(2, AiuKind::Explore, 2, 1, 10),
            AiuSpec::new(3, AiuKind::GuardRadius, 2, 1, 0).observing(),
            AiuSpec::new(4, AiuKind::Waypoint, 2, 1, 0),
            AiuSpec::new(5, AiuKind::FindExit, 3, 1, 10),
            AiuSpec::new(6, AiuKind::DefendExit, 3, 1, 0).observing(),
            AiuSpec::new(7, AiuKind::PatrolCorridor, 1, 0, 0),
            AiuSpec::new(8, AiuKind::Cultivation, 0, 0, 0),
            AiuSpec::new(9002, AiuKind::Explore, 3, 1, 10),
            AiuSpec::new(9005, AiuKind::FindExit, 4, 1, 10).observing(),
        ] {
            catalog.insert(spec);
        }
        catalog
    }

    /// Parse a catalog from a RON list of specs.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let specs: Vec<AiuSpec> = ron::from_str(ron).map_err(|e| CoreError::DataParseError {
            path: "<catalog>".into(),
            message: e.to_string(),
        })?;
        let mut catalog = Self::new();
        for spec in specs {
            if spec.id == NO_AIU {
                return Err(CoreError::DataParseError {
                    path: "<catalog>".into(),
                    message: "AIU id 0 is reserved".into(),
                });
            }
            catalog.insert(spec);
        }
        Ok(catalog)
    }

    /// Add or replace a row.
    pub fn insert(&mut self, spec: AiuSpec) {
        self.entries.insert(spec.id, spec);
    }

    /// Look up a module.
    #[must_use]
    pub fn get(&self, id: AiuId) -> Option<&AiuSpec> {
        self.entries.get(&id)
    }

    /// The first id registered for a kind.
    #[must_use]
    pub fn id_of(&self, kind: AiuKind) -> Option<AiuId> {
        self.entries
            .values()
            .find(|spec| spec.kind == kind)
            .map(|spec| spec.id)
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::actor::{ActorSpawn, Pool};

    #[test]
    fn test_standard_catalog() {
        let catalog = AiuCatalog::standard();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.get(8).map(|s| s.kind), Some(AiuKind::Cultivation));
        assert!(catalog.get(9002).is_some_and(AiuSpec::uses_solver_probe));
        assert!(!catalog.get(2).is_some_and(AiuSpec::uses_solver_probe));
        assert_eq!(catalog.id_of(AiuKind::PatrolCorridor), Some(7));
        assert!(catalog.get(NO_AIU).is_none());
    }

    #[test]
    fn test_prerequisites() {
        let catalog = AiuCatalog::standard();
        let mut record = ActorRecord::new(1, &ActorSpawn::default(), CellPos::default());

        assert!(catalog.get(2).unwrap().check_prerequisites(&record).is_ok());
        assert!(catalog.get(3).unwrap().check_prerequisites(&record).is_err());

        record.pools.stamina = Pool::with_current(5, 100);
        let err = catalog.get(2).unwrap().check_prerequisites(&record).unwrap_err();
        assert!(matches!(err, CoreError::PrerequisiteNotMet { aiu: 2, .. }));

        record.enhanced_observation = true;
        assert!(catalog.get(3).unwrap().check_prerequisites(&record).is_ok());
    }

    #[test]
    fn test_catalog_from_ron() {
        let catalog = AiuCatalog::from_ron_str(
            "[(id: 12, kind: Waypoint, base_cost: 1, upkeep_cost: 0, min_stamina: 0)]",
        )
        .unwrap();
        assert_eq!(catalog.get(12).map(|s| s.kind), Some(AiuKind::Waypoint));

        let reserved = AiuCatalog::from_ron_str(
            "[(id: 0, kind: Waypoint, base_cost: 1, upkeep_cost: 0, min_stamina: 0)]",
        );
        assert!(reserved.is_err());
    }

    #[test]
    fn test_detached_link_answers_unimplemented() {
        let scratch = Scratch::room(3, 3);
        let mut link = SolverLink::detached(&scratch.map);
        let result = link.query(&SolverRequest::Waypoint {
            from: CellPos::new(1, 1, 0),
            length: 4,
        });
        assert_eq!(result.verdict(), SolverVerdict::Unimplemented);
        assert_eq!(link.queries(), 1);
    }

    #[test]
    fn test_every_kind_tolerates_perpetual_unsat() {
        let scratch = Scratch::room(5, 5);
        let mut solver: Box<dyn PathSolver> = Box::new(FixedSolver(SolverResult::unsat()));
        for kind in [
            AiuKind::RandomWalk,
            AiuKind::Explore,
            AiuKind::GuardRadius,
            AiuKind::Waypoint,
            AiuKind::FindExit,
            AiuKind::DefendExit,
            AiuKind::PatrolCorridor,
        ] {
            let ctx = scratch.ctx(1, CellPos::new(2, 2, 0));
            let mut link = SolverLink::new(Some(&mut solver), &scratch.map);
            let intent = kind.evaluate(&ctx, &mut link);
            assert!(intent.is_some(), "{kind} produced no intent under UNSAT");
            assert!(ctx.can_take(intent.unwrap().step), "{kind} chose a blocked step");
        }
    }

    #[test]
    fn test_interpret_records_verdict() {
        let scratch = Scratch::room(3, 3);
        let ctx = scratch.ctx(3, CellPos::new(1, 1, 0));
        let request = AiuKind::GuardRadius.prepare(&ctx).unwrap();
        let intent = AiuKind::GuardRadius
            .interpret(&ctx, &request, &SolverResult::unsat())
            .unwrap();
        assert_eq!(intent.step, Step::HOLD);
        assert_eq!(intent.solver, Some(SolverVerdict::Unsat));
    }
}
