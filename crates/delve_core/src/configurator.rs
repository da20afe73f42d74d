//! The configurator: one independent simulation instance.
//!
//! Owns the map, both ledgers, every actor record, the staged director
//! overrides, the dispatch history and the solver connection. The AIU
//! catalog is shared and read-only.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::actor::{ActorRecord, ActorSpawn, ResourcePools, StagedStep};
use crate::aiu::{AiuCatalog, AiuId, NO_AIU};
use crate::config::SimConfig;
use crate::error::{CoreError, Result};
use crate::geometry::{CellPos, Step};
use crate::history::{DispatchHistory, HistoryBook};
use crate::ledger::{
    ActorHandle, ActorLedger, ActorPlacementEntry, SurfaceLedger, SurfacePlacementEntry,
};
use crate::level_map::{LevelMap, PortalKind, StairKind};
use crate::resource_codec::ResourceSnapshot;
use crate::solver::PathSolver;

/// One simulation instance.
#[derive(Debug)]
pub struct Configurator {
    pub(crate) config: SimConfig,
    pub(crate) catalog: Arc<AiuCatalog>,
    pub(crate) map: LevelMap,
    actors: ActorLedger,
    surfaces: SurfaceLedger,
    pub(crate) records: HashMap<ActorHandle, ActorRecord>,
    pub(crate) broadcast: Option<StagedStep>,
    pub(crate) history: HistoryBook,
    pub(crate) solver: Option<Box<dyn PathSolver>>,
    next_handle: ActorHandle,
}

impl Configurator {
    /// A configurator with the standard AIU catalog.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_catalog(config, Arc::new(AiuCatalog::standard()))
    }

    /// A configurator sharing an existing catalog.
    #[must_use]
    pub fn with_catalog(config: SimConfig, catalog: Arc<AiuCatalog>) -> Self {
        Self {
            config,
            catalog,
            map: LevelMap::new(),
            actors: ActorLedger::new(),
            surfaces: SurfaceLedger::new(),
            records: HashMap::new(),
            broadcast: None,
            history: HistoryBook::default(),
            solver: None,
            next_handle: 1,
        }
    }

    /// Wipe map, ledgers, records and overrides.
    ///
    /// The solver connection, the dispatch history and the handle counter
    /// survive.
    pub fn initialize(&mut self) {
        self.map.clear();
        self.actors.clear();
        self.surfaces.clear();
        self.records.clear();
        self.broadcast = None;
        debug!(next_handle = self.next_handle, "configurator initialized");
    }

    /// Bind a solver, replacing any previous one.
    pub fn bind_solver(&mut self, solver: Box<dyn PathSolver>) {
        self.solver = Some(solver);
    }

    /// Release the solver connection, handing it back.
    pub fn release_solver(&mut self) -> Option<Box<dyn PathSolver>> {
        self.solver.take()
    }

    /// Whether a solver is bound.
    #[must_use]
    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Tunables.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Shared AIU catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<AiuCatalog> {
        &self.catalog
    }

    /// Read-only map.
    #[must_use]
    pub const fn map(&self) -> &LevelMap {
        &self.map
    }

    /// Actor placement ledger.
    #[must_use]
    pub const fn actor_ledger(&self) -> &ActorLedger {
        &self.actors
    }

    /// Surface placement ledger.
    #[must_use]
    pub const fn surface_ledger(&self) -> &SurfaceLedger {
        &self.surfaces
    }

    // ---- terrain ----

    /// Set a floor and record it in the surface ledger.
    pub fn set_surface(&mut self, pos: CellPos, substrate: u16) -> bool {
        let ok = self.map.set_surface(pos, substrate);
        if ok {
            self.surfaces.record(SurfacePlacementEntry {
                position: pos,
                substrate,
            });
        }
        ok
    }

    /// Place a feature.
    pub fn set_feature(&mut self, pos: CellPos, handle: u32, blocking: bool) -> bool {
        self.map.set_feature(pos, handle, blocking)
    }

    /// Remove a feature.
    pub fn clear_feature(&mut self, pos: CellPos) -> bool {
        self.map.clear_feature(pos)
    }

    /// Mark a portal.
    pub fn set_portal(&mut self, pos: CellPos, kind: PortalKind) -> bool {
        self.map.set_portal(pos, kind)
    }

    /// Mark a stair.
    pub fn set_stair(&mut self, pos: CellPos, kind: StairKind) -> bool {
        self.map.set_stair(pos, kind)
    }

    // ---- actors ----

    /// Place a new actor and return its handle.
    pub fn place_actor(&mut self, pos: CellPos, spawn: ActorSpawn) -> Result<ActorHandle> {
        let handle = self.next_handle;
        if !self.map.is_enterable(pos) || !self.map.set_actor(pos, handle) {
            return Err(CoreError::PlacementRejected {
                x: pos.x,
                y: pos.y,
                level: pos.level,
            });
        }
        self.next_handle += 1;
        self.records
            .insert(handle, ActorRecord::new(handle, &spawn, pos));
        self.actors.record(ActorPlacementEntry {
            handle,
            position: pos,
            role: spawn.role,
        });
        debug!(actor = handle, %pos, role = ?spawn.role, "actor placed");
        Ok(handle)
    }

    /// Move an actor without going through dispatch.
    pub fn teleport_actor(&mut self, actor: ActorHandle, pos: CellPos) -> Result<()> {
        let Some(record) = self.records.get_mut(&actor) else {
            return Err(CoreError::UnknownActor(actor));
        };
        if !self.map.set_actor(pos, actor) {
            return Err(CoreError::PlacementRejected {
                x: pos.x,
                y: pos.y,
                level: pos.level,
            });
        }
        record.visited.insert(pos);
        self.actors.record(ActorPlacementEntry {
            handle: actor,
            position: pos,
            role: record.role,
        });
        Ok(())
    }

    /// Assign an AIU module.
    ///
    /// On unmet prerequisites the actor is left with no module and the
    /// error says why. Assigning `0` clears the assignment.
    pub fn assign_aiu(&mut self, actor: ActorHandle, aiu: AiuId) -> Result<()> {
        let Some(record) = self.records.get_mut(&actor) else {
            return Err(CoreError::UnknownActor(actor));
        };
        if aiu == NO_AIU {
            record.aiu = NO_AIU;
            return Ok(());
        }
        let checked = match self.catalog.get(aiu) {
            Some(spec) => spec.check_prerequisites(record),
            None => Err(CoreError::UnknownAiu(aiu)),
        };
        match checked {
            Ok(()) => {
                record.aiu = aiu;
                Ok(())
            }
            Err(err) => {
                record.aiu = NO_AIU;
                warn!(actor, aiu, error = %err, "AIU assignment failed");
                Err(err)
            }
        }
    }

    /// Stage a director override for one actor on one tick.
    pub fn set_directive(&mut self, actor: ActorHandle, tick: u64, step: Step) -> Result<()> {
        let record = self
            .records
            .get_mut(&actor)
            .ok_or(CoreError::UnknownActor(actor))?;
        record.directive = Some(StagedStep { tick, step });
        Ok(())
    }

    /// Stage an override for every actor on one tick.
    pub fn set_broadcast(&mut self, tick: u64, step: Step) {
        self.broadcast = Some(StagedStep { tick, step });
    }

    /// Drop every staged override.
    pub fn clear_directives(&mut self) {
        self.broadcast = None;
        for record in self.records.values_mut() {
            record.directive = None;
        }
    }

    /// Replace an actor's pools.
    pub fn set_pools(&mut self, actor: ActorHandle, pools: ResourcePools) -> Result<()> {
        let record = self
            .records
            .get_mut(&actor)
            .ok_or(CoreError::UnknownActor(actor))?;
        record.pools = pools;
        Ok(())
    }

    /// Set current stamina, clamped to max.
    pub fn set_stamina(&mut self, actor: ActorHandle, current: u32) -> Result<()> {
        let record = self
            .records
            .get_mut(&actor)
            .ok_or(CoreError::UnknownActor(actor))?;
        record.pools.stamina.current = current.min(record.pools.stamina.max);
        Ok(())
    }

    /// Grant or revoke enhanced observation.
    pub fn set_enhanced_observation(&mut self, actor: ActorHandle, enabled: bool) -> Result<()> {
        let record = self
            .records
            .get_mut(&actor)
            .ok_or(CoreError::UnknownActor(actor))?;
        record.enhanced_observation = enabled;
        Ok(())
    }

    // ---- queries ----

    /// An actor's record.
    #[must_use]
    pub fn record(&self, actor: ActorHandle) -> Option<&ActorRecord> {
        self.records.get(&actor)
    }

    /// Where an actor stands.
    #[must_use]
    pub fn position_of(&self, actor: ActorHandle) -> Option<CellPos> {
        self.map.position_of(actor)
    }

    /// All live actor handles, ascending.
    #[must_use]
    pub fn actor_handles(&self) -> Vec<ActorHandle> {
        let mut handles: Vec<_> = self.records.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Number of live actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.records.len()
    }

    /// Recent dispatch results for an actor.
    #[must_use]
    pub fn history(&self, actor: ActorHandle) -> Option<&DispatchHistory> {
        self.history.for_actor(actor)
    }

    /// Packed snapshot of an actor's pools.
    #[must_use]
    pub fn resource_snapshot(&self, actor: ActorHandle) -> Option<ResourceSnapshot> {
        self.records
            .get(&actor)
            .map(|record| ResourceSnapshot::capture(&record.pools))
    }

    /// Hash of everything a tick can change, in a stable order.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for handle in self.actor_handles() {
            let Some(record) = self.records.get(&handle) else {
                continue;
            };
            handle.hash(&mut hasher);
            self.map.position_of(handle).hash(&mut hasher);
            record.pools.hash(&mut hasher);
            record.aiu.hash(&mut hasher);
            record.cultivation.hash(&mut hasher);
            record.patrol_index.hash(&mut hasher);
            record.last_permit_tick.hash(&mut hasher);
        }
        self.map.sorted_occupancy().hash(&mut hasher);
        hasher.finish()
    }

    #[cfg(feature = "debug-validation")]
    pub(crate) fn assert_occupancy_consistent(&self) {
        let occupancy = self.map.sorted_occupancy();
        for pair in occupancy.windows(2) {
            assert_ne!(pair[0].0, pair[1].0, "two actors share {}", pair[0].0);
        }
        for (pos, actor) in &occupancy {
            assert_eq!(self.map.actor_at(*pos), *actor, "occupancy index out of sync");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Pool;
    use crate::solver::GridSolver;

    fn room(w: i32, h: i32) -> Configurator {
        let mut cfg = Configurator::new(SimConfig::default());
        for y in 0..h {
            for x in 0..w {
                cfg.set_surface(CellPos::new(x, y, 0), 1);
            }
        }
        cfg
    }

    #[test]
    fn test_handles_start_at_one_and_never_repeat() {
        let mut cfg = room(3, 1);
        let a = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        let b = cfg.place_actor(CellPos::new(1, 0, 0), ActorSpawn::default()).unwrap();
        assert_eq!((a, b), (1, 2));

        cfg.initialize();
        cfg.set_surface(CellPos::new(0, 0, 0), 1);
        let c = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn test_placement_rejections() {
        let mut cfg = room(2, 1);
        cfg.set_feature(CellPos::new(1, 0, 0), 1, true);
        cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();

        for pos in [
            CellPos::new(0, 0, 0),
            CellPos::new(1, 0, 0),
            CellPos::new(5, 5, 0),
        ] {
            let err = cfg.place_actor(pos, ActorSpawn::default()).unwrap_err();
            assert!(matches!(err, CoreError::PlacementRejected { .. }));
        }
        assert_eq!(cfg.actor_count(), 1);
        assert_eq!(cfg.actor_ledger().len(), 1);
    }

    #[test]
    fn test_failed_assignment_reverts_to_none() {
        let mut cfg = room(1, 1);
        let a = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        cfg.assign_aiu(a, 1).unwrap();

        let err = cfg.assign_aiu(a, 3).unwrap_err();
        assert!(matches!(err, CoreError::PrerequisiteNotMet { aiu: 3, .. }));
        assert_eq!(cfg.record(a).unwrap().aiu, NO_AIU);

        cfg.assign_aiu(a, 1).unwrap();
        assert!(matches!(cfg.assign_aiu(a, 77), Err(CoreError::UnknownAiu(77))));
        assert_eq!(cfg.record(a).unwrap().aiu, NO_AIU);

        cfg.set_enhanced_observation(a, true).unwrap();
        cfg.assign_aiu(a, 3).unwrap();
        assert_eq!(cfg.record(a).unwrap().aiu, 3);
    }

    #[test]
    fn test_unknown_actor_errors() {
        let mut cfg = room(1, 1);
        assert!(matches!(cfg.assign_aiu(9, 1), Err(CoreError::UnknownActor(9))));
        assert!(cfg.set_directive(9, 0, Step::EAST).is_err());
        assert!(cfg.teleport_actor(9, CellPos::new(0, 0, 0)).is_err());
        assert!(cfg.resource_snapshot(9).is_none());
        assert!(cfg.history(9).is_none());
    }

    #[test]
    fn test_initialize_keeps_solver_and_history() {
        let mut cfg = room(2, 1);
        cfg.bind_solver(Box::new(GridSolver::default()));
        let a = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        let queue = cfg.build_dispatch_queue(0);
        cfg.resolve(queue);
        cfg.set_broadcast(1, Step::EAST);

        cfg.initialize();
        assert!(cfg.has_solver());
        assert!(cfg.map().is_empty());
        assert_eq!(cfg.actor_count(), 0);
        assert!(cfg.surface_ledger().is_empty());
        assert!(cfg.broadcast.is_none());
        assert_eq!(cfg.history(a).map(DispatchHistory::len), Some(1));

        assert!(cfg.release_solver().is_some());
        assert!(!cfg.has_solver());
    }

    #[test]
    fn test_teleport_moves_barrier() {
        let mut cfg = room(3, 1);
        let wall = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::barrier()).unwrap();
        cfg.teleport_actor(wall, CellPos::new(2, 0, 0)).unwrap();
        assert_eq!(cfg.position_of(wall), Some(CellPos::new(2, 0, 0)));
        assert!(cfg.map().is_enterable(CellPos::new(0, 0, 0)));
        assert_eq!(cfg.actor_ledger().len(), 2);
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut cfg = room(3, 1);
        let a = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        let before = cfg.state_hash();
        assert_eq!(before, cfg.state_hash());

        cfg.teleport_actor(a, CellPos::new(1, 0, 0)).unwrap();
        assert_ne!(before, cfg.state_hash());
    }

    #[test]
    fn test_set_stamina_clamps() {
        let mut cfg = room(1, 1);
        let a = cfg.place_actor(CellPos::new(0, 0, 0), ActorSpawn::default()).unwrap();
        cfg.set_stamina(a, 500).unwrap();
        assert_eq!(cfg.record(a).unwrap().pools.stamina, Pool::full(100));
    }
}
