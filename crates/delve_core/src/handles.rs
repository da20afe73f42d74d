//! Opaque-integer handle API for hosts that cannot hold Rust references.
//!
//! Instances live in a generation-checked arena. A handle is a plain `u64`;
//! once the instance behind it is destroyed, the handle goes stale and
//! every call made with it degrades to a safe default (`0`, `false`,
//! empty) instead of touching whatever reuses the slot.

use std::sync::Arc;

use slotmap::{new_key_type, Key, KeyData, SlotMap};
use tracing::debug;

use crate::actor::ActorSpawn;
use crate::aiu::{AiuCatalog, AiuId};
use crate::config::SimConfig;
use crate::configurator::Configurator;
use crate::coordinator::Coordinator;
use crate::dispatch::DispatchEntry;
use crate::geometry::{CellPos, Step};
use crate::ledger::{ActorHandle, ActorRole};
use crate::solver::{GridSolver, PathSolver};

new_key_type! {
    /// Generation-checked slot key.
    pub struct Handle;
}

impl Handle {
    /// Raw integer form handed to hosts. Never `0` for a live handle.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a handle from its raw form. Garbage yields a stale handle.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

/// Arena of instances addressed by raw handles.
#[derive(Debug)]
pub struct HandleArena<T> {
    slots: SlotMap<Handle, T>,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }
}

impl<T> HandleArena<T> {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(raw: u64) -> Option<Handle> {
        (raw != 0).then(|| Handle::from_raw(raw))
    }

    /// Store a value and return its raw handle.
    pub fn insert(&mut self, value: T) -> u64 {
        self.slots.insert(value).to_raw()
    }

    /// Look up a live value.
    #[must_use]
    pub fn get(&self, raw: u64) -> Option<&T> {
        Self::key(raw).and_then(|key| self.slots.get(key))
    }

    /// Look up a live value mutably.
    pub fn get_mut(&mut self, raw: u64) -> Option<&mut T> {
        Self::key(raw).and_then(|key| self.slots.get_mut(key))
    }

    /// Remove and return a value.
    pub fn remove(&mut self, raw: u64) -> Option<T> {
        Self::key(raw).and_then(|key| self.slots.remove(key))
    }

    /// Whether `raw` names a live value.
    #[must_use]
    pub fn contains(&self, raw: u64) -> bool {
        Self::key(raw).is_some_and(|key| self.slots.contains_key(key))
    }

    /// Live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn host_step(dx: i32, dy: i32) -> Option<Step> {
    let step = Step::clamped(dx, dy, 0);
    (i32::from(step.dx) == dx && i32::from(step.dy) == dy).then_some(step)
}

/// Owns any number of independent simulations.
#[derive(Debug)]
pub struct SimulationHost {
    instances: HandleArena<Coordinator>,
    catalog: Arc<AiuCatalog>,
}

impl Default for SimulationHost {
    fn default() -> Self {
        Self::with_catalog(Arc::new(AiuCatalog::standard()))
    }
}

impl SimulationHost {
    /// A host with the standard catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose instances share `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Arc<AiuCatalog>) -> Self {
        Self {
            instances: HandleArena::new(),
            catalog,
        }
    }

    fn read<R>(&self, handle: u64, default: R, f: impl FnOnce(&Coordinator) -> R) -> R {
        self.instances.get(handle).map_or(default, f)
    }

    fn write<R>(&mut self, handle: u64, default: R, f: impl FnOnce(&mut Coordinator) -> R) -> R {
        self.instances.get_mut(handle).map_or(default, f)
    }

    fn entry<R>(&self, handle: u64, index: usize, default: R, f: impl FnOnce(&DispatchEntry) -> R) -> R {
        self.read(handle, None, |c| {
            c.last_resolved()
                .and_then(|resolved| resolved.entries().get(index))
                .map(f)
        })
        .unwrap_or(default)
    }

    fn actor<R>(
        &self,
        handle: u64,
        actor: ActorHandle,
        default: R,
        f: impl FnOnce(&Configurator, ActorHandle) -> Option<R>,
    ) -> R {
        self.read(handle, None, |c| f(c.configurator(), actor))
            .unwrap_or(default)
    }

    // ---- lifecycle ----

    /// Create an instance; returns its handle.
    pub fn create(&mut self, config: SimConfig) -> u64 {
        let configurator = Configurator::with_catalog(config, Arc::clone(&self.catalog));
        let handle = self.instances.insert(Coordinator::with_configurator(configurator));
        debug!(handle, "instance created");
        handle
    }

    /// Destroy an instance, releasing its solver.
    pub fn destroy(&mut self, handle: u64) -> bool {
        let Some(mut coordinator) = self.instances.remove(handle) else {
            return false;
        };
        coordinator.configurator_mut().release_solver();
        debug!(handle, "instance destroyed");
        true
    }

    /// Whether `handle` is live.
    #[must_use]
    pub fn is_live(&self, handle: u64) -> bool {
        self.instances.contains(handle)
    }

    /// Live instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Wipe an instance's map, ledgers and records.
    pub fn initialize(&mut self, handle: u64) -> bool {
        self.write(handle, false, |c| {
            c.initialize();
            true
        })
    }

    /// Bind a solver.
    pub fn bind_solver(&mut self, handle: u64, solver: Box<dyn PathSolver>) -> bool {
        self.write(handle, false, |c| {
            c.configurator_mut().bind_solver(solver);
            true
        })
    }

    /// Bind the built-in grid solver sized from the instance's config.
    pub fn bind_grid_solver(&mut self, handle: u64) -> bool {
        self.write(handle, false, |c| {
            let budget = c.configurator().config().solver_budget;
            c.configurator_mut()
                .bind_solver(Box::new(GridSolver::new(budget)));
            true
        })
    }

    /// Direct access for hosts that can hold references.
    #[must_use]
    pub fn coordinator(&self, handle: u64) -> Option<&Coordinator> {
        self.instances.get(handle)
    }

    /// Mutable direct access.
    pub fn coordinator_mut(&mut self, handle: u64) -> Option<&mut Coordinator> {
        self.instances.get_mut(handle)
    }

    // ---- setters ----

    /// Set or clear a floor.
    pub fn set_surface(&mut self, handle: u64, x: i32, y: i32, level: i32, substrate: u16) -> bool {
        self.write(handle, false, |c| {
            c.configurator_mut()
                .set_surface(CellPos::new(x, y, level), substrate)
        })
    }

    /// Place a feature.
    pub fn set_feature(
        &mut self,
        handle: u64,
        x: i32,
        y: i32,
        level: i32,
        feature: u32,
        blocking: bool,
    ) -> bool {
        self.write(handle, false, |c| {
            c.configurator_mut()
                .set_feature(CellPos::new(x, y, level), feature, blocking)
        })
    }

    /// Place an actor; returns its handle, or `0` if refused.
    pub fn place_actor(&mut self, handle: u64, x: i32, y: i32, level: i32, role: ActorRole) -> u32 {
        self.write(handle, 0, |c| {
            let spawn = ActorSpawn {
                role,
                ..ActorSpawn::default()
            };
            c.configurator_mut()
                .place_actor(CellPos::new(x, y, level), spawn)
                .unwrap_or(0)
        })
    }

    /// Assign an AIU module. `false` leaves the actor with no module.
    pub fn assign_aiu(&mut self, handle: u64, actor: ActorHandle, aiu: AiuId) -> bool {
        self.write(handle, false, |c| {
            c.configurator_mut().assign_aiu(actor, aiu).is_ok()
        })
    }

    /// Stage a per-actor override for `tick`.
    pub fn stage_override(&mut self, handle: u64, tick: u64, actor: ActorHandle, dx: i32, dy: i32) -> bool {
        let Some(step) = host_step(dx, dy) else {
            return false;
        };
        self.write(handle, false, |c| {
            c.director_mut().stage(tick, actor, step);
            true
        })
    }

    /// Stage a broadcast override for `tick`.
    pub fn broadcast_override(&mut self, handle: u64, tick: u64, dx: i32, dy: i32) -> bool {
        let Some(step) = host_step(dx, dy) else {
            return false;
        };
        self.write(handle, false, |c| {
            c.director_mut().broadcast(tick, step);
            true
        })
    }

    /// Run one tick.
    pub fn step(&mut self, handle: u64) -> bool {
        self.write(handle, false, Coordinator::step)
    }

    // ---- instance getters ----

    /// Next tick to run.
    #[must_use]
    pub fn tick(&self, handle: u64) -> u64 {
        self.read(handle, 0, Coordinator::tick)
    }

    /// State hash.
    #[must_use]
    pub fn state_hash(&self, handle: u64) -> u64 {
        self.read(handle, 0, |c| c.configurator().state_hash())
    }

    /// Number of live actors.
    #[must_use]
    pub fn actor_count(&self, handle: u64) -> usize {
        self.read(handle, 0, |c| c.configurator().actor_count())
    }

    // ---- actor getters ----

    /// Actor position, `(0, 0, 0)` if unknown.
    #[must_use]
    pub fn actor_position(&self, handle: u64, actor: ActorHandle) -> (i32, i32, i32) {
        self.actor(handle, actor, (0, 0, 0), |cfg, a| {
            cfg.position_of(a).map(|p| (p.x, p.y, p.level))
        })
    }

    /// Current stamina.
    #[must_use]
    pub fn actor_stamina(&self, handle: u64, actor: ActorHandle) -> u32 {
        self.actor(handle, actor, 0, |cfg, a| {
            cfg.record(a).map(|r| r.pools.stamina.current)
        })
    }

    /// Assigned AIU id.
    #[must_use]
    pub fn actor_aiu(&self, handle: u64, actor: ActorHandle) -> AiuId {
        self.actor(handle, actor, 0, |cfg, a| cfg.record(a).map(|r| r.aiu))
    }

    /// Cultivation tick counter.
    #[must_use]
    pub fn cultivation_ticks(&self, handle: u64, actor: ActorHandle) -> u32 {
        self.actor(handle, actor, 0, |cfg, a| {
            cfg.record(a).map(|r| r.cultivation.cultivation_ticks())
        })
    }

    /// Vulnerability tick counter.
    #[must_use]
    pub fn vulnerability_ticks(&self, handle: u64, actor: ActorHandle) -> u32 {
        self.actor(handle, actor, 0, |cfg, a| {
            cfg.record(a).map(|r| r.cultivation.vulnerability_ticks())
        })
    }

    /// Packed pools, zeros if unknown.
    #[must_use]
    pub fn resource_snapshot(&self, handle: u64, actor: ActorHandle) -> [u32; 4] {
        self.actor(handle, actor, [0; 4], |cfg, a| {
            cfg.resource_snapshot(a).map(|s| s.words())
        })
    }

    /// Length of an actor's dispatch history.
    #[must_use]
    pub fn history_len(&self, handle: u64, actor: ActorHandle) -> usize {
        self.actor(handle, actor, 0, |cfg, a| cfg.history(a).map(|h| h.len()))
    }

    /// Outcome code of history entry `index` (oldest first).
    #[must_use]
    pub fn history_outcome(&self, handle: u64, actor: ActorHandle, index: usize) -> u8 {
        self.actor(handle, actor, 0, |cfg, a| {
            cfg.history(a)
                .and_then(|h| h.get(index))
                .map(|e| e.outcome.code())
        })
    }

    // ---- last-tick entry getters ----

    /// Entries in the last resolved tick.
    #[must_use]
    pub fn entry_count(&self, handle: u64) -> usize {
        self.read(handle, 0, |c| c.last_resolved().map_or(0, |r| r.entries().len()))
    }

    /// Actor of entry `index`.
    #[must_use]
    pub fn entry_actor(&self, handle: u64, index: usize) -> ActorHandle {
        self.entry(handle, index, 0, |e| e.actor)
    }

    /// Step of entry `index` as `(dx, dy)`.
    #[must_use]
    pub fn entry_step(&self, handle: u64, index: usize) -> (i32, i32) {
        self.entry(handle, index, (0, 0), |e| (i32::from(e.step.dx), i32::from(e.step.dy)))
    }

    /// Tier code of entry `index`, `0` if none.
    #[must_use]
    pub fn entry_tier(&self, handle: u64, index: usize) -> u8 {
        self.entry(handle, index, 0, |e| e.tier.code())
    }

    /// Outcome code of entry `index`.
    #[must_use]
    pub fn entry_outcome(&self, handle: u64, index: usize) -> u8 {
        self.entry(handle, index, 0, |e| e.outcome.code())
    }

    /// Rejection reason code of entry `index`.
    #[must_use]
    pub fn entry_reason(&self, handle: u64, index: usize) -> u8 {
        self.entry(handle, index, 0, |e| e.reason.code())
    }

    /// Solver verdict code of entry `index`.
    #[must_use]
    pub fn entry_solver(&self, handle: u64, index: usize) -> u8 {
        self.entry(handle, index, 0, DispatchEntry::solver_code)
    }

    /// AIU mode code of entry `index`.
    #[must_use]
    pub fn entry_mode(&self, handle: u64, index: usize) -> u8 {
        self.entry(handle, index, 0, |e| e.mode.code())
    }

    /// AIU auxiliary value of entry `index`.
    #[must_use]
    pub fn entry_aux(&self, handle: u64, index: usize) -> i32 {
        self.entry(handle, index, 0, |e| e.aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with_corridor() -> (SimulationHost, u64) {
        let mut host = SimulationHost::new();
        let handle = host.create(SimConfig::default());
        for x in 0..3 {
            assert!(host.set_surface(handle, x, 0, 0, 1));
        }
        (host, handle)
    }

    #[test]
    fn test_raw_handles_are_nonzero() {
        let mut arena = HandleArena::new();
        let a = arena.insert("a");
        assert_ne!(a, 0);
        assert_eq!(arena.get(a), Some(&"a"));
        assert!(arena.get(0).is_none());
    }

    #[test]
    fn test_stale_handle_does_not_alias_new_instance() {
        let mut arena = HandleArena::new();
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));
        let new = arena.insert(2);
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn test_unknown_handle_defaults() {
        let mut host = SimulationHost::new();
        assert!(!host.step(12345));
        assert!(!host.initialize(12345));
        assert_eq!(host.place_actor(12345, 0, 0, 0, ActorRole::Mobile), 0);
        assert_eq!(host.actor_stamina(12345, 1), 0);
        assert_eq!(host.entry_outcome(12345, 0), 0);
        assert_eq!(host.resource_snapshot(12345, 1), [0; 4]);
        assert!(!host.destroy(12345));
    }

    #[test]
    fn test_host_runs_a_tick() {
        let (mut host, handle) = host_with_corridor();
        let actor = host.place_actor(handle, 0, 0, 0, ActorRole::Mobile);
        assert_eq!(actor, 1);
        assert!(host.stage_override(handle, 0, actor, 1, 0));
        assert!(!host.stage_override(handle, 0, actor, 2, 0));

        assert!(host.step(handle));
        assert_eq!(host.tick(handle), 1);
        assert_eq!(host.actor_position(handle, actor), (1, 0, 0));
        assert_eq!(host.actor_stamina(handle, actor), 99);
        assert_eq!(host.entry_count(handle), 1);
        assert_eq!(host.entry_actor(handle, 0), actor);
        assert_eq!(host.entry_tier(handle, 0), 2);
        assert_eq!(host.entry_outcome(handle, 0), 1);
        assert_eq!(host.entry_step(handle, 0), (1, 0));
        assert_eq!(host.entry_solver(handle, 0), 0);
        assert_eq!(host.history_len(handle, actor), 1);
        assert_eq!(host.history_outcome(handle, actor, 0), 1);
        assert_eq!(host.entry_outcome(handle, 5), 0);
    }

    #[test]
    fn test_instances_are_independent() {
        let (mut host, first) = host_with_corridor();
        let second = host.create(SimConfig::default());
        host.place_actor(first, 0, 0, 0, ActorRole::Mobile);
        assert_eq!(host.actor_count(first), 1);
        assert_eq!(host.actor_count(second), 0);
        assert_eq!(host.instance_count(), 2);
    }

    #[test]
    fn test_destroy_makes_handle_stale() {
        let (mut host, handle) = host_with_corridor();
        assert!(host.bind_grid_solver(handle));
        assert!(host.destroy(handle));
        assert!(!host.is_live(handle));
        assert!(!host.step(handle));
        assert_eq!(host.state_hash(handle), 0);
    }

    #[test]
    fn test_failed_assignment_reports_false() {
        let (mut host, handle) = host_with_corridor();
        let actor = host.place_actor(handle, 1, 0, 0, ActorRole::Mobile);
        assert!(host.assign_aiu(handle, actor, 7));
        assert!(!host.assign_aiu(handle, actor, 6));
        assert_eq!(host.actor_aiu(handle, actor), 0);
    }

    #[test]
    fn test_actor_at_coordinate_edge_steps_quietly() {
        let mut host = SimulationHost::new();
        let handle = host.create(SimConfig::default());
        assert!(host.set_surface(handle, i32::MAX, 0, 0, 1));
        let actor = host.place_actor(handle, i32::MAX, 0, 0, ActorRole::Mobile);
        assert_eq!(actor, 1);

        assert!(host.step(handle));
        assert_eq!(host.actor_position(handle, actor), (i32::MAX, 0, 0));
        assert_eq!(host.entry_step(handle, 0), (0, 0));
        assert_eq!(host.entry_tier(handle, 0), 3);

        assert!(host.set_surface(handle, i32::MAX - 1, 0, 0, 1));
        assert!(host.bind_grid_solver(handle));
        for aiu in [1, 2, 4, 5, 7, 8, 9002] {
            assert!(host.assign_aiu(handle, actor, aiu));
            assert!(host.stage_override(handle, host.tick(handle), actor, 1, 1));
            assert!(host.step(handle));
            let (x, y, level) = host.actor_position(handle, actor);
            assert!(x >= i32::MAX - 1);
            assert_eq!((y, level), (0, 0));
        }
        assert_eq!(host.tick(handle), 8);
    }
}
