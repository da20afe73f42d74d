//! Tick driver: a configurator plus the director that feeds it overrides
//! and the moderator that collects what happened.
//!
//! A tick walks a fixed stage machine:
//!
//! ```text
//! Idle --direct--> Directed --dispatch--> Dispatched --resolve--> Resolved --finish--> Idle
//! ```
//!
//! Calling a stage out of order returns `false` and changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::configurator::Configurator;
use crate::dispatch::DispatchQueue;
use crate::geometry::Step;
use crate::ledger::ActorHandle;
use crate::resolve::ResolvedTick;
use crate::telemetry;

/// Where a coordinator is within the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TickStage {
    /// Between ticks.
    #[default]
    Idle,
    /// Overrides for the tick have been handed to the configurator.
    Directed,
    /// The dispatch queue is built.
    Dispatched,
    /// The queue has been resolved.
    Resolved,
}

/// Stages movement overrides ahead of time.
#[derive(Debug, Clone, Default)]
pub struct Director {
    overrides: BTreeMap<(u64, ActorHandle), Step>,
    broadcasts: BTreeMap<u64, Step>,
}

impl Director {
    /// An empty director.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Order `actor` to take `step` on `tick`.
    pub fn stage(&mut self, tick: u64, actor: ActorHandle, step: Step) {
        self.overrides.insert((tick, actor), step);
    }

    /// Order every actor to take `step` on `tick`.
    pub fn broadcast(&mut self, tick: u64, step: Step) {
        self.broadcasts.insert(tick, step);
    }

    /// Overrides not yet handed over.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.overrides.len() + self.broadcasts.len()
    }

    /// Drop everything staged.
    pub fn clear(&mut self) {
        self.overrides.clear();
        self.broadcasts.clear();
    }

    /// Hand this tick's overrides to `configurator`; drop anything older.
    /// Returns how many were applied.
    pub fn apply(&mut self, tick: u64, configurator: &mut Configurator) -> usize {
        let later = self.overrides.split_off(&(tick.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.overrides, later);
        let later = self.broadcasts.split_off(&tick.saturating_add(1));
        let due_broadcasts = std::mem::replace(&mut self.broadcasts, later);

        let mut applied = 0;
        for ((at, actor), step) in due {
            if at != tick {
                continue;
            }
            match configurator.set_directive(actor, tick, step) {
                Ok(()) => applied += 1,
                Err(err) => debug!(actor, tick, error = %err, "override dropped"),
            }
        }
        if let Some(step) = due_broadcasts.get(&tick) {
            configurator.set_broadcast(tick, *step);
            applied += 1;
        }
        applied
    }
}

/// Collects per-tick summary lines.
#[derive(Debug, Clone, Default)]
pub struct Moderator {
    summaries: Vec<String>,
    entry_lines: Vec<String>,
    record_entries: bool,
}

impl Moderator {
    /// A moderator keeping only summaries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A moderator that also keeps one line per dispatch entry.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            record_entries: true,
            ..Self::default()
        }
    }

    /// Record a resolved tick.
    pub fn record(&mut self, resolved: &ResolvedTick) {
        self.summaries.push(telemetry::summarize(resolved));
        if self.record_entries {
            self.entry_lines.extend(
                resolved
                    .entries()
                    .iter()
                    .map(|entry| telemetry::format_entry(resolved.tick(), entry)),
            );
        }
    }

    /// Summary lines, one per tick.
    #[must_use]
    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    /// Entry lines (empty unless verbose).
    #[must_use]
    pub fn entry_lines(&self) -> &[String] {
        &self.entry_lines
    }

    /// Forget everything recorded.
    pub fn clear(&mut self) {
        self.summaries.clear();
        self.entry_lines.clear();
    }
}

/// Drives one configurator tick by tick.
///
/// # Example
///
/// ```
/// use delve_core::prelude::*;
///
/// let mut coordinator = Coordinator::new(SimConfig::default());
/// for x in 0..3 {
///     coordinator.configurator_mut().set_surface(CellPos::new(x, 0, 0), 1);
/// }
/// let actor = coordinator
///     .configurator_mut()
///     .place_actor(CellPos::new(0, 0, 0), ActorSpawn::default())
///     .unwrap();
/// coordinator.director_mut().stage(0, actor, Step::EAST);
///
/// assert!(coordinator.step());
/// assert_eq!(coordinator.tick(), 1);
/// assert_eq!(
///     coordinator.configurator().position_of(actor),
///     Some(CellPos::new(1, 0, 0))
/// );
/// ```
#[derive(Debug)]
pub struct Coordinator {
    configurator: Configurator,
    director: Director,
    moderator: Moderator,
    stage: TickStage,
    tick: u64,
    queue: Option<DispatchQueue>,
    last: Option<ResolvedTick>,
}

impl Coordinator {
    /// A coordinator around a fresh configurator.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_configurator(Configurator::new(config))
    }

    /// A coordinator around an existing configurator.
    #[must_use]
    pub fn with_configurator(configurator: Configurator) -> Self {
        Self {
            configurator,
            director: Director::new(),
            moderator: Moderator::new(),
            stage: TickStage::Idle,
            tick: 0,
            queue: None,
            last: None,
        }
    }

    /// Replace the moderator.
    #[must_use]
    pub fn with_moderator(mut self, moderator: Moderator) -> Self {
        self.moderator = moderator;
        self
    }

    /// The next tick to run.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> TickStage {
        self.stage
    }

    /// The simulation instance.
    #[must_use]
    pub const fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    /// The simulation instance, mutably.
    pub fn configurator_mut(&mut self) -> &mut Configurator {
        &mut self.configurator
    }

    /// The director.
    pub fn director_mut(&mut self) -> &mut Director {
        &mut self.director
    }

    /// The moderator.
    #[must_use]
    pub const fn moderator(&self) -> &Moderator {
        &self.moderator
    }

    /// The queue built this tick, between dispatch and resolve.
    #[must_use]
    pub fn pending_queue(&self) -> Option<&DispatchQueue> {
        self.queue.as_ref()
    }

    /// The most recently resolved tick.
    #[must_use]
    pub fn last_resolved(&self) -> Option<&ResolvedTick> {
        self.last.as_ref()
    }

    /// Idle → Directed.
    pub fn direct(&mut self) -> bool {
        if self.stage != TickStage::Idle {
            return false;
        }
        let applied = self.director.apply(self.tick, &mut self.configurator);
        debug!(tick = self.tick, applied, "overrides applied");
        self.stage = TickStage::Directed;
        true
    }

    /// Directed → Dispatched.
    pub fn dispatch(&mut self) -> bool {
        if self.stage != TickStage::Directed {
            return false;
        }
        self.queue = Some(self.configurator.build_dispatch_queue(self.tick));
        self.stage = TickStage::Dispatched;
        true
    }

    /// Dispatched → Resolved.
    pub fn resolve(&mut self) -> bool {
        if self.stage != TickStage::Dispatched {
            return false;
        }
        let Some(queue) = self.queue.take() else {
            return false;
        };
        self.last = Some(self.configurator.resolve(queue));
        self.stage = TickStage::Resolved;
        true
    }

    /// Resolved → Idle; hands the tick to the moderator and advances.
    pub fn finish(&mut self) -> bool {
        if self.stage != TickStage::Resolved {
            return false;
        }
        if let Some(resolved) = &self.last {
            self.moderator.record(resolved);
            info!(
                tick = self.tick,
                accepted = resolved.accepted(),
                rejected = resolved.rejected(),
                cultivating = resolved.cultivating(),
                "tick complete"
            );
        }
        self.tick += 1;
        self.stage = TickStage::Idle;
        true
    }

    /// Run one whole tick. Returns `false` if a tick is already in progress.
    pub fn step(&mut self) -> bool {
        if self.stage != TickStage::Idle {
            return false;
        }
        self.direct() && self.dispatch() && self.resolve() && self.finish()
    }

    /// Run up to `ticks` ticks; returns how many ran.
    pub fn run(&mut self, ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < ticks && self.step() {
            ran += 1;
        }
        ran
    }

    /// Wipe the configurator and any half-finished tick. The tick counter,
    /// history and solver are kept.
    pub fn initialize(&mut self) {
        self.configurator.initialize();
        self.director.clear();
        self.queue = None;
        self.last = None;
        self.stage = TickStage::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorSpawn;
    use crate::geometry::CellPos;

    fn corridor() -> (Coordinator, ActorHandle) {
        let mut coordinator = Coordinator::new(SimConfig::default());
        for x in 0..4 {
            coordinator
                .configurator_mut()
                .set_surface(CellPos::new(x, 0, 0), 1);
        }
        let actor = coordinator
            .configurator_mut()
            .place_actor(CellPos::new(0, 0, 0), ActorSpawn::default())
            .unwrap();
        (coordinator, actor)
    }

    #[test]
    fn test_stage_order_enforced() {
        let (mut coordinator, _) = corridor();
        assert!(!coordinator.dispatch());
        assert!(!coordinator.resolve());
        assert!(!coordinator.finish());
        assert_eq!(coordinator.stage(), TickStage::Idle);

        assert!(coordinator.direct());
        assert!(!coordinator.direct());
        assert!(!coordinator.step());
        assert!(coordinator.dispatch());
        assert!(coordinator.pending_queue().is_some());
        assert!(!coordinator.finish());
        assert!(coordinator.resolve());
        assert!(coordinator.pending_queue().is_none());
        assert!(coordinator.finish());
        assert_eq!(coordinator.stage(), TickStage::Idle);
        assert_eq!(coordinator.tick(), 1);
    }

    #[test]
    fn test_director_overrides_only_their_tick() {
        let (mut coordinator, actor) = corridor();
        coordinator.director_mut().stage(1, actor, Step::EAST);
        coordinator.director_mut().stage(0, 99, Step::EAST);
        assert_eq!(coordinator.director_mut().pending(), 2);

        assert!(coordinator.step());
        assert_eq!(coordinator.director_mut().pending(), 1);
        assert!(coordinator.step());
        assert_eq!(coordinator.director_mut().pending(), 0);

        let resolved = coordinator.last_resolved().unwrap();
        let entry = resolved.find(actor).unwrap();
        assert_eq!(entry.step, Step::EAST);
    }

    #[test]
    fn test_moderator_collects_summaries() {
        let (coordinator, _) = corridor();
        let mut coordinator = coordinator.with_moderator(Moderator::verbose());
        assert_eq!(coordinator.run(3), 3);
        assert_eq!(coordinator.moderator().summaries().len(), 3);
        assert_eq!(coordinator.moderator().entry_lines().len(), 3);
        assert!(coordinator.moderator().summaries()[0].starts_with("tick 0 actors=1"));
    }

    #[test]
    fn test_initialize_mid_tick_returns_to_idle() {
        let (mut coordinator, _) = corridor();
        assert!(coordinator.direct());
        assert!(coordinator.dispatch());
        coordinator.initialize();
        assert_eq!(coordinator.stage(), TickStage::Idle);
        assert!(coordinator.pending_queue().is_none());
        assert_eq!(coordinator.configurator().actor_count(), 0);
        assert!(coordinator.step());
    }
}
