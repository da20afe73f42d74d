//! Dispatch queue construction.
//!
//! Every tick, each mobile actor gets exactly one [`DispatchEntry`]. The
//! intent is resolved through a fixed tier order, stopping at the first
//! tier whose step passes the map's enterability check:
//!
//! 1. forced cultivation (tier AIU)
//! 2. director override for this tick (tier Logic)
//! 3. assigned AIU module, with a solver probe first for ids ≥ 9000 (tier AIU)
//! 4. local 3×3 evaluation (tier Logic)
//! 5. rotated cardinal fallback scan (tier Instinct)
//! 6. idle (tier Instinct)
//!
//! Entries are stamped with a priority token and sorted by `(token, actor)`.
//! The token, not the tier, decides who moves first.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::actor::ActorRecord;
use crate::aiu::{
    probe, rotation_seed, AiuCatalog, AiuContext, AiuId, AiuIntent, AiuKind, AiuMode, SolverLink,
    NO_AIU,
};
use crate::config::SimConfig;
use crate::configurator::Configurator;
use crate::geometry::{CellPos, Step};
use crate::ledger::{ActorHandle, ActorRole};
use crate::level_map::LevelMap;
use crate::local::evaluate_local;
use crate::solver::SolverVerdict;

/// Which tier produced an intent. Codes are part of the host contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DecisionTier {
    /// An AIU module (assigned or forced).
    Aiu = 1,
    /// Director override or local evaluation.
    Logic = 2,
    /// Fallback scan or idle.
    Instinct = 3,
}

impl DecisionTier {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Aiu => "AIU",
            Self::Logic => "Logic",
            Self::Instinct => "Instinct",
        }
    }
}

/// Resolution outcome of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Outcome {
    /// Not resolved yet.
    #[default]
    Pending = 0,
    /// Permit applied.
    Accepted = 1,
    /// Permit refused.
    Rejected = 2,
}

impl Outcome {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Why a permit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RejectReason {
    /// Not rejected.
    #[default]
    None = 0,
    /// Not enough stamina for the step.
    Stamina = 1,
    /// Destination not enterable when the entry was processed.
    Blocked = 2,
    /// A permit for this actor and tick was already applied.
    Duplicate = 3,
}

impl RejectReason {
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
            Self::Stamina => "stamina",
            Self::Blocked => "blocked",
            Self::Duplicate => "duplicate",
        }
    }
}

macro_rules! display_via_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_via_label!(DecisionTier, Outcome, RejectReason);

/// 32-bit xorshift-multiply finaliser.
#[must_use]
pub const fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

/// Per-tick seed derived from the configured seed and the tick number.
#[must_use]
pub const fn tick_seed(seed: u32, tick: u64) -> u32 {
    mix32(seed ^ (tick as u32) ^ ((tick >> 32) as u32))
}

/// Priority token of `actor` on the tick with `tick_seed`.
#[must_use]
pub const fn priority_token(tick_seed: u32, actor: ActorHandle) -> u32 {
    mix32(tick_seed ^ actor.wrapping_mul(0x9e37_79b9))
}

/// One actor's resolved intent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchEntry {
    /// Actor handle.
    pub actor: ActorHandle,
    /// Priority token.
    pub token: u32,
    /// Position when the intent was chosen.
    pub origin: CellPos,
    /// Stamina when the intent was chosen.
    pub stamina: u32,
    /// Chosen step.
    pub step: Step,
    /// Tier that produced the step.
    pub tier: DecisionTier,
    /// AIU module behind the intent, `0` if none.
    pub aiu: AiuId,
    /// Resolution outcome.
    pub outcome: Outcome,
    /// Rejection reason.
    pub reason: RejectReason,
    /// Verdict of the solver query behind the intent, if any.
    pub solver: Option<SolverVerdict>,
    /// AIU side-state mode.
    pub mode: AiuMode,
    /// AIU auxiliary value.
    pub aux: i32,
    /// Cultivation ticks after this tick's update.
    pub cultivation_ticks: u32,
    /// Vulnerability ticks after this tick's update.
    pub vulnerability_ticks: u32,
}

impl DispatchEntry {
    /// Solver verdict code, `0` when no query was issued.
    #[must_use]
    pub fn solver_code(&self) -> u8 {
        self.solver.map_or(0, SolverVerdict::code)
    }

    /// Where the step leads; the origin when the step would leave the
    /// coordinate range.
    #[must_use]
    pub const fn destination(&self) -> CellPos {
        match self.origin.checked_offset(self.step) {
            Some(dest) => dest,
            None => self.origin,
        }
    }
}

/// The sorted entries for one tick.
///
/// Handed to [`Configurator::resolve`], which consumes it; a queue can be
/// resolved at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchQueue {
    tick: u64,
    tick_seed: u32,
    entries: Vec<DispatchEntry>,
}

impl DispatchQueue {
    pub(crate) fn new(tick: u64, tick_seed: u32, mut entries: Vec<DispatchEntry>) -> Self {
        entries.sort_unstable_by_key(|e| (e.token, e.actor));
        Self {
            tick,
            tick_seed,
            entries,
        }
    }

    /// Tick this queue was built for.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Seed used for tokens and rotations.
    #[must_use]
    pub const fn tick_seed(&self) -> u32 {
        self.tick_seed
    }

    /// Entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    /// Entry at `index` in priority order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DispatchEntry> {
        self.entries.get(index)
    }

    /// Entry for `actor`.
    #[must_use]
    pub fn find(&self, actor: ActorHandle) -> Option<&DispatchEntry> {
        self.entries.iter().find(|e| e.actor == actor)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_parts(self) -> (u64, Vec<DispatchEntry>) {
        (self.tick, self.entries)
    }
}

/// Tier resolution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decision {
    intent: AiuIntent,
    tier: DecisionTier,
    aiu: AiuId,
}

impl Decision {
    const fn new(intent: AiuIntent, tier: DecisionTier, aiu: AiuId) -> Self {
        Self { intent, tier, aiu }
    }
}

/// Shared, read-only inputs for one actor's tier resolution.
struct TierInputs<'a> {
    map: &'a LevelMap,
    catalog: &'a AiuCatalog,
    config: &'a SimConfig,
    tick: u64,
    tick_seed: u32,
    broadcast: Option<Step>,
}

impl TierInputs<'_> {
    fn context<'r>(
        &'r self,
        record: &'r ActorRecord,
        origin: CellPos,
        aiu: AiuId,
    ) -> AiuContext<'r> {
        AiuContext {
            actor: record.handle,
            aiu,
            origin,
            tick_seed: self.tick_seed,
            map: self.map,
            pools: &record.pools,
            cultivation: record.cultivation,
            patrol_index: record.patrol_index,
            visited: &record.visited,
            config: self.config,
        }
    }

    fn decide(&self, record: &ActorRecord, origin: CellPos, solver: &mut SolverLink<'_>) -> Decision {
        let assigned = self.catalog.get(record.aiu);

        // 1. forced cultivation
        let already_cultivating = assigned.is_some_and(|spec| spec.kind == AiuKind::Cultivation);
        let threshold = self
            .config
            .forced_cultivation_threshold(record.pools.stamina.max);
        if !already_cultivating
            && !record.cultivation.is_vulnerable()
            && record.pools.stamina.current < threshold
        {
            let id = self.catalog.id_of(AiuKind::Cultivation).unwrap_or(NO_AIU);
            let ctx = self.context(record, origin, id);
            if let Some(intent) = AiuKind::Cultivation.plan_without_solver(&ctx) {
                trace!(actor = record.handle, stamina = record.pools.stamina.current, threshold, "forced cultivation");
                return Decision::new(intent, DecisionTier::Aiu, id);
            }
        }

        // 2. director override
        if let Some(step) = record.directive_for(self.tick).or(self.broadcast) {
            if self.map.can_take(origin, step) {
                return Decision::new(AiuIntent::step(step), DecisionTier::Logic, record.aiu);
            }
            trace!(actor = record.handle, %step, "director override not enterable");
        }

        // 3. assigned module
        if let Some(spec) = assigned {
            let ctx = self.context(record, origin, spec.id);
            let mut probe_verdict = None;
            if spec.uses_solver_probe() {
                let outcome = probe(&ctx, solver);
                if let Some(intent) = outcome.intent {
                    return Decision::new(intent, DecisionTier::Aiu, spec.id);
                }
                probe_verdict = outcome.last_verdict;
            }
            if let Some(mut intent) = spec.kind.evaluate(&ctx, solver) {
                if let Some(verdict) = probe_verdict {
                    intent = intent.with_verdict(verdict);
                }
                if self.map.can_take(origin, intent.step) {
                    return Decision::new(intent, DecisionTier::Aiu, spec.id);
                }
                trace!(actor = record.handle, aiu = spec.id, step = %intent.step, "module intent not enterable");
            }
        }

        // 4. local evaluation
        let local = evaluate_local(self.map, origin, &record.pools.stamina, self.config);
        if let Some(choice) = local.choice {
            return Decision::new(AiuIntent::step(choice.step()), DecisionTier::Logic, NO_AIU);
        }

        // 5. fallback scan
        let start = (rotation_seed(record.aiu, record.handle, self.tick_seed) % 4) as usize;
        let fallback = (0..Step::CARDINALS.len())
            .map(|k| Step::CARDINALS[(start + k) % Step::CARDINALS.len()])
            .find(|step| self.map.can_take(origin, *step));
        if let Some(step) = fallback {
            return Decision::new(AiuIntent::step(step), DecisionTier::Instinct, NO_AIU);
        }

        // 6. idle
        Decision::new(AiuIntent::hold(), DecisionTier::Instinct, NO_AIU)
    }
}

impl Configurator {
    /// Build the sorted dispatch queue for `tick`.
    ///
    /// Also applies this tick's AIU side effects: cultivation regeneration,
    /// the cultivation tracker update, and persisted patrol progress.
    pub fn build_dispatch_queue(&mut self, tick: u64) -> DispatchQueue {
        let seed = tick_seed(self.config.seed, tick);
        let broadcast = self
            .broadcast
            .filter(|staged| staged.tick == tick)
            .map(|staged| staged.step);
        let mut entries = Vec::with_capacity(self.records.len());

        for handle in self.actor_handles() {
            let Some(origin) = self.map.position_of(handle) else {
                continue;
            };
            let decision = {
                let Some(record) = self.records.get(&handle) else {
                    continue;
                };
                if record.role != ActorRole::Mobile {
                    continue;
                }
                let inputs = TierInputs {
                    map: &self.map,
                    catalog: &self.catalog,
                    config: &self.config,
                    tick,
                    tick_seed: seed,
                    broadcast,
                };
                let mut solver = SolverLink::new(self.solver.as_mut(), &self.map);
                inputs.decide(record, origin, &mut solver)
            };

            let Some(record) = self.records.get_mut(&handle) else {
                continue;
            };
            let stamina = record.pools.stamina.current;
            let cultivating = decision.intent.mode == AiuMode::Cultivate;
            if cultivating {
                record
                    .pools
                    .regenerate(self.config.regen_multiple, self.config.move_cost_percent);
            }
            record.cultivation.observe(cultivating);
            if decision.intent.mode == AiuMode::Patrol {
                record.patrol_index = u8::try_from(decision.intent.aux.rem_euclid(4)).unwrap_or(0);
            }

            let entry = DispatchEntry {
                actor: handle,
                token: priority_token(seed, handle),
                origin,
                stamina,
                step: decision.intent.step,
                tier: decision.tier,
                aiu: decision.aiu,
                outcome: Outcome::Pending,
                reason: RejectReason::None,
                solver: decision.intent.solver,
                mode: decision.intent.mode,
                aux: decision.intent.aux,
                cultivation_ticks: record.cultivation.cultivation_ticks(),
                vulnerability_ticks: record.cultivation.vulnerability_ticks(),
            };
            trace!(
                actor = handle,
                tick,
                tier = %entry.tier,
                step = %entry.step,
                mode = entry.mode.label(),
                "dispatch entry"
            );
            entries.push(entry);
        }

        DispatchQueue::new(tick, seed, entries)
    }
}
