//! Movement permits: the only path by which an actor's position or stamina
//! changes during a tick.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configurator::Configurator;
use crate::dispatch::{DecisionTier, Outcome, RejectReason};
use crate::geometry::Step;
use crate::ledger::ActorHandle;
use crate::math::scaled_percent_cost;

/// Stamina cost of `step` for a pool of size `stamina_max`.
///
/// Holding is free. Everything else costs
/// `max(1, ceil(max × percent / 100 × m))` with `m` 1, √2 or √3.
#[must_use]
pub fn step_cost(stamina_max: u32, move_cost_percent: u32, step: Step) -> u32 {
    step.scale()
        .map_or(0, |scale| scaled_percent_cost(stamina_max, move_cost_percent, scale))
}

/// A request to apply one step for one actor on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementPermit {
    /// Actor to move.
    pub actor: ActorHandle,
    /// Tick the permit belongs to.
    pub tick: u64,
    /// Requested step.
    pub step: Step,
    /// Tier that produced the step.
    pub tier: DecisionTier,
}

/// What happened to a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermitVerdict {
    /// Applied; `cost` stamina was debited.
    Accepted {
        /// Stamina spent.
        cost: u32,
    },
    /// Refused; nothing changed.
    Rejected(RejectReason),
}

impl PermitVerdict {
    /// Outcome code for the dispatch entry.
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::Accepted { .. } => Outcome::Accepted,
            Self::Rejected(_) => Outcome::Rejected,
        }
    }

    /// Rejection reason, `None` when accepted.
    #[must_use]
    pub const fn reason(self) -> RejectReason {
        match self {
            Self::Accepted { .. } => RejectReason::None,
            Self::Rejected(reason) => reason,
        }
    }

    /// Whether the permit was applied.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

impl Configurator {
    /// Apply one permit against the live map.
    ///
    /// Checks run in order: duplicate tick, stamina, then enterability of
    /// the destination as the map stands right now. A rejected permit
    /// changes nothing.
    pub fn apply_permit(&mut self, permit: &MovementPermit) -> PermitVerdict {
        let verdict = self.check_permit(permit);
        if let PermitVerdict::Accepted { cost } = verdict {
            self.commit_permit(permit, cost);
        }
        debug!(
            actor = permit.actor,
            tick = permit.tick,
            step = %permit.step,
            tier = ?permit.tier,
            outcome = ?verdict.outcome(),
            reason = ?verdict.reason(),
            "permit"
        );
        verdict
    }

    fn check_permit(&self, permit: &MovementPermit) -> PermitVerdict {
        let (Some(record), Some(origin)) = (
            self.records.get(&permit.actor),
            self.map.position_of(permit.actor),
        ) else {
            return PermitVerdict::Rejected(RejectReason::Blocked);
        };

        if record.last_permit_tick == Some(permit.tick) {
            return PermitVerdict::Rejected(RejectReason::Duplicate);
        }

        let stamina = record.pools.stamina;
        let cost = step_cost(stamina.max, self.config.move_cost_percent, permit.step);
        if cost > stamina.current {
            return PermitVerdict::Rejected(RejectReason::Stamina);
        }

        if !self.map.can_take(origin, permit.step) {
            return PermitVerdict::Rejected(RejectReason::Blocked);
        }

        PermitVerdict::Accepted { cost }
    }

    fn commit_permit(&mut self, permit: &MovementPermit, cost: u32) {
        let Some(origin) = self.map.position_of(permit.actor) else {
            return;
        };
        let Some(dest) = origin.checked_offset(permit.step) else {
            return;
        };
        if dest != origin && !self.map.set_actor(dest, permit.actor) {
            return;
        }
        if let Some(record) = self.records.get_mut(&permit.actor) {
            if cost > 0 {
                record.pools.stamina.debit(cost);
            }
            record.visited.insert(dest);
            record.last_permit_tick = Some(permit.tick);
        }
    }
}
