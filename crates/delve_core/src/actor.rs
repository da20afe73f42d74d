//! Per-actor state: resource pools and the consolidated side record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aiu::AiuId;
use crate::cultivation::CultivationTracker;
use crate::geometry::{CellPos, Step};
use crate::ledger::{ActorHandle, ActorRole};
use crate::math::ceil_percent;

/// A bounded resource (stamina, health, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pool {
    /// Current amount.
    pub current: u32,
    /// Maximum amount.
    pub max: u32,
    /// Signed change applied by the most recent debit or regeneration.
    #[serde(default)]
    pub last_delta: i32,
}

impl Pool {
    /// A full pool.
    #[must_use]
    pub const fn full(max: u32) -> Self {
        Self {
            current: max,
            max,
            last_delta: 0,
        }
    }

    /// A pool with an explicit current value (clamped to `max`).
    #[must_use]
    pub fn with_current(current: u32, max: u32) -> Self {
        Self {
            current: current.min(max),
            max,
            last_delta: 0,
        }
    }

    /// Whether the pool is below its maximum.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current < self.max
    }

    /// Remove `amount`. Returns `false` (and changes nothing) if there is
    /// not enough.
    pub fn debit(&mut self, amount: u32) -> bool {
        if amount > self.current {
            return false;
        }
        self.current -= amount;
        self.last_delta = -(amount.min(i32::MAX as u32) as i32);
        true
    }

    /// Add up to `amount`, capped at `max`. Returns what was actually added.
    pub fn restore(&mut self, amount: u32) -> u32 {
        let added = amount.min(self.max - self.current);
        self.current += added;
        self.last_delta = added.min(i32::MAX as u32) as i32;
        added
    }
}

/// The four pools every actor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourcePools {
    /// Spent by movement.
    pub stamina: Pool,
    /// Hit points.
    pub health: Pool,
    /// Spell reserve.
    pub mana: Pool,
    /// Equipment wear.
    pub durability: Pool,
}

impl ResourcePools {
    /// All four pools full at the same maximum.
    #[must_use]
    pub const fn uniform(max: u32) -> Self {
        Self {
            stamina: Pool::full(max),
            health: Pool::full(max),
            mana: Pool::full(max),
            durability: Pool::full(max),
        }
    }

    /// Whether any pool is below its maximum.
    #[must_use]
    pub const fn any_depleted(&self) -> bool {
        self.stamina.is_depleted()
            || self.health.is_depleted()
            || self.mana.is_depleted()
            || self.durability.is_depleted()
    }

    /// Pools in a fixed order: stamina, health, mana, durability.
    #[must_use]
    pub const fn as_array(&self) -> [Pool; 4] {
        [self.stamina, self.health, self.mana, self.durability]
    }

    /// One cultivation tick: every depleted pool gains
    /// `multiple × max(1, ceil(max × percent / 100))`, capped at its max.
    ///
    /// Returns the stamina gained.
    pub fn regenerate(&mut self, multiple: u32, percent: u32) -> u32 {
        let mut stamina_gain = 0;
        for (index, pool) in [
            &mut self.stamina,
            &mut self.health,
            &mut self.mana,
            &mut self.durability,
        ]
        .into_iter()
        .enumerate()
        {
            if !pool.is_depleted() {
                pool.last_delta = 0;
                continue;
            }
            let unit = ceil_percent(pool.max, percent).max(1);
            let gained = pool.restore(unit.saturating_mul(multiple));
            if index == 0 {
                stamina_gain = gained;
            }
        }
        stamina_gain
    }
}

/// A director-issued step valid for exactly one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagedStep {
    /// Tick the override applies to.
    pub tick: u64,
    /// Requested step.
    pub step: Step,
}

/// Everything the configurator tracks per actor, kept together because it
/// is always read and written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRecord {
    /// Actor handle.
    pub handle: ActorHandle,
    /// Scheduling role.
    pub role: ActorRole,
    /// Resource pools.
    pub pools: ResourcePools,
    /// Whether the actor has enhanced observation (an AIU prerequisite).
    pub enhanced_observation: bool,
    /// Assigned AIU module, `0` for instinct only.
    pub aiu: AiuId,
    /// Cultivation / vulnerability counters.
    pub cultivation: CultivationTracker,
    /// Next waypoint index for corridor patrols.
    pub patrol_index: u8,
    /// Cells this actor has stood on.
    pub visited: BTreeSet<CellPos>,
    /// Tick of the last accepted movement permit.
    pub last_permit_tick: Option<u64>,
    /// Director override for a single tick.
    pub directive: Option<StagedStep>,
}

impl ActorRecord {
    /// Fresh record for a newly placed actor.
    #[must_use]
    pub fn new(handle: ActorHandle, spawn: &ActorSpawn, position: CellPos) -> Self {
        let mut visited = BTreeSet::new();
        visited.insert(position);
        Self {
            handle,
            role: spawn.role,
            pools: spawn.pools,
            enhanced_observation: spawn.enhanced_observation,
            aiu: 0,
            cultivation: CultivationTracker::new(),
            patrol_index: 0,
            visited,
            last_permit_tick: None,
            directive: None,
        }
    }

    /// The override staged for `tick`, if any.
    #[must_use]
    pub fn directive_for(&self, tick: u64) -> Option<Step> {
        self.directive
            .filter(|staged| staged.tick == tick)
            .map(|staged| staged.step)
    }
}

/// Parameters for placing a new actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSpawn {
    /// Scheduling role.
    #[serde(default)]
    pub role: ActorRole,
    /// Starting pools.
    pub pools: ResourcePools,
    /// Enhanced observation capability.
    #[serde(default)]
    pub enhanced_observation: bool,
}

impl Default for ActorSpawn {
    fn default() -> Self {
        Self {
            role: ActorRole::Mobile,
            pools: ResourcePools::uniform(100),
            enhanced_observation: false,
        }
    }
}

impl ActorSpawn {
    /// A mobile actor with all pools at `max`.
    #[must_use]
    pub fn mobile(max: u32) -> Self {
        Self {
            pools: ResourcePools::uniform(max),
            ..Self::default()
        }
    }

    /// A barrier actor.
    #[must_use]
    pub fn barrier() -> Self {
        Self {
            role: ActorRole::Barrier,
            ..Self::default()
        }
    }
}
