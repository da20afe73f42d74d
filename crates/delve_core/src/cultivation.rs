//! Cultivation / vulnerability state machine.
//!
//! While an actor cultivates, a counter climbs one per tick. The tick it
//! stops, it becomes vulnerable for `ceil(sqrt(ticks))` ticks, counting down
//! by one every tick afterwards whatever it is doing. Forced re-entry into
//! cultivation is suppressed while the window is open.

use serde::{Deserialize, Serialize};

use crate::math::ceil_sqrt;

/// Per-actor cultivation phase, derived from the tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CultivationPhase {
    /// Neither cultivating nor vulnerable.
    Idle,
    /// Cultivating for this many consecutive ticks.
    Cultivating(u32),
    /// Exposed for this many more ticks.
    Vulnerable(u32),
}

/// Counters behind [`CultivationPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CultivationTracker {
    cultivation_ticks: u32,
    vulnerability_ticks: u32,
}

impl CultivationTracker {
    /// A tracker in the idle phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cultivation_ticks: 0,
            vulnerability_ticks: 0,
        }
    }

    /// Consecutive ticks spent cultivating.
    #[must_use]
    pub const fn cultivation_ticks(&self) -> u32 {
        self.cultivation_ticks
    }

    /// Remaining vulnerability ticks.
    #[must_use]
    pub const fn vulnerability_ticks(&self) -> u32 {
        self.vulnerability_ticks
    }

    /// Whether the post-cultivation window is open.
    #[must_use]
    pub const fn is_vulnerable(&self) -> bool {
        self.vulnerability_ticks > 0
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> CultivationPhase {
        if self.cultivation_ticks > 0 {
            CultivationPhase::Cultivating(self.cultivation_ticks)
        } else if self.vulnerability_ticks > 0 {
            CultivationPhase::Vulnerable(self.vulnerability_ticks)
        } else {
            CultivationPhase::Idle
        }
    }

    /// Advance one tick given whether the actor cultivated this tick.
    pub fn observe(&mut self, cultivating: bool) {
        if cultivating {
            self.cultivation_ticks = self.cultivation_ticks.saturating_add(1);
            self.vulnerability_ticks = self.vulnerability_ticks.saturating_sub(1);
        } else if self.cultivation_ticks > 0 {
            self.vulnerability_ticks = ceil_sqrt(self.cultivation_ticks);
            self.cultivation_ticks = 0;
        } else {
            self.vulnerability_ticks = self.vulnerability_ticks.saturating_sub(1);
        }
    }
}
