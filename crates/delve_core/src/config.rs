//! Simulation tunables.
//!
//! Defaults reproduce the reference behaviour; scenarios may override any
//! field from RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::math::ceil_percent;

/// Knobs read by the dispatch builder, the AIU modules and permit costing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed mixed into every tick seed.
    pub seed: u32,
    /// Cardinal move cost as a percentage of max stamina.
    pub move_cost_percent: u32,
    /// Forced cultivation threshold as a percentage of max stamina.
    pub forced_cultivation_percent: u32,
    /// Lower bound on the forced cultivation threshold.
    pub forced_cultivation_floor: u32,
    /// Cultivation regenerates this many minimum action costs per tick.
    pub regen_multiple: u32,
    /// Radius of guard probes.
    pub guard_radius: u32,
    /// Length of waypoint probes.
    pub waypoint_length: u32,
    /// Node expansion budget for the built-in grid solver.
    pub solver_budget: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            move_cost_percent: 1,
            forced_cultivation_percent: 4,
            forced_cultivation_floor: 6,
            regen_multiple: 3,
            guard_radius: 3,
            waypoint_length: 4,
            solver_budget: 256,
        }
    }
}

impl SimConfig {
    /// Parse from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| CoreError::DataParseError {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Load from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CoreError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&contents).map_err(|e| CoreError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Stamina below which an actor is forced into cultivation:
    /// `max(ceil(percent of max), floor)`, never above `max`.
    #[must_use]
    pub fn forced_cultivation_threshold(&self, stamina_max: u32) -> u32 {
        ceil_percent(stamina_max, self.forced_cultivation_percent)
            .max(self.forced_cultivation_floor)
            .min(stamina_max)
    }

    /// The smallest meaningful action cost for a pool of size `max`.
    #[must_use]
    pub fn min_action_cost(&self, max: u32) -> u32 {
        ceil_percent(max, self.move_cost_percent).max(1)
    }
}
