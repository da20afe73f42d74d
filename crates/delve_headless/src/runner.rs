//! Runs scenarios tick by tick and collects per-tick reports.

use delve_core::dispatch::{DispatchEntry, RejectReason};
use delve_core::resolve::ResolvedTick;
use delve_core::solver::GridSolver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scenario::{Scenario, ScenarioError};

/// How to run a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Ticks to run; the scenario's own count when `None`.
    pub ticks: Option<u64>,
    /// Bind the built-in grid solver.
    pub solver: bool,
    /// Keep every dispatch entry in the reports.
    pub entries: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ticks: None,
            solver: true,
            entries: false,
        }
    }
}

/// What happened in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number.
    pub tick: u64,
    /// Dispatched actors.
    pub actors: usize,
    /// Accepted permits.
    pub accepted: usize,
    /// Permits rejected for stamina.
    pub rejected_stamina: usize,
    /// Permits rejected as blocked.
    pub rejected_blocked: usize,
    /// Duplicate permits.
    pub rejected_duplicate: usize,
    /// Actors in cultivate mode.
    pub cultivating: usize,
    /// State hash after the tick.
    pub state_hash: u64,
    /// Every entry, when requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<DispatchEntry>,
}

impl TickReport {
    fn from_resolved(resolved: &ResolvedTick, state_hash: u64, keep_entries: bool) -> Self {
        Self {
            tick: resolved.tick(),
            actors: resolved.entries().len(),
            accepted: resolved.accepted(),
            rejected_stamina: resolved.rejected_for(RejectReason::Stamina),
            rejected_blocked: resolved.rejected_for(RejectReason::Blocked),
            rejected_duplicate: resolved.rejected_for(RejectReason::Duplicate),
            cultivating: resolved.cultivating(),
            state_hash,
            entries: if keep_entries {
                resolved.entries().to_vec()
            } else {
                Vec::new()
            },
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks actually run.
    pub ticks: u64,
    /// State hash after the last tick.
    pub final_hash: u64,
    /// One report per tick.
    pub reports: Vec<TickReport>,
    /// Moderator summary lines.
    pub summaries: Vec<String>,
}

impl RunReport {
    /// Reports as JSON lines.
    pub fn json_lines(&self) -> serde_json::Result<Vec<String>> {
        self.reports.iter().map(serde_json::to_string).collect()
    }
}

/// Build and run a scenario.
pub fn run_scenario(scenario: &Scenario, options: &RunOptions) -> Result<RunReport, ScenarioError> {
    let mut built = scenario.build()?;
    let coordinator = &mut built.coordinator;
    if options.solver {
        let budget = coordinator.configurator().config().solver_budget;
        coordinator
            .configurator_mut()
            .bind_solver(Box::new(GridSolver::new(budget)));
    }

    let ticks = options.ticks.unwrap_or(scenario.ticks);
    let mut reports = Vec::new();
    for _ in 0..ticks {
        if !coordinator.step() {
            break;
        }
        let state_hash = coordinator.configurator().state_hash();
        if let Some(resolved) = coordinator.last_resolved() {
            let report = TickReport::from_resolved(resolved, state_hash, options.entries);
            debug!(tick = report.tick, accepted = report.accepted, "tick reported");
            reports.push(report);
        }
    }

    let final_hash = coordinator.configurator().state_hash();
    info!(
        scenario = %scenario.name,
        ticks = reports.len(),
        final_hash = format_args!("{final_hash:016x}"),
        "run complete"
    );
    Ok(RunReport {
        scenario: scenario.name.clone(),
        ticks: reports.len() as u64,
        final_hash,
        reports,
        summaries: coordinator.moderator().summaries().to_vec(),
    })
}

/// Hashes from repeated runs of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Final hash of each run.
    pub hashes: Vec<u64>,
    /// First tick whose hash differed from the first run, if any.
    pub first_divergence: Option<u64>,
}

impl VerifyReport {
    /// Whether every run matched.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_divergence.is_none() && self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run a scenario `runs` times and compare every tick's hash.
pub fn verify_determinism(
    scenario: &Scenario,
    options: &RunOptions,
    runs: u32,
) -> Result<VerifyReport, ScenarioError> {
    let mut hashes = Vec::new();
    let mut first_divergence = None;
    let mut baseline: Option<Vec<u64>> = None;

    for run in 0..runs {
        let report = run_scenario(scenario, options)?;
        let per_tick: Vec<u64> = report.reports.iter().map(|r| r.state_hash).collect();
        match &baseline {
            None => baseline = Some(per_tick),
            Some(expected) => {
                let diverged = expected
                    .iter()
                    .zip(&per_tick)
                    .position(|(a, b)| a != b)
                    .map(|index| report.reports[index].tick);
                if let Some(tick) = diverged {
                    debug!(run, tick, "run diverged");
                    first_divergence = Some(first_divergence.map_or(tick, |seen: u64| seen.min(tick)));
                }
            }
        }
        hashes.push(report.final_hash);
    }

    Ok(VerifyReport {
        hashes,
        first_divergence,
    })
}
