//! Human-readable strings for dispatch results.

use crate::dispatch::{DispatchEntry, Outcome, RejectReason};
use crate::resolve::ResolvedTick;
use crate::solver::SolverVerdict;

/// Label for a raw solver code, `"-"` when no query was issued.
#[must_use]
pub fn solver_label(code: u8) -> &'static str {
    SolverVerdict::from_code(code).map_or("-", SolverVerdict::label)
}

/// What the actor was told to do, e.g. `AIU#5 N`.
#[must_use]
pub fn describe_directive(entry: &DispatchEntry) -> String {
    if entry.aiu == 0 {
        format!("{} {}", entry.tier, entry.step.label())
    } else {
        format!("{}#{} {}", entry.tier, entry.aiu, entry.step.label())
    }
}

/// What happened, e.g. `accepted` or `rejected(blocked)`.
#[must_use]
pub fn describe_outcome(entry: &DispatchEntry) -> String {
    match entry.outcome {
        Outcome::Rejected => format!("{}({})", entry.outcome, entry.reason),
        Outcome::Pending | Outcome::Accepted => entry.outcome.to_string(),
    }
}

/// One line per entry.
#[must_use]
pub fn format_entry(tick: u64, entry: &DispatchEntry) -> String {
    format!(
        "t{tick} a{actor} {origin} {directive} -> {outcome} solver={solver} mode={mode} aux={aux} cult={cult} vuln={vuln}",
        actor = entry.actor,
        origin = entry.origin,
        directive = describe_directive(entry),
        outcome = describe_outcome(entry),
        solver = solver_label(entry.solver_code()),
        mode = entry.mode.label(),
        aux = entry.aux,
        cult = entry.cultivation_ticks,
        vuln = entry.vulnerability_ticks,
    )
}

/// One-line tick summary.
#[must_use]
pub fn summarize(resolved: &ResolvedTick) -> String {
    format!(
        "tick {} actors={} accepted={} rejected={} (stamina={} blocked={} duplicate={}) cultivating={}",
        resolved.tick(),
        resolved.entries().len(),
        resolved.accepted(),
        resolved.rejected(),
        resolved.rejected_for(RejectReason::Stamina),
        resolved.rejected_for(RejectReason::Blocked),
        resolved.rejected_for(RejectReason::Duplicate),
        resolved.cultivating(),
    )
}
