//! Generic 4-direction reachability probe for solver-backed module ids.

use super::{AiuContext, AiuIntent, SolverLink};
use crate::geometry::Step;
use crate::solver::{SolverRequest, SolverVerdict};

/// Result of a probe: the accepted intent, or the last verdict seen so the
/// module's own intent can still report that a query happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeOutcome {
    /// Intent from the first direction the solver confirmed.
    pub intent: Option<AiuIntent>,
    /// Verdict of the last query issued.
    pub last_verdict: Option<SolverVerdict>,
}

/// Ask the solver about each enterable cardinal neighbour, starting at the
/// rotated direction, and take the first one it confirms.
pub fn probe(ctx: &AiuContext<'_>, solver: &mut SolverLink<'_>) -> ProbeOutcome {
    let start = (ctx.rotation_seed() % 4) as usize;
    let mut outcome = ProbeOutcome::default();

    for k in 0..Step::CARDINALS.len() {
        let step = Step::CARDINALS[(start + k) % Step::CARDINALS.len()];
        let Some(to) = ctx.origin.checked_offset(step).filter(|_| ctx.can_take(step)) else {
            continue;
        };
        let result = solver.query(&SolverRequest::Reachability {
            from: ctx.origin,
            to,
            budget: ctx.solver_budget(),
        });
        outcome.last_verdict = Some(result.verdict());
        if result.is_sat() && result.step() == Some(step) {
            outcome.intent = Some(AiuIntent::step(step).with_verdict(result.verdict()));
            break;
        }
    }

    outcome
}
