//! Guard-radius and waypoint probes. Both hold position whatever the answer.

use super::AiuContext;
use crate::solver::SolverRequest;

pub(super) fn prepare_guard(ctx: &AiuContext<'_>) -> Option<SolverRequest> {
    Some(SolverRequest::GuardRadius {
        from: ctx.origin,
        center: ctx.origin,
        radius: ctx.config.guard_radius,
    })
}

pub(super) fn prepare_waypoint(ctx: &AiuContext<'_>) -> Option<SolverRequest> {
    Some(SolverRequest::Waypoint {
        from: ctx.origin,
        length: ctx.config.waypoint_length,
    })
}
