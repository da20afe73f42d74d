//! Exit seeking and exit defence.
//!
//! Both look up the Manhattan-nearest exit portal on the actor's level. Any
//! step they take is collapsed to one axis, keeping the axis with the larger
//! remaining distance to the exit.

use super::{wander, AiuContext, AiuIntent};
use crate::geometry::{CellPos, Step};
use crate::level_map::PortalKind;
use crate::solver::{SolverRequest, SolverResult};

fn nearest_exit(ctx: &AiuContext<'_>) -> Option<CellPos> {
    ctx.map
        .find_nearest_portal(ctx.origin, PortalKind::Exit, ctx.origin.level)
}

fn toward(ctx: &AiuContext<'_>, target: CellPos, step: Step) -> Step {
    step.single_axis(
        i64::from(target.x) - i64::from(ctx.origin.x),
        i64::from(target.y) - i64::from(ctx.origin.y),
    )
}

pub(super) fn prepare_find(ctx: &AiuContext<'_>) -> Option<SolverRequest> {
    let exit = nearest_exit(ctx)?;
    if exit == ctx.origin {
        return None;
    }
    Some(SolverRequest::Reachability {
        from: ctx.origin,
        to: exit,
        budget: ctx.solver_budget(),
    })
}

pub(super) fn interpret_find(
    ctx: &AiuContext<'_>,
    request: &SolverRequest,
    result: &SolverResult,
) -> Option<AiuIntent> {
    let SolverRequest::Reachability { to, .. } = *request else {
        return wander::walk(ctx);
    };
    match result.step() {
        Some(step) if result.is_sat() => {
            let step = toward(ctx, to, step);
            if ctx.can_take(step) {
                Some(AiuIntent::step(step))
            } else {
                wander::walk(ctx)
            }
        }
        _ => wander::walk(ctx),
    }
}

/// Standing on the exit means the job is done; otherwise wander.
pub(super) fn plan_find_without_solver(ctx: &AiuContext<'_>) -> Option<AiuIntent> {
    if ctx.map.portal_at(ctx.origin) == PortalKind::Exit {
        return Some(AiuIntent::hold());
    }
    wander::walk(ctx)
}

pub(super) fn prepare_defend(ctx: &AiuContext<'_>) -> Option<SolverRequest> {
    let exit = nearest_exit(ctx)?;
    Some(SolverRequest::GuardRadius {
        from: ctx.origin,
        center: exit,
        radius: ctx.config.guard_radius,
    })
}

pub(super) fn interpret_defend(
    ctx: &AiuContext<'_>,
    request: &SolverRequest,
    result: &SolverResult,
) -> Option<AiuIntent> {
    let SolverRequest::GuardRadius { center, .. } = *request else {
        return Some(AiuIntent::hold());
    };
    match result.step() {
        Some(step) if result.is_sat() => {
            let step = toward(ctx, center, step);
            if ctx.can_take(step) {
                Some(AiuIntent::step(step))
            } else {
                Some(AiuIntent::hold())
            }
        }
        _ => Some(AiuIntent::hold()),
    }
}
