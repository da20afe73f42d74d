//! Frontier exploration: prefer cardinal neighbours the actor has not stood on.

use super::{wander, AiuContext, AiuIntent};
use crate::geometry::Step;
use crate::solver::{SolverRequest, SolverResult};

pub(super) fn prepare(ctx: &AiuContext<'_>) -> Option<SolverRequest> {
    let open = || Step::CARDINALS.into_iter().filter(|step| ctx.can_take(*step));
    let step = open()
        .find(|step| {
            ctx.origin
                .checked_offset(*step)
                .is_some_and(|dest| !ctx.visited.contains(&dest))
        })
        .or_else(|| open().next())?;

    Some(SolverRequest::Reachability {
        from: ctx.origin,
        to: ctx.origin.checked_offset(step)?,
        budget: ctx.solver_budget(),
    })
}

pub(super) fn interpret(
    ctx: &AiuContext<'_>,
    _request: &SolverRequest,
    result: &SolverResult,
) -> Option<AiuIntent> {
    match result.step() {
        Some(step) if result.is_sat() && ctx.can_take(step) => Some(AiuIntent::step(step)),
        _ => wander::walk(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Scratch;
    use super::*;
    use crate::geometry::CellPos;

    #[test]
    fn test_targets_first_unvisited_cardinal() {
        let mut scratch = Scratch::room(3, 3);
        scratch.visited.insert(CellPos::new(1, 2, 0));
        let ctx = scratch.ctx(2, CellPos::new(1, 1, 0));

        let request = prepare(&ctx).unwrap();
        assert_eq!(
            request,
            SolverRequest::Reachability {
                from: CellPos::new(1, 1, 0),
                to: CellPos::new(2, 1, 0),
                budget: 100,
            }
        );
    }

    #[test]
    fn test_falls_back_to_visited_neighbour() {
        let mut scratch = Scratch::room(2, 1);
        scratch.visited.insert(CellPos::new(1, 0, 0));
        let ctx = scratch.ctx(2, CellPos::new(0, 0, 0));

        match prepare(&ctx) {
            Some(SolverRequest::Reachability { to, .. }) => assert_eq!(to, CellPos::new(1, 0, 0)),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_no_request_when_boxed_in() {
        let scratch = Scratch::room(1, 1);
        let ctx = scratch.ctx(2, CellPos::new(0, 0, 0));
        assert!(prepare(&ctx).is_none());
    }

    #[test]
    fn test_sat_step_is_taken() {
        let scratch = Scratch::room(3, 3);
        let ctx = scratch.ctx(2, CellPos::new(1, 1, 0));
        let request = prepare(&ctx).unwrap();
        let intent = interpret(&ctx, &request, &SolverResult::sat(Step::WEST)).unwrap();
        assert_eq!(intent.step, Step::WEST);
    }

    #[test]
    fn test_unsat_degrades_to_random_walk() {
        let scratch = Scratch::room(3, 3);
        let ctx = scratch.ctx(2, CellPos::new(1, 1, 0));
        let request = prepare(&ctx).unwrap();
        let intent = interpret(&ctx, &request, &SolverResult::unsat()).unwrap();
        assert_eq!(Some(intent), wander::walk(&ctx));
    }
}
