//! Corridor patrol: cycle N, E, S, W from the stored index.
//!
//! The intent's `aux` carries the index to resume from next tick; the
//! dispatch builder writes it back to the actor record.

use super::{AiuContext, AiuIntent, AiuMode};
use crate::geometry::Step;

const ROUTE_LEN: u8 = Step::CARDINALS.len() as u8;

pub(super) fn plan(ctx: &AiuContext<'_>) -> Option<AiuIntent> {
    let start = ctx.patrol_index % ROUTE_LEN;
    let found = (0..ROUTE_LEN)
        .map(|k| (start + k) % ROUTE_LEN)
        .find(|index| ctx.can_take(Step::CARDINALS[usize::from(*index)]));

    let (step, next) = match found {
        Some(index) => (Step::CARDINALS[usize::from(index)], (index + 1) % ROUTE_LEN),
        None => (Step::HOLD, start),
    };
    Some(AiuIntent {
        step,
        solver: None,
        mode: AiuMode::Patrol,
        aux: i32::from(next),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Scratch;
    use super::*;
    use crate::geometry::CellPos;

    #[test]
    fn test_patrol_cycles_from_stored_index() {
        let scratch = Scratch::room(3, 3);
        let mut ctx = scratch.ctx(7, CellPos::new(1, 1, 0));

        ctx.patrol_index = 0;
        let intent = plan(&ctx).unwrap();
        assert_eq!(intent.step, Step::NORTH);
        assert_eq!(intent.aux, 1);
        assert_eq!(intent.mode, AiuMode::Patrol);

        ctx.patrol_index = 3;
        let intent = plan(&ctx).unwrap();
        assert_eq!(intent.step, Step::WEST);
        assert_eq!(intent.aux, 0);
    }

    #[test]
    fn test_patrol_skips_blocked_directions() {
        // 1-high corridor: north and south are never open
        let scratch = Scratch::room(3, 1);
        let mut ctx = scratch.ctx(7, CellPos::new(1, 0, 0));
        ctx.patrol_index = 0;

        let intent = plan(&ctx).unwrap();
        assert_eq!(intent.step, Step::EAST);
        assert_eq!(intent.aux, 2);

        ctx.patrol_index = 2;
        let intent = plan(&ctx).unwrap();
        assert_eq!(intent.step, Step::WEST);
        assert_eq!(intent.aux, 0);
    }

    #[test]
    fn test_patrol_holds_in_place_when_boxed_in() {
        let scratch = Scratch::room(1, 1);
        let mut ctx = scratch.ctx(7, CellPos::new(0, 0, 0));
        ctx.patrol_index = 2;
        let intent = plan(&ctx).unwrap();
        assert_eq!(intent.step, Step::HOLD);
        assert_eq!(intent.aux, 2);
    }
}
