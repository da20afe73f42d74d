//! Cultivation: stand still while any pool is below max.
//!
//! The module only proposes the zero step. Regeneration and the tracker
//! update happen in the dispatch builder, keyed on [`AiuMode::Cultivate`].

use super::{AiuContext, AiuIntent, AiuMode};
use crate::geometry::Step;

pub(super) fn plan(ctx: &AiuContext<'_>) -> Option<AiuIntent> {
    if !ctx.pools.any_depleted() {
        return None;
    }
    Some(AiuIntent {
        step: Step::HOLD,
        solver: None,
        mode: AiuMode::Cultivate,
        aux: i32::try_from(ctx.cultivation.cultivation_ticks().saturating_add(1))
            .unwrap_or(i32::MAX),
    })
}
