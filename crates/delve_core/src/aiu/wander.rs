//! Deterministic random walk.

use super::{AiuContext, AiuId, AiuIntent};
use crate::geometry::Step;
use crate::ledger::ActorHandle;

/// Rotation seed for a `(module, actor, tick)` triple.
///
/// Random walk starts its 8-direction scan at `seed % 8`; the instinct
/// fallback scan starts its 4-direction scan at `seed % 4`.
#[must_use]
pub const fn rotation_seed(aiu: AiuId, actor: ActorHandle, tick_seed: u32) -> u32 {
    aiu ^ (actor << 1) ^ tick_seed
}

/// First enterable compass direction from the rotated start; hold if boxed in.
#[must_use]
pub fn walk(ctx: &AiuContext<'_>) -> Option<AiuIntent> {
    let start = (ctx.rotation_seed() % 8) as usize;
    let step = (0..Step::COMPASS.len())
        .map(|k| Step::COMPASS[(start + k) % Step::COMPASS.len()])
        .find(|step| ctx.can_take(*step))
        .unwrap_or(Step::HOLD);
    Some(AiuIntent::step(step))
}
