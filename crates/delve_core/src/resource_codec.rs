//! Packed 32-bit resource snapshot.
//!
//! ```text
//!  31  30..24   23..16     15..12    11..0
//! sign regen   current %  exponent  mantissa
//! ```
//!
//! `max ≈ mantissa << exponent` (round to nearest), `current` is stored as a
//! percentage of max, regen magnitude is clamped to 127. Maxima below 4096
//! round-trip exactly; `current` comes back within one unit for maxima up
//! to 200 and within 1% of max above that.

use serde::{Deserialize, Serialize};

use crate::actor::{Pool, ResourcePools};

const MANTISSA_BITS: u32 = 12;
const MANTISSA_MAX: u32 = (1 << MANTISSA_BITS) - 1;
const EXPONENT_SHIFT: u32 = 12;
const EXPONENT_MAX: u32 = 0xF;
const PERCENT_SHIFT: u32 = 16;
const REGEN_SHIFT: u32 = 24;
const REGEN_MAX: u32 = 0x7F;
const SIGN_BIT: u32 = 1 << 31;

/// Decoded view of one packed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Approximate current value.
    pub current: u32,
    /// Approximate maximum.
    pub max: u32,
    /// Signed regeneration magnitude, clamped to ±127.
    pub regen: i32,
}

/// Pack one pool.
#[must_use]
pub fn encode_pool(current: u32, max: u32, regen: i32) -> u32 {
    let (mantissa, exponent) = encode_max(max);

    let percent = if max == 0 {
        0
    } else {
        let current = u64::from(current.min(max));
        ((current * 100 + u64::from(max) / 2) / u64::from(max)) as u32
    };

    let magnitude = regen.unsigned_abs().min(REGEN_MAX);
    let sign = if regen < 0 { SIGN_BIT } else { 0 };

    mantissa
        | (exponent << EXPONENT_SHIFT)
        | (percent << PERCENT_SHIFT)
        | (magnitude << REGEN_SHIFT)
        | sign
}

/// Unpack one pool.
#[must_use]
pub fn decode_pool(word: u32) -> PoolSnapshot {
    let mantissa = word & MANTISSA_MAX;
    let exponent = (word >> EXPONENT_SHIFT) & EXPONENT_MAX;
    let percent = (word >> PERCENT_SHIFT) & 0xFF;
    let magnitude = ((word >> REGEN_SHIFT) & REGEN_MAX) as i32;

    let max = mantissa << exponent;
    let current = ((u64::from(max) * u64::from(percent) + 50) / 100) as u32;
    let regen = if word & SIGN_BIT == 0 {
        magnitude
    } else {
        -magnitude
    };
    PoolSnapshot {
        current: current.min(max),
        max,
        regen,
    }
}

fn encode_max(max: u32) -> (u32, u32) {
    let mut exponent = 0;
    let mut mantissa = max;
    while mantissa > MANTISSA_MAX && exponent < EXPONENT_MAX {
        exponent += 1;
        let half = 1u64 << (exponent - 1);
        mantissa = ((u64::from(max) + half) >> exponent) as u32;
    }
    (mantissa.min(MANTISSA_MAX), exponent)
}

/// Pack a pool using its last change as the regen value.
#[must_use]
pub fn encode(pool: &Pool) -> u32 {
    encode_pool(pool.current, pool.max, pool.last_delta)
}

/// All four pools packed, in stamina, health, mana, durability order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Packed stamina.
    pub stamina: u32,
    /// Packed health.
    pub health: u32,
    /// Packed mana.
    pub mana: u32,
    /// Packed durability.
    pub durability: u32,
}

impl ResourceSnapshot {
    /// Pack a set of pools.
    #[must_use]
    pub fn capture(pools: &ResourcePools) -> Self {
        Self {
            stamina: encode(&pools.stamina),
            health: encode(&pools.health),
            mana: encode(&pools.mana),
            durability: encode(&pools.durability),
        }
    }

    /// Words in fixed order.
    #[must_use]
    pub const fn words(&self) -> [u32; 4] {
        [self.stamina, self.health, self.mana, self.durability]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_pools_within_one_unit() {
        for max in [1u32, 7, 10, 99, 100, 150, 200] {
            for current in 0..=max {
                let decoded = decode_pool(encode_pool(current, max, 0));
                assert_eq!(decoded.max, max);
                assert!(
                    decoded.current.abs_diff(current) <= 1,
                    "{current}/{max} came back as {}",
                    decoded.current
                );
            }
        }
    }

    #[test]
    fn test_large_max_uses_exponent() {
        let word = encode_pool(50_000, 100_000, 0);
        let decoded = decode_pool(word);
        assert!(decoded.max.abs_diff(100_000) <= 100_000 / 2048);
        assert!(decoded.current.abs_diff(50_000) <= 1_000);
        assert_ne!((word >> EXPONENT_SHIFT) & EXPONENT_MAX, 0);
    }

    #[test]
    fn test_regen_sign_and_clamp() {
        assert_eq!(decode_pool(encode_pool(5, 10, -3)).regen, -3);
        assert_eq!(decode_pool(encode_pool(5, 10, 3)).regen, 3);
        assert_eq!(decode_pool(encode_pool(5, 10, 500)).regen, 127);
        assert_eq!(decode_pool(encode_pool(5, 10, -500)).regen, -127);
        assert_eq!(encode_pool(5, 10, -1) & SIGN_BIT, SIGN_BIT);
    }

    #[test]
    fn test_zero_max() {
        assert_eq!(decode_pool(encode_pool(0, 0, 0)), PoolSnapshot::default());
    }

    #[test]
    fn test_capture_uses_last_delta() {
        let mut pools = ResourcePools::uniform(100);
        pools.stamina.debit(4);
        let snapshot = ResourceSnapshot::capture(&pools);
        let stamina = decode_pool(snapshot.stamina);
        assert_eq!(stamina.current, 96);
        assert_eq!(stamina.regen, -4);
        assert_eq!(decode_pool(snapshot.health).current, 100);
    }
}
