//! Fixed-point and integer math for deterministic cost accounting.
//!
//! Stamina costs scale by √2 and √3, which would be the one place floats
//! could creep into the tick. Everything here is fixed-point or integer so
//! two runs of the same tick on different machines debit identical amounts.

use fixed::types::{I32F32, U64F64};

/// Fixed-point number type for all cost math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    high
}

/// Multiplier applied to the base movement cost for a kind of step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepScale {
    /// Orthogonal step (×1).
    Cardinal,
    /// Diagonal step (×√2).
    Diagonal,
    /// Stair transition between levels (×√3).
    LevelChange,
}

impl StepScale {
    /// The fixed-point multiplier for this step kind.
    #[must_use]
    pub fn multiplier(self) -> Fixed {
        match self {
            Self::Cardinal => Fixed::ONE,
            Self::Diagonal => fixed_sqrt(Fixed::from_num(2)),
            Self::LevelChange => fixed_sqrt(Fixed::from_num(3)),
        }
    }
}

/// `ceil(max * percent / 100 * scale)`, never less than 1, saturating at
/// `u32::MAX`.
///
/// This is the stamina debit for one permit: a percentage of the actor's
/// maximum stamina, scaled by step kind. The product is taken in 64 bits so
/// large pools are charged in full.
#[must_use]
pub fn scaled_percent_cost(max: u32, percent: u32, scale: StepScale) -> u32 {
    let product = u64::from(max) * u64::from(percent);
    let cost = match scale {
        StepScale::Cardinal => product.div_ceil(100),
        StepScale::Diagonal | StepScale::LevelChange => {
            let base = U64F64::from_num(product) / U64F64::from_num(100);
            base.saturating_mul(U64F64::from_num(scale.multiplier()))
                .saturating_ceil()
                .saturating_to_num::<u64>()
        }
    };
    u32::try_from(cost).unwrap_or(u32::MAX).max(1)
}

/// `ceil(max * percent / 100)` in integer arithmetic, saturating at `u32::MAX`.
#[must_use]
pub fn ceil_percent(max: u32, percent: u32) -> u32 {
    let product = u64::from(max) * u64::from(percent);
    u32::try_from(product.div_ceil(100)).unwrap_or(u32::MAX)
}

/// Integer `ceil(sqrt(n))`.
#[must_use]
pub fn ceil_sqrt(n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let mut root = isqrt(n);
    if root * root < n {
        root += 1;
    }
    root
}

/// Integer floor square root by Newton iteration.
fn isqrt(n: u32) -> u32 {
    let n = u64::from(n);
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sqrt_precision() {
        let two = fixed_sqrt(Fixed::from_num(2));
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((two * two - Fixed::from_num(2)).abs() < epsilon);

        let nine = fixed_sqrt(Fixed::from_num(9));
        assert!((nine - Fixed::from_num(3)).abs() < epsilon);
    }

    #[test]
    fn test_fixed_sqrt_determinism() {
        assert_eq!(
            fixed_sqrt(Fixed::from_num(3)),
            fixed_sqrt(Fixed::from_num(3))
        );
    }

    #[test]
    fn test_scaled_costs() {
        // 10% of 100 is 10; diagonal 14.14 -> 15; stairs 17.32 -> 18
        assert_eq!(scaled_percent_cost(100, 10, StepScale::Cardinal), 10);
        assert_eq!(scaled_percent_cost(100, 10, StepScale::Diagonal), 15);
        assert_eq!(scaled_percent_cost(100, 10, StepScale::LevelChange), 18);
    }

    #[test]
    fn test_scaled_cost_floor_is_one() {
        assert_eq!(scaled_percent_cost(10, 1, StepScale::Cardinal), 1);
        assert_eq!(scaled_percent_cost(0, 1, StepScale::Diagonal), 1);
    }

    #[test]
    fn test_large_pools_are_charged_in_full() {
        assert_eq!(scaled_percent_cost(4_000_000_000, 100, StepScale::Cardinal), 4_000_000_000);
        assert_eq!(scaled_percent_cost(u32::MAX, 500, StepScale::Cardinal), u32::MAX);
        assert_eq!(scaled_percent_cost(4_000_000_000, 100, StepScale::LevelChange), u32::MAX);

        let cardinal = scaled_percent_cost(u32::MAX, 1, StepScale::Cardinal);
        let diagonal = scaled_percent_cost(u32::MAX, 1, StepScale::Diagonal);
        assert_eq!(cardinal, 42_949_673);
        assert!(diagonal > cardinal + cardinal / 3);
        assert!(diagonal < cardinal + cardinal / 2);
    }

    #[test]
    fn test_ceil_percent() {
        assert_eq!(ceil_percent(100, 4), 4);
        assert_eq!(ceil_percent(120, 4), 5);
        assert_eq!(ceil_percent(0, 4), 0);
        assert_eq!(ceil_percent(u32::MAX, 100), u32::MAX);
        assert_eq!(ceil_percent(u32::MAX, 250), u32::MAX);
        assert_eq!(ceil_percent(3_000_000_000, 120), 3_600_000_000);
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(2), 2);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(9), 3);
        assert_eq!(ceil_sqrt(10), 4);
        assert_eq!(ceil_sqrt(u32::MAX), 65536);
    }
}
