//! Liquidity <-> token amount conversions over a tick range
//!
//! A position's reserves depend on where the current price sits relative to
//! its range: entirely token0 below the range, entirely token1 above it, a
//! mix in between. All arithmetic stays in the integer domain; repeated
//! float conversions would accumulate rounding drift across calls.

use alloy_primitives::{U256, U512};

use super::{mul_div, u512_to_u256, Q96};

/// amount0 held between two sqrt prices for a given liquidity:
/// L * 2^96 * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b)
fn amount0_between(liquidity: u128, sqrt_a: U256, sqrt_b: U256) -> U256 {
    let (sqrt_a, sqrt_b) = order(sqrt_a, sqrt_b);
    if liquidity == 0 || sqrt_a.is_zero() || sqrt_b.is_zero() {
        return U256::ZERO;
    }
    let numerator = (U512::from(liquidity) << 96) * U512::from(sqrt_b - sqrt_a);
    let denominator = U512::from(sqrt_a) * U512::from(sqrt_b);
    // numerator < 2^384 and the quotient is bounded by L << 96, so this fits
    u512_to_u256(numerator / denominator).unwrap_or(U256::ZERO)
}

/// amount1 held between two sqrt prices: L * (sqrt_b - sqrt_a) / 2^96
fn amount1_between(liquidity: u128, sqrt_a: U256, sqrt_b: U256) -> U256 {
    let (sqrt_a, sqrt_b) = order(sqrt_a, sqrt_b);
    if liquidity == 0 {
        return U256::ZERO;
    }
    mul_div(U256::from(liquidity), sqrt_b - sqrt_a, Q96).unwrap_or(U256::ZERO)
}

/// Liquidity implied by an amount of token0 between two sqrt prices.
///
/// The token0 formula divides by the *upper* bound: L = amount0 * (sqrt_a *
/// sqrt_b / 2^96) / (sqrt_b - sqrt_a). Using the lower bound here skews the
/// token ratio and trips the pool contract's slippage check.
fn liquidity_from_amount0(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> u128 {
    let (sqrt_a, sqrt_b) = order(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return 0;
    }
    let intermediate = match mul_div(sqrt_a, sqrt_b, Q96) {
        Ok(v) => v,
        Err(_) => return 0,
    };
    mul_div(amount0, intermediate, sqrt_b - sqrt_a)
        .map(saturate_u128)
        .unwrap_or(0)
}

/// Liquidity implied by an amount of token1: L = amount1 * 2^96 /
/// (sqrt_b - sqrt_a), where sqrt_a is the *lower* bound of the span.
fn liquidity_from_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> u128 {
    let (sqrt_a, sqrt_b) = order(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return 0;
    }
    mul_div(amount1, Q96, sqrt_b - sqrt_a)
        .map(saturate_u128)
        .unwrap_or(0)
}

/// Given amount0, derive the matching amount1 for a position at the current
/// price over [lower, upper]
pub fn amount1_for_amount0(
    amount0: U256,
    sqrt_current: U256,
    sqrt_lower: U256,
    sqrt_upper: U256,
) -> U256 {
    if sqrt_current <= sqrt_lower {
        // Entirely token0 side; no token1 needed
        return U256::ZERO;
    }
    let liquidity = liquidity_from_amount0(sqrt_current.min(sqrt_upper), sqrt_upper, amount0);
    amount1_between(liquidity, sqrt_lower, sqrt_current.min(sqrt_upper))
}

/// Given amount1, derive the matching amount0
pub fn amount0_for_amount1(
    amount1: U256,
    sqrt_current: U256,
    sqrt_lower: U256,
    sqrt_upper: U256,
) -> U256 {
    if sqrt_current >= sqrt_upper {
        return U256::ZERO;
    }
    let liquidity = liquidity_from_amount1(sqrt_lower, sqrt_current.max(sqrt_lower), amount1);
    amount0_between(liquidity, sqrt_current.max(sqrt_lower), sqrt_upper)
}

/// Liquidity obtainable from a pair of token amounts over [lower, upper].
///
/// In range, both amounts imply a liquidity independently; the minimum is
/// the binding constraint (the pool never invents funds for the other side).
pub fn liquidity_for_amounts(
    sqrt_current: U256,
    sqrt_lower: U256,
    sqrt_upper: U256,
    amount0: U256,
    amount1: U256,
) -> u128 {
    let (sqrt_lower, sqrt_upper) = order(sqrt_lower, sqrt_upper);
    if sqrt_current <= sqrt_lower {
        liquidity_from_amount0(sqrt_lower, sqrt_upper, amount0)
    } else if sqrt_current >= sqrt_upper {
        liquidity_from_amount1(sqrt_lower, sqrt_upper, amount1)
    } else {
        let from0 = liquidity_from_amount0(sqrt_current, sqrt_upper, amount0);
        let from1 = liquidity_from_amount1(sqrt_lower, sqrt_current, amount1);
        from0.min(from1)
    }
}

/// Current constituent token amounts of a position.
///
/// Zero liquidity and zero price bounds yield zero amounts, never an error:
/// this feeds display paths that must not fail on empty positions.
pub fn tokens_from_liquidity(
    liquidity: u128,
    sqrt_current: U256,
    sqrt_lower: U256,
    sqrt_upper: U256,
) -> (U256, U256) {
    if liquidity == 0 {
        return (U256::ZERO, U256::ZERO);
    }
    let (sqrt_lower, sqrt_upper) = order(sqrt_lower, sqrt_upper);
    if sqrt_current <= sqrt_lower {
        // Below range: all token0
        (amount0_between(liquidity, sqrt_lower, sqrt_upper), U256::ZERO)
    } else if sqrt_current >= sqrt_upper {
        // Above range: all token1
        (U256::ZERO, amount1_between(liquidity, sqrt_lower, sqrt_upper))
    } else {
        (
            amount0_between(liquidity, sqrt_current, sqrt_upper),
            amount1_between(liquidity, sqrt_lower, sqrt_current),
        )
    }
}

fn order(a: U256, b: U256) -> (U256, U256) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn saturate_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.to::<u128>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick::tick_to_sqrt_price_x96;

    fn sqrt_at(tick: i32) -> U256 {
        tick_to_sqrt_price_x96(tick).unwrap()
    }

    #[test]
    fn test_zero_liquidity_yields_zero_amounts() {
        let (a0, a1) = tokens_from_liquidity(0, sqrt_at(0), sqrt_at(-100), sqrt_at(100));
        assert_eq!(a0, U256::ZERO);
        assert_eq!(a1, U256::ZERO);
    }

    #[test]
    fn test_below_range_all_token0() {
        let (a0, a1) =
            tokens_from_liquidity(1_000_000_000_000, sqrt_at(-200), sqrt_at(-100), sqrt_at(100));
        assert!(a0 > U256::ZERO);
        assert_eq!(a1, U256::ZERO);
    }

    #[test]
    fn test_above_range_all_token1() {
        let (a0, a1) =
            tokens_from_liquidity(1_000_000_000_000, sqrt_at(200), sqrt_at(-100), sqrt_at(100));
        assert_eq!(a0, U256::ZERO);
        assert!(a1 > U256::ZERO);
    }

    #[test]
    fn test_in_range_holds_both() {
        let (a0, a1) =
            tokens_from_liquidity(1_000_000_000_000, sqrt_at(0), sqrt_at(-100), sqrt_at(100));
        assert!(a0 > U256::ZERO);
        assert!(a1 > U256::ZERO);
    }

    #[test]
    fn test_liquidity_is_binding_minimum() {
        // Round-tripping through liquidity can never return more than went in
        let current = sqrt_at(0);
        let lower = sqrt_at(-1000);
        let upper = sqrt_at(1000);
        let amount0 = U256::from(5_000_000_000_000_000_000u128);
        let amount1 = U256::from(3_000_000_000_000_000_000u128);

        let liquidity = liquidity_for_amounts(current, lower, upper, amount0, amount1);
        let (back0, back1) = tokens_from_liquidity(liquidity, current, lower, upper);
        assert!(back0 <= amount0, "{} > {}", back0, amount0);
        assert!(back1 <= amount1, "{} > {}", back1, amount1);
    }

    #[test]
    fn test_symmetric_range_balances_amounts() {
        // At the center of a symmetric range the raw amounts of a 1:1 pool
        // should be close to each other
        let current = sqrt_at(0);
        let (a0, a1) = tokens_from_liquidity(
            10_000_000_000_000_000,
            current,
            sqrt_at(-6000),
            sqrt_at(6000),
        );
        let a0 = a0.to::<u128>() as f64;
        let a1 = a1.to::<u128>() as f64;
        assert!((a0 - a1).abs() / a0 < 0.01, "a0 {} vs a1 {}", a0, a1);
    }

    #[test]
    fn test_matching_amount_derivations_agree() {
        let current = sqrt_at(0);
        let lower = sqrt_at(-5000);
        let upper = sqrt_at(5000);
        let amount0 = U256::from(1_000_000_000_000_000_000u128);

        let amount1 = amount1_for_amount0(amount0, current, lower, upper);
        assert!(amount1 > U256::ZERO);

        // Deriving amount0 back from that amount1 lands near the original
        let back0 = amount0_for_amount1(amount1, current, lower, upper);
        let orig = amount0.to::<u128>() as f64;
        let got = back0.to::<u128>() as f64;
        assert!((orig - got).abs() / orig < 0.001, "{} vs {}", orig, got);
    }

    #[test]
    fn test_out_of_range_sides_need_nothing() {
        let lower = sqrt_at(100);
        let upper = sqrt_at(200);
        // Current below the range: position is all token0, no token1 needed
        let amount1 = amount1_for_amount0(U256::from(1u64) << 64, sqrt_at(0), lower, upper);
        assert_eq!(amount1, U256::ZERO);
        // Current above the range: all token1, no token0 needed
        let amount0 = amount0_for_amount1(U256::from(1u64) << 64, sqrt_at(300), lower, upper);
        assert_eq!(amount0, U256::ZERO);
    }
}
