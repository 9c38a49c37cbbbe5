//! Tick / price / sqrt-price conversions
//!
//! Implements the exact Uniswap V3 TickMath algorithm: quotes and position
//! math must match on-chain fixed-point results bit-for-bit, and a naive
//! floating-point power loses precision at the extremes of the tick range.

use alloy_primitives::U256;
use eyre::{eyre, Result};

/// Minimum tick (price = 1.0001^MIN_TICK)
pub const MIN_TICK: i32 = -887272;

/// Maximum tick
pub const MAX_TICK: i32 = 887272;

/// sqrt price at MIN_TICK, Q96
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);

/// sqrt price at MAX_TICK, Q96: 1461446703485210103287273052203988822378723970342
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([0x5D951D5263988D26, 0xEFD1FC6A50648849, 0xFFFD8963, 0]);

/// Per-bit multipliers for tick exponentiation, Q128.
///
/// Entry i is sqrt(1.0001)^-(2^i) scaled by 2^128, exactly as in
/// Uniswap V3 TickMath.sol. abs(tick) < 2^20, so 20 entries cover every bit.
const TICK_MULTIPLIERS: [u128; 20] = [
    0xfffcb933bd6fad37aa2d162d1a594001,
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

/// Convert a tick to its Q96 sqrt price.
///
/// Binary exponentiation against the Q128 multiplier table, inverted via
/// U256::MAX / ratio for positive ticks, then shifted down to Q96 with
/// round-up on a non-zero remainder.
pub fn tick_to_sqrt_price_x96(tick: i32) -> Result<U256> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(eyre!(
            "tick {} out of bounds [{}, {}]",
            tick,
            MIN_TICK,
            MAX_TICK
        ));
    }

    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from(TICK_MULTIPLIERS[0])
    } else {
        U256::from(1u8) << 128
    };
    for (i, multiplier) in TICK_MULTIPLIERS.iter().enumerate().skip(1) {
        if abs_tick & (1 << i) != 0 {
            ratio = (ratio * U256::from(*multiplier)) >> 128;
        }
    }

    // The table encodes negative powers; positive ticks take the reciprocal
    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128 -> Q96, rounding up so the tick-of-price inverse stays consistent
    let shifted = ratio >> 32;
    let remainder: U256 = ratio & ((U256::from(1u8) << 32) - U256::from(1u8));
    Ok(if remainder.is_zero() {
        shifted
    } else {
        shifted + U256::from(1u8)
    })
}

/// Convert a human-readable price into raw-amount terms for a token pair
fn adjust_price(price: f64, decimals0: u8, decimals1: u8) -> f64 {
    price * 10f64.powi(decimals1 as i32 - decimals0 as i32)
}

/// Convert a human-readable price to a Q96 sqrt price.
///
/// The 2^96 scaling is split into two 2^48 factors: the first applied in
/// floating point (a 2^48 multiplier keeps the intermediate inside the
/// exactly representable integer range of an f64), the second as an integer
/// left shift. A single f64 multiply by 2^96 would collapse the low bits.
pub fn price_to_sqrt_price_x96(price: f64, decimals0: u8, decimals1: u8) -> U256 {
    let adjusted = adjust_price(price, decimals0, decimals1);
    if !(adjusted > 0.0) || !adjusted.is_finite() {
        return MIN_SQRT_RATIO;
    }

    let sqrt_price = adjusted.sqrt();
    let scaled = sqrt_price * 2f64.powi(48);
    let x96: U256 = U256::from(scaled as u128) << 48;

    x96.clamp(MIN_SQRT_RATIO, MAX_SQRT_RATIO)
}

/// Convert a Q96 sqrt price back to a human-readable price
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let sp = u256_to_f64(sqrt_price_x96) / 2f64.powi(96);
    sp * sp * 10f64.powi(decimals0 as i32 - decimals1 as i32)
}

/// Convert a human-readable price to the nearest tick at or below it.
///
/// floor(log(price) / log(1.0001)), clamped. Approximate inverse of
/// `tick_to_price` within one tick; the reference protocol rounds the same
/// way, so this must not be tightened into an exact inverse.
pub fn price_to_tick(price: f64, decimals0: u8, decimals1: u8) -> i32 {
    let adjusted = adjust_price(price, decimals0, decimals1);
    if !(adjusted > 0.0) || !adjusted.is_finite() {
        return MIN_TICK;
    }
    let tick = (adjusted.ln() / 1.0001f64.ln()).floor();
    (tick as i64).clamp(MIN_TICK as i64, MAX_TICK as i64) as i32
}

/// Convert a tick to a human-readable price: 1.0001^tick rescaled by decimals
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> f64 {
    1.0001f64.powi(tick) * 10f64.powi(decimals0 as i32 - decimals1 as i32)
}

/// Round a tick to the nearest multiple of the pool's tick spacing.
///
/// When the rounded multiple falls outside the valid tick range, the nearest
/// in-bounds multiple is returned instead of a plain clamp (a plain clamp
/// would yield a tick that is not a spacing multiple).
pub fn nearest_usable_tick(tick: i32, spacing: i32) -> Result<i32> {
    if spacing <= 0 {
        return Err(eyre!("tick spacing must be positive, got {}", spacing));
    }
    let rounded = ((tick as f64 / spacing as f64).round() as i32) * spacing;
    Ok(if rounded < MIN_TICK {
        rounded + spacing
    } else if rounded > MAX_TICK {
        rounded - spacing
    } else {
        rounded
    })
}

/// Lossy U256 -> f64, good to ~53 bits of precision
pub(crate) fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .enumerate()
        .map(|(i, &limb)| limb as f64 * 2f64.powi(64 * i as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_zero_is_q96() {
        // sqrt(1.0001^0) * 2^96 = 2^96
        let one = U256::from(2u8).pow(U256::from(96));
        assert_eq!(tick_to_sqrt_price_x96(0).unwrap(), one);
    }

    #[test]
    fn test_tick_bounds_match_reference_constants() {
        assert_eq!(tick_to_sqrt_price_x96(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(tick_to_sqrt_price_x96(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
    }

    #[test]
    fn test_known_reference_values() {
        // Values from the Uniswap V3 TickMath test vectors
        assert_eq!(
            tick_to_sqrt_price_x96(1).unwrap().to_string(),
            "79232123823359799118286999568"
        );
        assert_eq!(
            tick_to_sqrt_price_x96(-1).unwrap().to_string(),
            "79224201403219477170569942574"
        );
    }

    #[test]
    fn test_out_of_bounds_tick_rejected() {
        assert!(tick_to_sqrt_price_x96(MAX_TICK + 1).is_err());
        assert!(tick_to_sqrt_price_x96(MIN_TICK - 1).is_err());
    }

    #[test]
    fn test_all_sampled_ticks_within_ratio_bounds() {
        let samples = [
            MIN_TICK, -500000, -100000, -887, -1, 0, 1, 887, 100000, 500000, MAX_TICK,
        ];
        for tick in samples {
            let sqrt = tick_to_sqrt_price_x96(tick).unwrap();
            assert!(sqrt >= MIN_SQRT_RATIO, "tick {} below min", tick);
            assert!(sqrt <= MAX_SQRT_RATIO, "tick {} above max", tick);
        }
    }

    #[test]
    fn test_monotonic_in_tick() {
        let mut prev = tick_to_sqrt_price_x96(-1000).unwrap();
        for tick in -999..1000 {
            let current = tick_to_sqrt_price_x96(tick).unwrap();
            assert!(current > prev, "not monotonic at tick {}", tick);
            prev = current;
        }
    }

    #[test]
    fn test_price_sqrt_price_round_trip() {
        // WETH(18) / USDC(6) pair around 3000 USDC per ETH, token0 = USDC
        let price = 3000.0;
        let sqrt = price_to_sqrt_price_x96(price, 18, 6);
        let back = sqrt_price_x96_to_price(sqrt, 18, 6);
        assert!((back - price).abs() / price < 1e-9, "got {}", back);
    }

    #[test]
    fn test_non_positive_price_maps_to_min() {
        assert_eq!(price_to_sqrt_price_x96(0.0, 18, 18), MIN_SQRT_RATIO);
        assert_eq!(price_to_sqrt_price_x96(-5.0, 18, 18), MIN_SQRT_RATIO);
    }

    #[test]
    fn test_extreme_price_clamped() {
        assert_eq!(price_to_sqrt_price_x96(1e60, 18, 18), MAX_SQRT_RATIO);
    }

    #[test]
    fn test_price_tick_approximate_inverse() {
        for price in [0.001, 1.0, 1234.5678, 100000.0] {
            let tick = price_to_tick(price, 18, 18);
            let round_trip = price_to_tick(tick_to_price(tick, 18, 18), 18, 18);
            assert!(
                (round_trip - tick).abs() <= 1,
                "price {} drifted: {} vs {}",
                price,
                tick,
                round_trip
            );
        }
    }

    #[test]
    fn test_nearest_usable_tick() {
        assert_eq!(nearest_usable_tick(29, 10).unwrap(), 30);
        assert_eq!(nearest_usable_tick(-29, 10).unwrap(), -30);
        assert_eq!(nearest_usable_tick(0, 60).unwrap(), 0);
        // Near the bounds the result snaps to the nearest in-range multiple
        assert_eq!(nearest_usable_tick(MAX_TICK, 60).unwrap(), 887220);
        assert_eq!(nearest_usable_tick(MIN_TICK, 60).unwrap(), -887220);
        assert!(nearest_usable_tick(10, 0).is_err());
    }
}
