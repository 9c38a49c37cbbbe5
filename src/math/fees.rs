//! Uncollected-fee accounting from fee-growth accumulators
//!
//! Fee growth counters are 256-bit accumulators that wrap on overflow, and
//! the below/above decomposition deliberately produces "negative" wrapped
//! intermediates. Every subtraction here uses wraparound semantics; checked
//! arithmetic would diverge from on-chain accounting near the boundary.

use alloy_primitives::{U256, U512};

/// Fee growth accumulated inside a tick range, per unit of liquidity.
///
/// Reference decomposition: growth below the range, growth above it, and
/// `inside = global - below - above`, all mod 2^256.
pub fn fee_growth_inside(
    global: U256,
    outside_lower: U256,
    outside_upper: U256,
    current_tick: i32,
    lower: i32,
    upper: i32,
) -> U256 {
    let below = if current_tick >= lower {
        outside_lower
    } else {
        global.wrapping_sub(outside_lower)
    };
    let above = if current_tick < upper {
        outside_upper
    } else {
        global.wrapping_sub(outside_upper)
    };
    global.wrapping_sub(below).wrapping_sub(above)
}

/// Fees owed to a position: snapshot plus growth since the last poke.
///
/// `owed = snapshot + floor(liquidity * ((inside_current - inside_last)
/// mod 2^256) / 2^128)`. Zero-liquidity positions never accrue beyond their
/// snapshot.
pub fn unclaimed_fees(
    liquidity: u128,
    inside_current: U256,
    inside_last: U256,
    owed_snapshot: U256,
) -> U256 {
    if liquidity == 0 {
        return owed_snapshot;
    }
    let delta = inside_current.wrapping_sub(inside_last);
    // delta < 2^256 and liquidity < 2^128, so the shifted product fits U256
    let accrued: U512 = (U512::from(delta) * U512::from(liquidity)) >> 128;
    let limbs = accrued.as_limbs();
    let accrued = U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]);
    owed_snapshot.wrapping_add(accrued)
}
