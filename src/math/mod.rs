//! Fixed-point math for concentrated-liquidity pools
//!
//! Everything that feeds an on-chain call lives in the integer domain:
//! U256 throughout, U512 for intermediates that can exceed 256 bits.
//! Floating point only appears at the human-price boundary (tick.rs) where
//! the reference protocol itself uses it.

use alloy_primitives::{U256, U512};
use eyre::{eyre, Result};

pub mod fees;
pub mod liquidity;
pub mod tick;

pub use fees::{fee_growth_inside, unclaimed_fees};
pub use liquidity::{
    amount0_for_amount1, amount1_for_amount0, liquidity_for_amounts, tokens_from_liquidity,
};
pub use tick::{
    nearest_usable_tick, price_to_sqrt_price_x96, price_to_tick, sqrt_price_x96_to_price,
    tick_to_price, tick_to_sqrt_price_x96, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK,
};

/// 2^96, the Q96 scaling factor
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);

/// Truncate a U512 to U256, erroring if the high limbs are set
fn u512_to_u256(value: U512) -> Result<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|&l| l != 0) {
        return Err(eyre!("512-bit intermediate does not fit in 256 bits"));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// floor(a * b / denominator) with a 512-bit intermediate
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(eyre!("mul_div division by zero"));
    }
    let product = U512::from(a) * U512::from(b);
    u512_to_u256(product / U512::from(denominator))
}

/// ceil(a * b / denominator) with a 512-bit intermediate
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(eyre!("mul_div division by zero"));
    }
    let product = U512::from(a) * U512::from(b);
    let denominator = U512::from(denominator);
    let mut quotient = product / denominator;
    if product % denominator != U512::ZERO {
        quotient += U512::from(1u8);
    }
    u512_to_u256(quotient)
}
