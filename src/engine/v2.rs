//! Constant-product protocol query
//!
//! Tries the direct pair and a three-token path through the configured
//! intermediate asset, keeps whichever yields the larger output, and
//! estimates price impact with the half-amount probe.

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::chain::ChainQuery;
use crate::engine::{half_probe_impact, Hop, Protocol, Quote};
use crate::error::QuoteError;

/// Flat per-hop gas figure for a V2 swap
pub const V2_HOP_GAS: u64 = 100_000;

/// Constant-product output with the 0.3% fee:
/// amountOut = (amountIn * 997 * reserveOut) / (reserveIn * 1000 + amountIn * 997)
pub fn constant_product_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    let amount_in_with_fee = amount_in * U256::from(997u64);
    let numerator = amount_in_with_fee * reserve_out;
    let denominator = reserve_in * U256::from(1000u64) + amount_in_with_fee;
    if denominator.is_zero() {
        return U256::ZERO;
    }
    numerator / denominator
}

/// Best constant-product quote for a swap, or why there is none.
///
/// Each candidate path fails independently; a remote error on one path
/// still lets the other win. Only when no path produced a positive output
/// does the whole protocol report `NoLiquidity` / `Remote`.
pub async fn query(
    chain: &dyn ChainQuery,
    input: Address,
    output: Address,
    intermediate: Address,
    amount_in: U256,
) -> Result<Quote, QuoteError> {
    let mut candidates: Vec<Vec<Address>> = vec![vec![input, output]];
    if input != intermediate && output != intermediate {
        candidates.push(vec![input, intermediate, output]);
    }

    let mut best: Option<(Vec<Address>, U256)> = None;
    let mut remote_failure: Option<String> = None;

    for path in candidates {
        match chain.v2_amounts_out(&path, amount_in).await {
            Ok(out) if !out.is_zero() => {
                if best.as_ref().map_or(true, |(_, b)| out > *b) {
                    best = Some((path, out));
                }
            }
            Ok(_) => {
                debug!("V2 path of {} tokens has no liquidity", path.len());
            }
            Err(e) => {
                debug!("V2 path query failed: {}", e);
                remote_failure = Some(e.to_string());
            }
        }
    }

    let (path, amount_out) = best.ok_or_else(|| match remote_failure {
        Some(reason) => QuoteError::Remote(reason),
        None => QuoteError::NoLiquidity,
    })?;

    // Half-amount probe: a linear market stays at zero impact; real depth
    // shows up as the full amount underperforming twice the half amount
    let half = amount_in / U256::from(2u64);
    let impact = match chain.v2_amounts_out(&path, half).await {
        Ok(half_out) if !half_out.is_zero() => half_probe_impact(half_out, amount_out),
        _ => {
            debug!("V2 impact probe failed; reporting worst case");
            100.0
        }
    };

    let hops = path.len() as u64 - 1;
    Ok(Quote {
        protocol: Protocol::V2,
        amount_out,
        route: route_from_path(&path),
        price_impact_pct: impact,
        gas_estimate: Some(V2_HOP_GAS * hops),
    })
}

fn route_from_path(path: &[Address]) -> Vec<Hop> {
    path.windows(2)
        .map(|pair| Hop {
            token_in: pair[0],
            token_out: pair[1],
            protocol: Protocol::V2,
            fee: None,
        })
        .collect()
}
