//! Multi-hop path encoding for concentrated-liquidity quoters
//!
//! The quoter and router contracts take a packed byte path: a 20-byte token
//! address, a 3-byte big-endian fee tier, alternating, ending on a token
//! address with no separators. `decode_path(encode_path(a, f)) == (a, f)`
//! for every valid input.

use alloy_primitives::Address;
use eyre::{eyre, Result};

const ADDR_LEN: usize = 20;
const FEE_LEN: usize = 3;
const HOP_LEN: usize = ADDR_LEN + FEE_LEN;

/// Encode a token/fee route into the packed path format.
///
/// Requires exactly one more token than fees; fee tiers must fit 24 bits.
pub fn encode_path(tokens: &[Address], fees: &[u32]) -> Result<Vec<u8>> {
    if tokens.is_empty() || tokens.len() != fees.len() + 1 {
        return Err(eyre!(
            "path needs fees.len() + 1 tokens, got {} tokens and {} fees",
            tokens.len(),
            fees.len()
        ));
    }
    if let Some(fee) = fees.iter().find(|f| **f >= 1 << 24) {
        return Err(eyre!("fee tier {} does not fit in 24 bits", fee));
    }

    let mut path = Vec::with_capacity(tokens.len() * ADDR_LEN + fees.len() * FEE_LEN);
    for (token, fee) in tokens.iter().zip(fees.iter()) {
        path.extend_from_slice(token.as_slice());
        path.extend_from_slice(&fee.to_be_bytes()[1..]);
    }
    path.extend_from_slice(tokens[tokens.len() - 1].as_slice());
    Ok(path)
}

/// Decode a packed path back into its tokens and fee tiers
pub fn decode_path(path: &[u8]) -> Result<(Vec<Address>, Vec<u32>)> {
    if path.len() < ADDR_LEN || (path.len() - ADDR_LEN) % HOP_LEN != 0 {
        return Err(eyre!("malformed path of {} bytes", path.len()));
    }

    let hops = (path.len() - ADDR_LEN) / HOP_LEN;
    let mut tokens = Vec::with_capacity(hops + 1);
    let mut fees = Vec::with_capacity(hops);

    let mut offset = 0;
    for _ in 0..hops {
        tokens.push(Address::from_slice(&path[offset..offset + ADDR_LEN]));
        offset += ADDR_LEN;
        let fee = u32::from_be_bytes([
            0,
            path[offset],
            path[offset + 1],
            path[offset + 2],
        ]);
        fees.push(fee);
        offset += FEE_LEN;
    }
    tokens.push(Address::from_slice(&path[offset..]));

    Ok((tokens, fees))
}
