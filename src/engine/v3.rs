//! Concentrated-liquidity protocol query
//!
//! Sweeps every configured fee tier for a single-hop quote, and when neither
//! endpoint is the intermediate asset also tries every tier pair as a
//! two-hop encoded path through it. Best output wins; price impact comes
//! from the half-amount probe (re-running the encoded path at half size for
//! multi-hop candidates).

use alloy_primitives::{Address, U256};
use futures::future::join_all;
use tracing::debug;

use crate::chain::{ChainQuery, V3Quote};
use crate::engine::{half_probe_impact, Hop, Protocol, Quote};
use crate::error::QuoteError;
use crate::path::encode_path;

/// One candidate route through the tier sweep
#[derive(Debug, Clone)]
enum Candidate {
    Single { fee: u32 },
    TwoHop { fee_first: u32, fee_second: u32 },
}

/// Best concentrated-liquidity quote for a swap, or why there is none
pub async fn query(
    chain: &dyn ChainQuery,
    input: Address,
    output: Address,
    intermediate: Address,
    fee_tiers: &[u32],
    amount_in: U256,
) -> Result<Quote, QuoteError> {
    let mut candidates: Vec<Candidate> = fee_tiers
        .iter()
        .map(|&fee| Candidate::Single { fee })
        .collect();
    if input != intermediate && output != intermediate {
        for &fee_first in fee_tiers {
            for &fee_second in fee_tiers {
                candidates.push(Candidate::TwoHop {
                    fee_first,
                    fee_second,
                });
            }
        }
    }

    // All probes are independent reads; fire them together
    let quotes = join_all(candidates.iter().map(|candidate| {
        run_candidate(chain, input, output, intermediate, candidate, amount_in)
    }))
    .await;

    let mut best: Option<(Candidate, V3Quote)> = None;
    let mut remote_failure: Option<String> = None;

    for (candidate, outcome) in candidates.into_iter().zip(quotes) {
        match outcome {
            Ok(quote) if !quote.amount_out.is_zero() => {
                if best
                    .as_ref()
                    .map_or(true, |(_, b)| quote.amount_out > b.amount_out)
                {
                    best = Some((candidate, quote));
                }
            }
            Ok(_) => {
                debug!("V3 candidate {:?} quoted zero output", candidate);
            }
            Err(e) => {
                // The quoter reverts for nonexistent pools; treat any error
                // as this tier being unavailable and move on
                debug!("V3 candidate {:?} failed: {}", candidate, e);
                remote_failure = Some(e.to_string());
            }
        }
    }

    let (candidate, quote) = best.ok_or_else(|| match remote_failure {
        Some(reason) => QuoteError::Remote(reason),
        None => QuoteError::NoLiquidity,
    })?;

    let half = amount_in / U256::from(2u64);
    let impact = match run_candidate(chain, input, output, intermediate, &candidate, half).await {
        Ok(probe) if !probe.amount_out.is_zero() => {
            half_probe_impact(probe.amount_out, quote.amount_out)
        }
        _ => {
            debug!("V3 impact probe failed; reporting worst case");
            100.0
        }
    };

    Ok(Quote {
        protocol: Protocol::V3,
        amount_out: quote.amount_out,
        route: route_for(input, output, intermediate, &candidate),
        price_impact_pct: impact,
        gas_estimate: Some(quote.gas_estimate),
    })
}

async fn run_candidate(
    chain: &dyn ChainQuery,
    input: Address,
    output: Address,
    intermediate: Address,
    candidate: &Candidate,
    amount_in: U256,
) -> eyre::Result<V3Quote> {
    match candidate {
        Candidate::Single { fee } => chain.v3_quote_single(input, output, *fee, amount_in).await,
        Candidate::TwoHop {
            fee_first,
            fee_second,
        } => {
            let path = encode_path(&[input, intermediate, output], &[*fee_first, *fee_second])?;
            chain.v3_quote_path(&path, amount_in).await
        }
    }
}

fn route_for(
    input: Address,
    output: Address,
    intermediate: Address,
    candidate: &Candidate,
) -> Vec<Hop> {
    match candidate {
        Candidate::Single { fee } => vec![Hop {
            token_in: input,
            token_out: output,
            protocol: Protocol::V3,
            fee: Some(*fee),
        }],
        Candidate::TwoHop {
            fee_first,
            fee_second,
        } => vec![
            Hop {
                token_in: input,
                token_out: intermediate,
                protocol: Protocol::V3,
                fee: Some(*fee_first),
            },
            Hop {
                token_in: intermediate,
                token_out: output,
                protocol: Protocol::V3,
                fee: Some(*fee_second),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::PoolSnapshot;
    use crate::path::decode_path;
    use alloy_primitives::address;
    use async_trait::async_trait;
    use eyre::eyre;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const DAI: Address = address!("6B175474E89094C44Da98b954EedcdeCB5BE3830");

    /// Single-hop output scales with the fee tier; two-hop output is a
    /// fixed mediocre amount so the sweep must prefer the right tier
    #[derive(Default)]
    struct TierMock {
        path_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainQuery for TierMock {
        async fn v2_amounts_out(&self, _path: &[Address], _amount_in: U256) -> eyre::Result<U256> {
            Err(eyre!("not used"))
        }

        async fn v3_quote_single(
            &self,
            _token_in: Address,
            _token_out: Address,
            fee: u32,
            _amount_in: U256,
        ) -> eyre::Result<V3Quote> {
            Ok(V3Quote {
                amount_out: U256::from(fee as u64 * 10),
                gas_estimate: 120_000,
            })
        }

        async fn v3_quote_path(&self, path: &[u8], _amount_in: U256) -> eyre::Result<V3Quote> {
            self.path_calls.fetch_add(1, Ordering::SeqCst);
            // A malformed path here means the sweep built a bad route
            decode_path(path)?;
            Ok(V3Quote {
                amount_out: U256::from(100u64),
                gas_estimate: 200_000,
            })
        }

        async fn pool_snapshot(
            &self,
            _token_a: Address,
            _token_b: Address,
            _fee: u32,
        ) -> eyre::Result<PoolSnapshot> {
            Err(eyre!("not used"))
        }

        async fn block_number(&self) -> eyre::Result<u64> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_best_fee_tier_wins() {
        let chain = TierMock::default();
        let quote = query(&chain, WETH, USDC, DAI, &[500, 3000, 10000], U256::from(1000u64))
            .await
            .unwrap();

        assert_eq!(quote.amount_out, U256::from(100_000u64));
        assert_eq!(quote.route.len(), 1);
        assert_eq!(quote.route[0].fee, Some(10000));
        // Every (tier, tier) pair was probed, plus one half-amount probe
        // would also be single-hop here
        assert_eq!(chain.path_calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_no_two_hop_through_an_endpoint() {
        // Output IS the intermediate asset: only single hops make sense
        let chain = TierMock::default();
        let quote = query(&chain, WETH, DAI, DAI, &[500, 3000], U256::from(1000u64))
            .await
            .unwrap();

        assert_eq!(quote.route.len(), 1);
        assert_eq!(chain.path_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_tiers_means_no_liquidity() {
        let chain = TierMock::default();
        let err = query(&chain, WETH, DAI, DAI, &[], U256::from(1000u64))
            .await
            .unwrap_err();
        assert_eq!(err, QuoteError::NoLiquidity);
    }
}
