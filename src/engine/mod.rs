//! Multi-protocol quote engine
//!
//! Queries the constant-product and concentrated-liquidity protocols
//! concurrently for a requested swap, isolates their failures, and picks
//! the best route by output. The loser is kept as an alternative so the
//! execution layer can fall back if the chosen route reverts on chain.
//!
//! Requests are debounced and superseded by newer ones: a generation
//! counter makes in-flight results from stale requests resolve to
//! `Cancelled` instead of overwriting newer state or the cache.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{QuoteCache, QuoteKey};
use crate::chain::ChainQuery;
use crate::error::QuoteError;
use crate::math::tick::u256_to_f64;

pub mod v2;
pub mod v3;

/// Which protocol variant a quote or hop belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    V2,
    V3,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::V2 => write!(f, "V2"),
            Protocol::V3 => write!(f, "V3"),
        }
    }
}

/// One leg of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub token_in: Address,
    pub token_out: Address,
    pub protocol: Protocol,
    /// Fee tier for concentrated-liquidity hops; V2 pools have a fixed fee
    pub fee: Option<u32>,
}

/// Ordered sequence of hops; each hop's output token feeds the next
pub type Route = Vec<Hop>;

/// A priced route through one protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub protocol: Protocol,
    pub amount_out: U256,
    pub route: Route,
    pub price_impact_pct: f64,
    pub gas_estimate: Option<u64>,
}

/// The engine's answer: the best quote, the per-protocol quotes that
/// competed, and the losers as execution-time fallbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartQuoteResult {
    pub best: Quote,
    pub v2: Option<Quote>,
    pub v3: Option<Quote>,
    pub alternatives: Vec<Quote>,
    pub captured_at: DateTime<Utc>,
}

/// Price impact from the half-amount probe.
///
/// On a linear (infinitely deep) market the full amount returns exactly
/// twice the half amount; the shortfall against that extrapolation is the
/// impact. This heuristic is what downstream warning thresholds are tuned
/// against; it is deliberately not a closed-form derivative.
pub(crate) fn half_probe_impact(half_out: U256, actual_out: U256) -> f64 {
    let expected = half_out * U256::from(2u64);
    if expected.is_zero() {
        return 0.0;
    }
    let diff = if expected > actual_out {
        expected - actual_out
    } else {
        actual_out - expected
    };
    u256_to_f64(diff) / u256_to_f64(expected) * 100.0
}

/// Tunables for one engine instance
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Asset multi-hop paths route through (typically the wrapped native)
    pub intermediate: Address,
    /// Fee tiers to sweep on the concentrated-liquidity protocol
    pub fee_tiers: Vec<u32>,
    /// Burst suppression before any remote call is made
    pub debounce: Duration,
    /// Per-protocol query deadline
    pub timeout: Duration,
}

/// Multi-protocol smart-routing engine
pub struct QuoteEngine {
    chain: Arc<dyn ChainQuery>,
    cache: Arc<QuoteCache>,
    settings: EngineSettings,
    generation: AtomicU64,
}

impl QuoteEngine {
    pub fn new(chain: Arc<dyn ChainQuery>, cache: Arc<QuoteCache>, settings: EngineSettings) -> Self {
        Self {
            chain,
            cache,
            settings,
            generation: AtomicU64::new(0),
        }
    }

    /// Quote a swap across the enabled protocols.
    ///
    /// `amount_in` is the raw input amount as a decimal string; it doubles
    /// as part of the cache key, so textual identity is exact identity.
    pub async fn quote(
        &self,
        input: Address,
        output: Address,
        amount_in: &str,
        v2_enabled: bool,
        v3_enabled: bool,
    ) -> Result<SmartQuoteResult, QuoteError> {
        // Fail fast, before any remote call
        if input == output {
            return Err(QuoteError::InvalidInput(
                "input and output asset are the same".to_string(),
            ));
        }
        if !v2_enabled && !v3_enabled {
            return Err(QuoteError::InvalidInput(
                "every protocol is disabled".to_string(),
            ));
        }
        let amount = U256::from_str(amount_in.trim())
            .map_err(|_| QuoteError::InvalidInput(format!("bad amount {:?}", amount_in)))?;
        if amount.is_zero() {
            return Err(QuoteError::InvalidInput("amount must be positive".to_string()));
        }

        // This request supersedes every in-flight one
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.settings.debounce.is_zero() {
            tokio::time::sleep(self.settings.debounce).await;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("request superseded during debounce");
                return Err(QuoteError::Cancelled);
            }
        }

        let key = QuoteKey {
            input,
            output,
            amount_in: amount_in.trim().to_string(),
            v2_enabled,
            v3_enabled,
        };
        if let Some(hit) = self.cache.get(&key) {
            debug!("quote served from cache");
            return Ok(hit);
        }

        let block = self.chain.block_number().await.ok();
        if let Some(block) = block {
            self.cache.on_new_block(block);
        }

        // Both protocols run concurrently; neither can cancel or corrupt
        // the other
        let v2_task = async {
            if !v2_enabled {
                return None;
            }
            Some(self.with_timeout(v2::query(
                self.chain.as_ref(),
                input,
                output,
                self.settings.intermediate,
                amount,
            ))
            .await)
        };
        let v3_task = async {
            if !v3_enabled {
                return None;
            }
            Some(self.with_timeout(v3::query(
                self.chain.as_ref(),
                input,
                output,
                self.settings.intermediate,
                &self.settings.fee_tiers,
                amount,
            ))
            .await)
        };
        let (v2_outcome, v3_outcome) = tokio::join!(v2_task, v3_task);

        let v2_quote = settle(Protocol::V2, v2_outcome);
        let v3_quote = settle(Protocol::V3, v3_outcome);

        // Strictly larger output wins; the loser stays as a fallback route
        let (best, alternatives) = match (&v2_quote, &v3_quote) {
            (Some(v2), Some(v3)) => {
                if v3.amount_out > v2.amount_out {
                    (v3.clone(), vec![v2.clone()])
                } else {
                    (v2.clone(), vec![v3.clone()])
                }
            }
            (Some(v2), None) => (v2.clone(), vec![]),
            (None, Some(v3)) => (v3.clone(), vec![]),
            (None, None) => return Err(QuoteError::NoRoute),
        };

        let result = SmartQuoteResult {
            best,
            v2: v2_quote,
            v3: v3_quote,
            alternatives,
            captured_at: Utc::now(),
        };

        // A superseded request must never write newer state
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("request superseded after settlement; result discarded");
            return Err(QuoteError::Cancelled);
        }

        info!(
            "best route: {} out {} (impact {:.3}%)",
            result.best.protocol, result.best.amount_out, result.best.price_impact_pct
        );
        self.cache.set(key, result.clone(), block);
        Ok(result)
    }

    /// Forward an observed chain head to the cache
    pub fn notify_new_block(&self, block: u64) {
        self.cache.on_new_block(block);
    }

    async fn with_timeout(
        &self,
        query: impl std::future::Future<Output = Result<Quote, QuoteError>>,
    ) -> Result<Quote, QuoteError> {
        match tokio::time::timeout(self.settings.timeout, query).await {
            Ok(outcome) => outcome,
            Err(_) => Err(QuoteError::Remote("protocol query timed out".to_string())),
        }
    }
}

/// Collapse one protocol's outcome, logging failures without propagating
fn settle(protocol: Protocol, outcome: Option<Result<Quote, QuoteError>>) -> Option<Quote> {
    match outcome? {
        Ok(quote) => Some(quote),
        Err(QuoteError::NoLiquidity) => {
            debug!("{} has no liquidity for this swap", protocol);
            None
        }
        Err(e) => {
            warn!("{} query failed: {}", protocol, e);
            None
        }
    }
}
