//! Block-aware quote cache
//!
//! Short-lived memoization in front of the quote engine. An entry is served
//! only while it is younger than the TTL and, when it recorded a block
//! number, while that block is not older than the last observed chain head.
//! Any newer block may have moved every price, so a head advance evicts all
//! entries quoted against older blocks.
//!
//! An explicit object, injected into the engine, so tests get isolated
//! instances. Uses `tokio::time::Instant` so paused-clock tests can drive
//! TTL expiry deterministically.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::engine::SmartQuoteResult;

/// How long a quote stays servable. Prices move every block; five seconds
/// is already generous.
pub const QUOTE_TTL: Duration = Duration::from_secs(5);

/// Full request signature. The amount is kept as its original decimal
/// string: parsing it would let two textually different amounts collide (or
/// one amount miss itself) through float representation drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub input: Address,
    pub output: Address,
    pub amount_in: String,
    pub v2_enabled: bool,
    pub v3_enabled: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: SmartQuoteResult,
    stored_at: Instant,
    block: Option<u64>,
}

/// Shared, process-wide quote cache
pub struct QuoteCache {
    entries: RwLock<HashMap<QuoteKey, CacheEntry>>,
    last_block: AtomicU64,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            last_block: AtomicU64::new(0),
        }
    }

    /// Look up a fresh entry; stale entries are evicted on the way out
    pub fn get(&self, key: &QuoteKey) -> Option<SmartQuoteResult> {
        let fresh = {
            let entries = self.entries.read().unwrap();
            let entry = entries.get(key)?;
            Self::is_fresh(entry, self.last_block.load(Ordering::Acquire))
        };

        if fresh {
            let entries = self.entries.read().unwrap();
            return entries.get(key).map(|e| e.result.clone());
        }

        debug!("evicting stale quote for {:?} -> {:?}", key.input, key.output);
        self.entries.write().unwrap().remove(key);
        None
    }

    pub fn set(&self, key: QuoteKey, result: SmartQuoteResult, block: Option<u64>) {
        self.entries.write().unwrap().insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
                block,
            },
        );
    }

    /// New chain head observed. When the head advances, every entry quoted
    /// against an older block is evicted; entries without a recorded block
    /// ride out their TTL.
    pub fn on_new_block(&self, block: u64) {
        let last = self.last_block.load(Ordering::Acquire);
        if block > last {
            let mut entries = self.entries.write().unwrap();
            let before = entries.len();
            entries.retain(|_, e| e.block.map_or(true, |b| b >= block));
            let evicted = before - entries.len();
            if evicted > 0 {
                debug!("block {}: evicted {} stale quotes", block, evicted);
            }
        }
        self.last_block.fetch_max(block, Ordering::AcqRel);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drop TTL-expired entries. Lookups already evict lazily; this keeps
    /// the map from accumulating entries nobody asks for again.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .write()
            .unwrap()
            .retain(|_, e| now.duration_since(e.stored_at) < QUOTE_TTL);
    }

    /// Background task sweeping expired entries at a fixed interval
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        })
    }

    fn is_fresh(entry: &CacheEntry, last_block: u64) -> bool {
        if Instant::now().duration_since(entry.stored_at) >= QUOTE_TTL {
            return false;
        }
        match entry.block {
            Some(block) => block >= last_block,
            None => true,
        }
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Protocol, Quote, SmartQuoteResult};
    use alloy_primitives::{address, U256};
    use chrono::Utc;

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

    fn key() -> QuoteKey {
        QuoteKey {
            input: WETH,
            output: USDC,
            amount_in: "1000000000000000000".to_string(),
            v2_enabled: true,
            v3_enabled: true,
        }
    }

    fn result(amount_out: u64) -> SmartQuoteResult {
        let best = Quote {
            protocol: Protocol::V3,
            amount_out: U256::from(amount_out),
            route: vec![],
            price_impact_pct: 0.1,
            gas_estimate: Some(120_000),
        };
        SmartQuoteResult {
            best,
            v2: None,
            v3: None,
            alternatives: vec![],
            captured_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_returns_same_result() {
        let cache = QuoteCache::new();
        let stored = result(42);
        cache.set(key(), stored.clone(), Some(100));
        let hit = cache.get(&key()).expect("expected a hit");
        assert_eq!(hit, stored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), None);
        assert!(cache.get(&key()).is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.get(&key()).is_none());
        // Evicted on lookup, not just hidden
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_ttl_still_fresh() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), None);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get(&key()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_block_evicts_older_entries() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), Some(100));

        cache.on_new_block(101);
        // Within the TTL window, but quoted against a stale block
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_block_entry_survives() {
        let cache = QuoteCache::new();
        cache.on_new_block(100);
        cache.set(key(), result(1), Some(100));

        cache.on_new_block(100);
        assert!(cache.get(&key()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blockless_entry_survives_new_block() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), None);
        cache.on_new_block(5000);
        assert!(cache.get(&key()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_block_does_not_regress() {
        let cache = QuoteCache::new();
        cache.on_new_block(200);
        cache.set(key(), result(1), Some(200));

        // A lagging notification must not re-validate anything
        cache.on_new_block(150);
        assert!(cache.get(&key()).is_some());
        cache.on_new_block(201);
        assert!(cache.get(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_includes_protocol_flags() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), None);

        let mut other = key();
        other.v2_enabled = false;
        assert!(cache.get(&other).is_none());

        let mut other = key();
        other.amount_in = "1000000000000000001".to_string();
        assert!(cache.get(&other).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired() {
        let cache = Arc::new(QuoteCache::new());
        cache.set(key(), result(1), None);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.len(), 1); // not yet swept
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_runs_periodically() {
        let cache = Arc::new(QuoteCache::new());
        cache.set(key(), result(1), None);

        let handle = cache.spawn_sweeper(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert!(cache.is_empty());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let cache = QuoteCache::new();
        cache.set(key(), result(1), Some(1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
