//! waypoint - multi-protocol swap quoting and smart routing
//!
//! Quotes a requested token swap across Uniswap V2 (constant product) and
//! Uniswap V3 (concentrated liquidity) concurrently, picks the best route,
//! and caches results per block. The fixed-point price/tick math, liquidity
//! conversions, fee accounting, and path codec are exposed as pure
//! functions; chain reads go through the injectable [`ChainQuery`] trait.

pub mod cache;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod math;
pub mod path;

pub use cache::{QuoteCache, QuoteKey, QUOTE_TTL};
pub use chain::{ChainQuery, HttpChainQuery, PoolSnapshot, V3Quote};
pub use config::Config;
pub use engine::{EngineSettings, Hop, Protocol, Quote, QuoteEngine, Route, SmartQuoteResult};
pub use error::QuoteError;
pub use math::{
    fee_growth_inside, liquidity_for_amounts, nearest_usable_tick, price_to_sqrt_price_x96,
    price_to_tick, sqrt_price_x96_to_price, tick_to_price, tick_to_sqrt_price_x96,
    tokens_from_liquidity, unclaimed_fees,
};
pub use path::{decode_path, encode_path};
