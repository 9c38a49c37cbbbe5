//! Chain-query collaborator
//!
//! Point-in-time reads against a node: V2 amounts-out computed locally from
//! pair reserves, V3 quotes through the official QuoterV2 contract via
//! eth_call, pool snapshots, and the current block number. Everything behind
//! the `ChainQuery` trait so the engine can be tested against mocks.
//!
//! Pair addresses and token0 orderings are immutable per pool and cached
//! per instance to save an RPC call on repeat lookups.

use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::engine::v2::constant_product_out;

sol! {
    /// Uniswap V3 QuoterV2 interface
    #[derive(Debug)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );

        function quoteExactInput(bytes memory path, uint256 amountIn)
            external
            returns (
                uint256 amountOut,
                uint160[] memory sqrtPriceX96AfterList,
                uint32[] memory initializedTicksCrossedList,
                uint256 gasEstimate
            );
    }

    /// Uniswap V2 Factory interface
    #[derive(Debug)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    /// Uniswap V2 Pair interface
    #[derive(Debug)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (
            uint112 reserve0,
            uint112 reserve1,
            uint32 blockTimestampLast
        );
        function token0() external view returns (address);
    }

    /// Uniswap V3 Factory interface
    #[derive(Debug)]
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }

    /// Uniswap V3 Pool interface
    #[derive(Debug)]
    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96, int24 tick, uint16 observationIndex,
            uint16 observationCardinality, uint16 observationCardinalityNext,
            uint8 feeProtocol, bool unlocked
        );
        function liquidity() external view returns (uint128);
    }
}

/// A V3 quote: output amount plus the quoter's gas estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3Quote {
    pub amount_out: U256,
    pub gas_estimate: u64,
}

/// Point-in-time state of a V3 pool
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub pool: Address,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
}

/// Read-only chain collaborator consumed by the quote engine.
///
/// Every call is independently fallible; the engine tolerates any subset
/// failing. A V2 path with no pair reports `Ok(U256::ZERO)` (no liquidity),
/// while transport and decode failures surface as errors.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Output amount for swapping `amount_in` along a V2 token path
    async fn v2_amounts_out(&self, path: &[Address], amount_in: U256) -> Result<U256>;

    /// Single-hop V3 quote at one fee tier
    async fn v3_quote_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<V3Quote>;

    /// Multi-hop V3 quote along an encoded path (see [`crate::path`])
    async fn v3_quote_path(&self, path: &[u8], amount_in: U256) -> Result<V3Quote>;

    /// slot0 + liquidity snapshot of the V3 pool for a pair and fee tier
    async fn pool_snapshot(&self, token_a: Address, token_b: Address, fee: u32)
        -> Result<PoolSnapshot>;

    /// Current chain head
    async fn block_number(&self) -> Result<u64>;
}

/// `ChainQuery` over plain HTTP JSON-RPC
pub struct HttpChainQuery {
    rpc_url: String,
    v2_factory: Address,
    v3_factory: Address,
    quoter_v2: Address,
    // Immutable per pool, cached for the life of this instance
    pair_cache: RwLock<HashMap<(Address, Address), Address>>,
    token0_cache: RwLock<HashMap<Address, Address>>,
}

impl HttpChainQuery {
    pub fn new(
        rpc_url: String,
        v2_factory: Address,
        v3_factory: Address,
        quoter_v2: Address,
    ) -> Self {
        Self {
            rpc_url,
            v2_factory,
            v3_factory,
            quoter_v2,
            pair_cache: RwLock::new(HashMap::new()),
            token0_cache: RwLock::new(HashMap::new()),
        }
    }

    async fn call_contract(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let tx = TransactionRequest::default().to(to).input(calldata.into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| eyre!("eth_call failed: {}", e))?;

        Ok(result.to_vec())
    }

    /// Resolve the V2 pair for two tokens, Address::ZERO if none exists
    async fn get_pair(&self, token_a: Address, token_b: Address) -> Result<Address> {
        let key = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        if let Some(pair) = self.pair_cache.read().unwrap().get(&key) {
            return Ok(*pair);
        }

        let calldata = IUniswapV2Factory::getPairCall {
            tokenA: token_a,
            tokenB: token_b,
        }
        .abi_encode();
        let output = self.call_contract(self.v2_factory, calldata).await?;

        let pair = IUniswapV2Factory::getPairCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode getPair: {}", e))?;

        // A zero pair means "no pool"; not worth caching, the pool may be
        // created later
        if pair != Address::ZERO {
            self.pair_cache.write().unwrap().insert(key, pair);
            debug!("cached V2 pair {:?} for {:?}/{:?}", pair, token_a, token_b);
        }

        Ok(pair)
    }

    /// token0 of a pair (cached, immutable per pool)
    async fn get_token0(&self, pair: Address) -> Result<Address> {
        if let Some(token0) = self.token0_cache.read().unwrap().get(&pair) {
            return Ok(*token0);
        }

        let calldata = IUniswapV2Pair::token0Call {}.abi_encode();
        let output = self.call_contract(pair, calldata).await?;

        let token0 = IUniswapV2Pair::token0Call::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode token0: {}", e))?;

        self.token0_cache.write().unwrap().insert(pair, token0);

        Ok(token0)
    }

    /// Reserves of one hop, oriented so `.0` is the input-side reserve
    async fn oriented_reserves(&self, pair: Address, token_in: Address) -> Result<(U256, U256)> {
        let calldata = IUniswapV2Pair::getReservesCall {}.abi_encode();
        let output = self.call_contract(pair, calldata).await?;

        let reserves = IUniswapV2Pair::getReservesCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode reserves: {}", e))?;

        let token0 = self.get_token0(pair).await?;
        let r0: u128 = reserves.reserve0.to();
        let r1: u128 = reserves.reserve1.to();

        Ok(if token_in == token0 {
            (U256::from(r0), U256::from(r1))
        } else {
            (U256::from(r1), U256::from(r0))
        })
    }
}

#[async_trait]
impl ChainQuery for HttpChainQuery {
    async fn v2_amounts_out(&self, path: &[Address], amount_in: U256) -> Result<U256> {
        if path.len() < 2 {
            return Err(eyre!("V2 path needs at least two tokens"));
        }

        let mut amount = amount_in;
        for hop in path.windows(2) {
            let pair = self.get_pair(hop[0], hop[1]).await?;
            if pair == Address::ZERO {
                debug!("no V2 pair for {:?}/{:?}", hop[0], hop[1]);
                return Ok(U256::ZERO);
            }
            let (reserve_in, reserve_out) = self.oriented_reserves(pair, hop[0]).await?;
            amount = constant_product_out(amount, reserve_in, reserve_out);
            if amount.is_zero() {
                return Ok(U256::ZERO);
            }
        }

        Ok(amount)
    }

    async fn v3_quote_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<V3Quote> {
        debug!(
            "quoting V3 single hop {} -> {} at tier {}, amount {}",
            token_in, token_out, fee, amount_in
        );

        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: fee
                .try_into()
                .map_err(|_| eyre!("fee tier {} does not fit uint24", fee))?,
            sqrtPriceLimitX96: alloy_primitives::Uint::<160, 3>::ZERO,
        };
        let calldata = IQuoterV2::quoteExactInputSingleCall { params }.abi_encode();

        // The quoter reverts when the pool does not exist or cannot fill
        let output = self.call_contract(self.quoter_v2, calldata).await?;
        let decoded = IQuoterV2::quoteExactInputSingleCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode quoter output: {}", e))?;

        Ok(V3Quote {
            amount_out: decoded.amountOut,
            gas_estimate: decoded.gasEstimate.to(),
        })
    }

    async fn v3_quote_path(&self, path: &[u8], amount_in: U256) -> Result<V3Quote> {
        debug!(
            "quoting V3 path of {} bytes, amount {}",
            path.len(),
            amount_in
        );

        let calldata = IQuoterV2::quoteExactInputCall {
            path: path.to_vec().into(),
            amountIn: amount_in,
        }
        .abi_encode();

        let output = self.call_contract(self.quoter_v2, calldata).await?;
        let decoded = IQuoterV2::quoteExactInputCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode quoter output: {}", e))?;

        Ok(V3Quote {
            amount_out: decoded.amountOut,
            gas_estimate: decoded.gasEstimate.to(),
        })
    }

    async fn pool_snapshot(
        &self,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<PoolSnapshot> {
        let calldata = IUniswapV3Factory::getPoolCall {
            tokenA: token_a,
            tokenB: token_b,
            fee: fee
                .try_into()
                .map_err(|_| eyre!("fee tier {} does not fit uint24", fee))?,
        }
        .abi_encode();
        let output = self.call_contract(self.v3_factory, calldata).await?;
        let pool = IUniswapV3Factory::getPoolCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode getPool: {}", e))?;

        if pool == Address::ZERO {
            return Err(eyre!(
                "no V3 pool for {:?}/{:?} at tier {}",
                token_a,
                token_b,
                fee
            ));
        }

        let calldata = IUniswapV3Pool::slot0Call {}.abi_encode();
        let output = self.call_contract(pool, calldata).await?;
        let slot0 = IUniswapV3Pool::slot0Call::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode slot0: {}", e))?;

        let calldata = IUniswapV3Pool::liquidityCall {}.abi_encode();
        let output = self.call_contract(pool, calldata).await?;
        let liquidity = IUniswapV3Pool::liquidityCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode liquidity: {}", e))?;

        Ok(PoolSnapshot {
            pool,
            sqrt_price_x96: slot0.sqrtPriceX96.to::<U256>(),
            tick: slot0.tick.as_i32(),
            liquidity: liquidity.into(),
        })
    }

    async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        provider
            .get_block_number()
            .await
            .map_err(|e| eyre!("eth_blockNumber failed: {}", e))
    }
}
