//! waypoint - smart-routing quote CLI
//!
//! Run with: cargo run -- quote --input 0x... --output 0x... --amount 1000000000000000000

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint::{
    encode_path, math, ChainQuery, Config, EngineSettings, HttpChainQuery, Protocol, Quote,
    QuoteCache, QuoteEngine, QuoteError, SmartQuoteResult,
};

#[derive(Parser)]
#[command(name = "waypoint", about = "Multi-protocol swap quoting and smart routing")]
struct Cli {
    /// Load configuration from a TOML file instead of the environment
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Quote a swap across the enabled protocols
    Quote {
        /// Input token address
        #[arg(long)]
        input: String,
        /// Output token address
        #[arg(long)]
        output: String,
        /// Raw input amount as a decimal string
        #[arg(long)]
        amount: String,
        /// Skip the constant-product protocol
        #[arg(long)]
        no_v2: bool,
        /// Skip the concentrated-liquidity protocol
        #[arg(long)]
        no_v3: bool,
        /// Re-quote on an interval (seconds), tracking new blocks
        #[arg(long)]
        watch: Option<u64>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect a V3 pool's current price
    Pool {
        #[arg(long)]
        token0: String,
        #[arg(long)]
        token1: String,
        /// Fee tier in hundredths of a bip
        #[arg(long, default_value_t = 3000)]
        fee: u32,
        #[arg(long, default_value_t = 18)]
        decimals0: u8,
        #[arg(long, default_value_t = 18)]
        decimals1: u8,
    },
    /// Compute a position's constituent token amounts (offline)
    Position {
        #[arg(long)]
        liquidity: u128,
        #[arg(long)]
        current_tick: i32,
        #[arg(long)]
        lower_tick: i32,
        #[arg(long)]
        upper_tick: i32,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" waypoint - smart swap routing").cyan().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_quote(label: &str, quote: &Quote) {
    let path = quote
        .route
        .iter()
        .map(|h| match h.fee {
            Some(fee) => format!("{} -[{}@{}]-> {}", h.token_in, h.protocol, fee, h.token_out),
            None => format!("{} -[{}]-> {}", h.token_in, h.protocol, h.token_out),
        })
        .collect::<Vec<_>>()
        .join("\n           ");
    println!("  {} {} via {}", style(label).bold(), quote.amount_out, quote.protocol);
    println!("    route: {}", path);
    println!("    price impact: {:.3}%", quote.price_impact_pct);
    if let Some(gas) = quote.gas_estimate {
        println!("    gas estimate: {}", gas);
    }
    if quote.protocol == Protocol::V3 {
        let tokens: Vec<Address> = std::iter::once(quote.route[0].token_in)
            .chain(quote.route.iter().map(|h| h.token_out))
            .collect();
        let fees: Vec<u32> = quote.route.iter().filter_map(|h| h.fee).collect();
        if let Ok(encoded) = encode_path(&tokens, &fees) {
            println!("    encoded path: 0x{}", hex::encode(encoded));
        }
    }
}

fn print_result(result: &SmartQuoteResult) {
    println!("{}", style("Best route").green().bold());
    print_quote("out:", &result.best);
    for alt in &result.alternatives {
        println!();
        println!("{}", style("Fallback route").yellow());
        print_quote("out:", alt);
    }
    println!();
    println!("  captured at {}", result.captured_at.to_rfc3339());
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("waypoint=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    print_banner();

    let chain = Arc::new(HttpChainQuery::new(
        config.rpc_url.clone(),
        config.v2_factory_address()?,
        config.v3_factory_address()?,
        config.quoter_v2_address()?,
    ));

    match cli.command {
        Command::Quote {
            input,
            output,
            amount,
            no_v2,
            no_v3,
            watch,
            json,
        } => {
            let input = Address::from_str(&input)?;
            let output = Address::from_str(&output)?;

            let cache = Arc::new(QuoteCache::new());
            let sweeper = cache.spawn_sweeper(Duration::from_secs(config.cache_sweep_secs));
            let engine = QuoteEngine::new(
                chain.clone(),
                cache,
                EngineSettings {
                    intermediate: config.intermediate_address()?,
                    fee_tiers: config.fee_tiers.clone(),
                    debounce: Duration::from_millis(config.debounce_ms),
                    timeout: Duration::from_millis(config.quote_timeout_ms),
                },
            );

            loop {
                match engine.quote(input, output, &amount, !no_v2, !no_v3).await {
                    Ok(result) => {
                        if json {
                            println!("{}", serde_json::to_string_pretty(&result)?);
                        } else {
                            print_result(&result);
                        }
                    }
                    // A superseded request is not an error worth showing
                    Err(QuoteError::Cancelled) => debug!("quote superseded"),
                    Err(QuoteError::NoRoute) => {
                        println!("{}", style("No route available for this swap").red())
                    }
                    Err(e) => return Err(e.into()),
                }

                let Some(interval) = watch else { break };
                tokio::time::sleep(Duration::from_secs(interval)).await;
                match chain.block_number().await {
                    Ok(block) => engine.notify_new_block(block),
                    Err(e) => warn!("block poll failed: {}", e),
                }
                println!();
            }

            sweeper.abort();
        }

        Command::Pool {
            token0,
            token1,
            fee,
            decimals0,
            decimals1,
        } => {
            let token0 = Address::from_str(&token0)?;
            let token1 = Address::from_str(&token1)?;
            let snapshot = chain.pool_snapshot(token0, token1, fee).await?;

            let price =
                math::sqrt_price_x96_to_price(snapshot.sqrt_price_x96, decimals0, decimals1);
            println!("{}", style(format!("Pool {}", snapshot.pool)).green().bold());
            println!("  sqrtPriceX96: {}", snapshot.sqrt_price_x96);
            println!("  tick:         {}", snapshot.tick);
            println!("  liquidity:    {}", snapshot.liquidity);
            println!("  price:        {:.6} token1/token0", price);
        }

        Command::Position {
            liquidity,
            current_tick,
            lower_tick,
            upper_tick,
        } => {
            if lower_tick >= upper_tick {
                return Err(eyre::eyre!("lower tick must be below upper tick"));
            }
            let current = math::tick_to_sqrt_price_x96(current_tick)?;
            let lower = math::tick_to_sqrt_price_x96(lower_tick)?;
            let upper = math::tick_to_sqrt_price_x96(upper_tick)?;
            let (amount0, amount1) =
                math::tokens_from_liquidity(liquidity, current, lower, upper);

            println!("{}", style("Position").green().bold());
            println!("  liquidity: {}", liquidity);
            println!("  range:     [{}, {}]", lower_tick, upper_tick);
            println!("  amount0:   {}", amount0);
            println!("  amount1:   {}", amount1);
        }
    }

    Ok(())
}
