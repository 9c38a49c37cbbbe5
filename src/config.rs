//! Runtime configuration
//!
//! Loaded from environment variables (with a `.env` file via dotenvy) or
//! from a TOML file. Addresses are kept as strings in the struct so both
//! sources serialize the same way; typed accessors parse on demand.

use alloy_primitives::Address;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Main configuration for the quoting service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// Primary RPC URL (Alchemy/Infura recommended)
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    // ========== Routing Settings ==========
    /// Asset multi-hop paths route through (WETH on mainnet)
    pub intermediate_token: String,

    /// Uniswap V2 factory address
    pub v2_factory: String,

    /// Uniswap V3 factory address
    pub v3_factory: String,

    /// Uniswap V3 QuoterV2 address
    pub quoter_v2: String,

    /// Fee tiers to sweep on V3, in hundredths of a bip
    pub fee_tiers: Vec<u32>,

    // ========== Engine Timing ==========
    /// Burst suppression before a quote request starts querying (ms)
    pub debounce_ms: u64,

    /// Per-protocol query deadline (ms)
    pub quote_timeout_ms: u64,

    /// Interval of the cache's expired-entry sweep (seconds)
    pub cache_sweep_secs: u64,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| "https://eth.llamarpc.com".to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            intermediate_token: env::var("INTERMEDIATE_TOKEN")
                .unwrap_or_else(|_| Self::default_intermediate().to_string()),
            v2_factory: env::var("V2_FACTORY")
                .unwrap_or_else(|_| Self::default_v2_factory().to_string()),
            v3_factory: env::var("V3_FACTORY")
                .unwrap_or_else(|_| Self::default_v3_factory().to_string()),
            quoter_v2: env::var("QUOTER_V2")
                .unwrap_or_else(|_| Self::default_quoter_v2().to_string()),
            fee_tiers: env::var("FEE_TIERS")
                .map(|s| {
                    s.split(',')
                        .filter_map(|t| t.trim().parse().ok())
                        .collect()
                })
                .unwrap_or_else(|_| Self::default_fee_tiers()),
            debounce_ms: env::var("DEBOUNCE_MS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            quote_timeout_ms: env::var("QUOTE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            cache_sweep_secs: env::var("CACHE_SWEEP_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn default_intermediate() -> &'static str {
        // WETH
        "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
    }

    fn default_v2_factory() -> &'static str {
        "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"
    }

    fn default_v3_factory() -> &'static str {
        "0x1F98431c8aD98523631AE4a59f267346ea31F984"
    }

    fn default_quoter_v2() -> &'static str {
        "0x61fFE014bA17989E743c5F6cB21bF9697530B21e"
    }

    fn default_fee_tiers() -> Vec<u32> {
        vec![100, 500, 3000, 10000]
    }

    pub fn intermediate_address(&self) -> Result<Address> {
        Ok(Address::from_str(&self.intermediate_token)?)
    }

    pub fn v2_factory_address(&self) -> Result<Address> {
        Ok(Address::from_str(&self.v2_factory)?)
    }

    pub fn v3_factory_address(&self) -> Result<Address> {
        Ok(Address::from_str(&self.v3_factory)?)
    }

    pub fn quoter_v2_address(&self) -> Result<Address> {
        Ok(Address::from_str(&self.quoter_v2)?)
    }

    /// Validate configuration before starting
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!(
                "Invalid RPC_URL - please set a valid Alchemy/Infura URL"
            ));
        }

        self.intermediate_address()?;
        self.v2_factory_address()?;
        self.v3_factory_address()?;
        self.quoter_v2_address()?;

        if self.fee_tiers.is_empty() {
            return Err(eyre::eyre!("FEE_TIERS must name at least one tier"));
        }
        if let Some(tier) = self.fee_tiers.iter().find(|t| **t >= 1 << 24) {
            return Err(eyre::eyre!("fee tier {} does not fit in 24 bits", tier));
        }

        if self.quote_timeout_ms == 0 {
            return Err(eyre::eyre!("QUOTE_TIMEOUT_MS must be positive"));
        }
        if self.debounce_ms >= self.quote_timeout_ms {
            return Err(eyre::eyre!(
                "DEBOUNCE_MS ({}) should be well below QUOTE_TIMEOUT_MS ({})",
                self.debounce_ms,
                self.quote_timeout_ms
            ));
        }
        if self.cache_sweep_secs == 0 {
            return Err(eyre::eyre!("CACHE_SWEEP_SECS must be positive"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://eth.llamarpc.com".to_string(),
            chain_id: 1,
            intermediate_token: Self::default_intermediate().to_string(),
            v2_factory: Self::default_v2_factory().to_string(),
            v3_factory: Self::default_v3_factory().to_string(),
            quoter_v2: Self::default_quoter_v2().to_string(),
            fee_tiers: Self::default_fee_tiers(),
            debounce_ms: 300,
            quote_timeout_ms: 5000,
            cache_sweep_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fee_tiers, vec![100, 500, 3000, 10000]);
    }

    #[test]
    fn test_addresses_parse() {
        let config = Config::default();
        assert!(config.intermediate_address().is_ok());
        assert!(config.v2_factory_address().is_ok());
        assert!(config.v3_factory_address().is_ok());
        assert!(config.quoter_v2_address().is_ok());
    }

    #[test]
    fn test_bad_address_rejected() {
        let config = Config {
            quoter_v2: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_fee_tiers_rejected() {
        let config = Config {
            fee_tiers: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_fee_tier_rejected() {
        let config = Config {
            fee_tiers: vec![500, 1 << 24],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debounce_must_stay_below_timeout() {
        let config = Config {
            debounce_ms: 6000,
            quote_timeout_ms: 5000,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back.rpc_url, config.rpc_url);
        assert_eq!(back.fee_tiers, config.fee_tiers);
    }
}
