//! Configuration for the position scanner
//!
//! Loaded from environment variables (and a `.env` file) or from a TOML file.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::apps::nereus_finance;
use crate::contracts::{MAX_CALLS_PER_BATCH, MULTICALL3};
use crate::network::Network;

// ============================================
// ENTRIES
// ============================================

/// A market override: replaces the built-in provider of `app_id` on `network`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub app_id: String,
    pub network: String,
    pub provider_address: String,
}

/// A fixed USD price for an underlying asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub network: String,
    pub token: String,
    pub usd: f64,
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network name -> RPC URL. Networks without one are skipped.
    pub rpc_urls: BTreeMap<String, String>,

    /// Multicall3 deployment, same address on every supported network
    pub multicall_address: String,

    /// Larger batches are split into chunks pinned to one block
    pub max_calls_per_batch: usize,

    pub markets: Vec<MarketEntry>,

    pub prices: Vec<PriceEntry>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        for network in Network::ALL {
            if let Ok(url) = env::var(network.rpc_env_var()) {
                if !url.trim().is_empty() {
                    config.rpc_urls.insert(network.name().to_string(), url.trim().to_string());
                }
            }
        }

        if let Ok(address) = env::var("MULTICALL_ADDRESS") {
            config.multicall_address = address;
        }

        if let Ok(value) = env::var("MAX_CALLS_PER_BATCH") {
            config.max_calls_per_batch = value
                .parse()
                .map_err(|e| eyre!("Invalid MAX_CALLS_PER_BATCH '{}': {}", value, e))?;
        }

        if let Ok(address) = env::var("NEREUS_PROVIDER_ADDRESS") {
            config.markets.push(MarketEntry {
                app_id: nereus_finance::APP_ID.to_string(),
                network: Network::Avalanche.name().to_string(),
                provider_address: address,
            });
        }

        Ok(config)
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

    pub fn validate(&self) -> Result<()> {
        if self.rpc_urls.is_empty() {
            return Err(eyre!(
                "No RPC URL configured - set at least one of {}",
                Network::ALL.map(|n| n.rpc_env_var()).join(", ")
            ));
        }

        for (name, url) in &self.rpc_urls {
            Network::from_str(name)?;
            if url.trim().is_empty() || url.contains("YOUR_API_KEY") {
                return Err(eyre!("Invalid RPC URL for {}", name));
            }
        }

        self.multicall()?;

        if self.max_calls_per_batch == 0 {
            return Err(eyre!("max_calls_per_batch must be at least 1"));
        }

        for market in &self.markets {
            Network::from_str(&market.network)?;
            Address::from_str(&market.provider_address).map_err(|e| {
                eyre!(
                    "Invalid provider address '{}' for {}: {}",
                    market.provider_address,
                    market.app_id,
                    e
                )
            })?;
        }

        for price in &self.prices {
            Network::from_str(&price.network)?;
            Address::from_str(&price.token).map_err(|e| eyre!("Invalid price token '{}': {}", price.token, e))?;
        }

        Ok(())
    }

    pub fn multicall(&self) -> Result<Address> {
        Address::from_str(&self.multicall_address)
            .map_err(|e| eyre!("Invalid multicall address '{}': {}", self.multicall_address, e))
    }

    /// Networks with an RPC URL, in declaration order
    pub fn networks(&self) -> Vec<Network> {
        Network::ALL
            .into_iter()
            .filter(|n| self.rpc_urls.contains_key(n.name()))
            .collect()
    }

    /// RPC URLs keyed by network. Unknown network names are ignored here
    /// and rejected by `validate`.
    pub fn rpc_url_map(&self) -> HashMap<Network, String> {
        self.rpc_urls
            .iter()
            .filter_map(|(name, url)| Network::from_str(name).ok().map(|n| (n, url.clone())))
            .collect()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              LENDING POSITIONS - CONFIGURATION             ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ NETWORKS                                                   ║");
        for network in Network::ALL {
            let status = if self.rpc_urls.contains_key(network.name()) {
                "✓ Configured"
            } else {
                "✗ Not Set"
            };
            println!("║ • {:<16} {:^40} ║", network.name(), status);
        }
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ MULTICALL                                                  ║");
        println!("║ • Address: {:<47} ║", self.multicall_address);
        println!("║ • Max Calls/Batch: {:^40} ║", self.max_calls_per_batch);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ • Market Overrides: {:^39} ║", self.markets.len());
        println!("║ • Static Prices:    {:^39} ║", self.prices.len());
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: BTreeMap::new(),
            multicall_address: format!("{}", MULTICALL3),
            max_calls_per_batch: MAX_CALLS_PER_BATCH,
            markets: vec![],
            prices: vec![],
        }
    }
}

// ============================================
// TESTS
// ============================================
