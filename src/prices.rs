//! Price resolution
//!
//! Prices are an external concern. The pipeline only needs a USD price per
//! underlying asset; anything able to answer that can sit behind
//! [`PriceSource`].

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::Config;
use crate::network::Network;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price of one whole `token`, `None` when unknown
    async fn price(&self, network: Network, token: Address) -> Option<f64>;
}

/// Fixed price table, loaded from config
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    prices: HashMap<(Network, Address), f64>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, network: Network, token: Address, usd: f64) -> Self {
        self.insert(network, token, usd);
        self
    }

    pub fn insert(&mut self, network: Network, token: Address, usd: f64) {
        self.prices.insert((network, token), usd);
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut source = Self::new();
        for entry in &config.prices {
            let network = Network::from_str(&entry.network)?;
            let token = Address::from_str(&entry.token)
                .map_err(|e| eyre!("Invalid price token '{}': {}", entry.token, e))?;
            if !entry.usd.is_finite() || entry.usd < 0.0 {
                return Err(eyre!("Invalid price {} for {}", entry.usd, entry.token));
            }
            source.insert(network, token, entry.usd);
        }
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn price(&self, network: Network, token: Address) -> Option<f64> {
        self.prices.get(&(network, token)).copied()
    }
}
