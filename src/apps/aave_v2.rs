//! Aave V2
//!
//! Supply, stable debt and variable debt bindings of the lending template,
//! one set per deployed market.

use std::sync::Arc;

use super::LendingApp;
use crate::contracts::ContractFactory;
use crate::error::PositionError;
use crate::network::Network;
use crate::prices::PriceSource;
use crate::template::{LendingMarket, LendingTokenFetcher, PositionFetcher, PositionRole, RoleToken};

pub const APP_ID: &str = "aave-v2";

/// AaveProtocolDataProvider deployments
pub const PROVIDERS: &[(Network, &str)] = &[
    (Network::Ethereum, "0x057835Ad21a177dbdd3090bB1CAE03EaCF78Fc6d"),
    (Network::Polygon, "0x7551b5D2763519d4e37e8B81929D336De671d46d"),
    (Network::Avalanche, "0x65285E9dfab318f57051ab2b139ccCf232945451"),
];

// ============================================
// APP
// ============================================

/// Aave V2 with its contract access configuration
///
/// The factory and price source held here are what other products built on
/// Aave V2 infrastructure borrow (see `nereus_finance`).
pub struct AaveV2 {
    contracts: ContractFactory,
    prices: Arc<dyn PriceSource>,
    markets: Vec<LendingMarket>,
}

impl AaveV2 {
    pub fn new(contracts: ContractFactory, prices: Arc<dyn PriceSource>, markets: Vec<LendingMarket>) -> Self {
        Self {
            contracts,
            prices,
            markets,
        }
    }

    /// All markets in [`PROVIDERS`]
    pub fn with_default_markets(contracts: ContractFactory, prices: Arc<dyn PriceSource>) -> Result<Self, PositionError> {
        let markets = PROVIDERS
            .iter()
            .map(|(network, provider)| Self::market(*network, provider))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(contracts, prices, markets))
    }

    pub fn market(network: Network, provider_address: &str) -> Result<LendingMarket, PositionError> {
        LendingMarket::new(APP_ID, network, provider_address)
    }

    /// Shared contract access, for products composed on top of Aave V2
    pub fn contracts(&self) -> &ContractFactory {
        &self.contracts
    }

    pub fn prices(&self) -> Arc<dyn PriceSource> {
        self.prices.clone()
    }

    pub fn markets(&self) -> &[LendingMarket] {
        &self.markets
    }

    pub fn fetcher(&self, market: LendingMarket, role: PositionRole) -> LendingTokenFetcher<RoleToken> {
        LendingTokenFetcher::new(RoleToken::new(market, role), self.contracts.clone(), self.prices.clone())
    }

    pub fn supply_fetcher(&self, market: LendingMarket) -> LendingTokenFetcher<RoleToken> {
        self.fetcher(market, PositionRole::Supply)
    }

    pub fn stable_debt_fetcher(&self, market: LendingMarket) -> LendingTokenFetcher<RoleToken> {
        self.fetcher(market, PositionRole::StableDebt)
    }

    pub fn variable_debt_fetcher(&self, market: LendingMarket) -> LendingTokenFetcher<RoleToken> {
        self.fetcher(market, PositionRole::VariableDebt)
    }
}

impl LendingApp for AaveV2 {
    fn app_id(&self) -> &str {
        APP_ID
    }

    fn fetchers(&self) -> Vec<Box<dyn PositionFetcher>> {
        let mut fetchers: Vec<Box<dyn PositionFetcher>> = Vec::new();
        for market in &self.markets {
            for role in PositionRole::ALL {
                fetchers.push(Box::new(self.fetcher(market.clone(), role)));
            }
        }
        fetchers
    }
}
