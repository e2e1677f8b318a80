//! Nereus Finance
//!
//! An Aave V2 fork on Avalanche. It has no contract access of its own: it is
//! built from an [`AaveV2`] app's factory and price source and only brings
//! its own market address and bindings.

use std::sync::Arc;

use super::aave_v2::AaveV2;
use super::LendingApp;
use crate::contracts::ContractFactory;
use crate::error::PositionError;
use crate::network::Network;
use crate::prices::PriceSource;
use crate::template::{LendingMarket, LendingTokenFetcher, PositionFetcher, PositionRole, RoleToken};

pub const APP_ID: &str = "nereus-finance";

/// Nereus AaveProtocolDataProvider on Avalanche
pub const AVALANCHE_PROVIDER: &str = "0xec090929fBc1B285fc9b3c8EBB92fbc62F01D804";

pub struct NereusFinance {
    contracts: ContractFactory,
    prices: Arc<dyn PriceSource>,
    market: LendingMarket,
}

impl NereusFinance {
    /// Build on an Aave V2 app's contract access, against Nereus' own market
    pub fn compose(aave: &AaveV2, provider_address: &str) -> Result<Self, PositionError> {
        let market = LendingMarket::new(APP_ID, Network::Avalanche, provider_address)?;
        Ok(Self {
            contracts: aave.contracts().clone(),
            prices: aave.prices(),
            market,
        })
    }

    pub fn market(&self) -> &LendingMarket {
        &self.market
    }

    pub fn fetcher(&self, role: PositionRole) -> LendingTokenFetcher<RoleToken> {
        LendingTokenFetcher::new(
            RoleToken::new(self.market.clone(), role),
            self.contracts.clone(),
            self.prices.clone(),
        )
    }

    pub fn supply_fetcher(&self) -> LendingTokenFetcher<RoleToken> {
        self.fetcher(PositionRole::Supply)
    }
}

impl LendingApp for NereusFinance {
    fn app_id(&self) -> &str {
        APP_ID
    }

    fn fetchers(&self) -> Vec<Box<dyn PositionFetcher>> {
        PositionRole::ALL
            .into_iter()
            .map(|role| Box::new(self.fetcher(role)) as Box<dyn PositionFetcher>)
            .collect()
    }
}
