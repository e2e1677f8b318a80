//! Lending app integrations
//!
//! Each app is a set of template bindings. `build_apps` wires them from
//! config: Aave V2 first, then the products composed on top of it.

pub mod aave_v2;
pub mod nereus_finance;

use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::contracts::ContractFactory;
use crate::error::PositionError;
use crate::network::Network;
use crate::prices::PriceSource;
use crate::template::{LendingMarket, PositionFetcher};

pub use aave_v2::AaveV2;
pub use nereus_finance::NereusFinance;

pub const APP_IDS: [&str; 2] = [aave_v2::APP_ID, nereus_finance::APP_ID];

/// A product exposing one fetcher per (market, role)
pub trait LendingApp: Send + Sync {
    fn app_id(&self) -> &str;
    fn fetchers(&self) -> Vec<Box<dyn PositionFetcher>>;
}

/// Build every app, applying market overrides from config
pub fn build_apps(
    config: &Config,
    contracts: ContractFactory,
    prices: Arc<dyn PriceSource>,
) -> Result<Vec<Box<dyn LendingApp>>, PositionError> {
    let mut aave_markets: Vec<LendingMarket> = aave_v2::PROVIDERS
        .iter()
        .map(|(network, provider)| AaveV2::market(*network, provider))
        .collect::<Result<_, _>>()?;
    let mut nereus_provider = nereus_finance::AVALANCHE_PROVIDER.to_string();

    for entry in &config.markets {
        let network = Network::from_str(&entry.network)
            .map_err(|e| PositionError::InvalidMarket(e.to_string()))?;

        match entry.app_id.as_str() {
            aave_v2::APP_ID => {
                let market = AaveV2::market(network, &entry.provider_address)?;
                aave_markets.retain(|m| m.network() != network);
                aave_markets.push(market);
            }
            nereus_finance::APP_ID => {
                if network != Network::Avalanche {
                    return Err(PositionError::InvalidMarket(format!(
                        "{} is only deployed on avalanche, not {}",
                        nereus_finance::APP_ID,
                        network
                    )));
                }
                nereus_provider = entry.provider_address.clone();
            }
            other => {
                return Err(PositionError::InvalidMarket(format!("unknown app '{}'", other)));
            }
        }
    }

    let aave = AaveV2::new(contracts, prices, aave_markets);
    let nereus = NereusFinance::compose(&aave, &nereus_provider)?;

    debug!(
        "Built {} ({} markets) and {}",
        aave_v2::APP_ID,
        aave.markets().len(),
        nereus_finance::APP_ID
    );

    Ok(vec![Box::new(aave), Box::new(nereus)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketEntry;
    use crate::contracts::mock::MockChain;
    use crate::prices::StaticPriceSource;

    fn build(config: &Config) -> Result<Vec<Box<dyn LendingApp>>, PositionError> {
        build_apps(
            config,
            ContractFactory::new(Arc::new(MockChain::new())),
            Arc::new(StaticPriceSource::new()),
        )
    }

    #[test]
    fn test_default_wiring() {
        let apps = build(&Config::default()).unwrap();
        let ids: Vec<&str> = apps.iter().map(|a| a.app_id()).collect();
        assert_eq!(ids, APP_IDS.to_vec());

        let fetchers: usize = apps.iter().map(|a| a.fetchers().len()).sum();
        assert_eq!(fetchers, aave_v2::PROVIDERS.len() * 3 + 3);
    }

    #[test]
    fn test_market_override_replaces_network() {
        let mut config = Config::default();
        config.markets.push(MarketEntry {
            app_id: aave_v2::APP_ID.to_string(),
            network: "ethereum".to_string(),
            provider_address: "0x1111111111111111111111111111111111111111".to_string(),
        });

        let apps = build(&config).unwrap();
        let ethereum: Vec<String> = apps[0]
            .fetchers()
            .iter()
            .filter(|f| f.network() == Network::Ethereum)
            .map(|f| format!("{:#x}", f.provider_address()))
            .collect();
        assert_eq!(ethereum.len(), 3);
        assert!(ethereum.iter().all(|a| a == "0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn test_bad_overrides_fail_at_wiring() {
        let mut config = Config::default();
        config.markets.push(MarketEntry {
            app_id: nereus_finance::APP_ID.to_string(),
            network: "avalanche".to_string(),
            provider_address: String::new(),
        });
        assert!(matches!(build(&config), Err(PositionError::InvalidMarket(_))));

        let mut config = Config::default();
        config.markets.push(MarketEntry {
            app_id: "compound".to_string(),
            network: "ethereum".to_string(),
            provider_address: "0x1111111111111111111111111111111111111111".to_string(),
        });
        assert!(build(&config).is_err());
    }
}
