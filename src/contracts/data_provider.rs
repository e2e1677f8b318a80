//! Protocol data provider handle
//!
//! Read-only view of a market's `AaveProtocolDataProvider`. Values come back
//! raw (ray rates, basis-point thresholds); the reserve adapters in
//! `template::reserve` turn them into domain shapes.

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use super::multicall::{BatchRequest, CallAggregator};
use super::IProtocolDataProvider;
use crate::error::AccessError;
use crate::network::Network;

/// Token addresses of one reserve as returned by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReserveTokens {
    pub a_token_address: Address,
    pub stable_debt_token_address: Address,
    pub variable_debt_token_address: Address,
}

/// Rates of one reserve in ray precision (27 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReserveRates {
    pub liquidity_rate: U256,
    pub variable_borrow_rate: U256,
    pub stable_borrow_rate: U256,
}

/// Collateral settings of one reserve, threshold in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReserveConfiguration {
    pub liquidation_threshold: U256,
    pub usage_as_collateral_enabled: bool,
}

pub struct ProtocolDataProvider {
    aggregator: Arc<dyn CallAggregator>,
    network: Network,
    address: Address,
}

impl ProtocolDataProvider {
    pub(super) fn new(aggregator: Arc<dyn CallAggregator>, network: Network, address: Address) -> Self {
        Self { aggregator, network, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Underlying asset of every reserve, in provider enumeration order
    pub async fn get_all_reserves_tokens(&self) -> Result<Vec<Address>, AccessError> {
        let mut batch = BatchRequest::new();
        let idx = batch.add(self.address, &IProtocolDataProvider::getAllReservesTokensCall {});

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;
        let tokens = response.decode::<IProtocolDataProvider::getAllReservesTokensCall>(idx)?;

        debug!("Provider {} lists {} reserves on {}", self.address, tokens.len(), self.network);
        Ok(tokens.into_iter().map(|t| t.tokenAddress).collect())
    }

    /// Token addresses for every asset, in one batch
    ///
    /// All-or-nothing: if any single reserve fails the whole read fails.
    pub async fn get_reserve_tokens_addresses(
        &self,
        assets: &[Address],
    ) -> Result<Vec<RawReserveTokens>, AccessError> {
        let mut batch = BatchRequest::new();
        let indices: Vec<usize> = assets
            .iter()
            .map(|asset| {
                batch.add(
                    self.address,
                    &IProtocolDataProvider::getReserveTokensAddressesCall { asset: *asset },
                )
            })
            .collect();

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;

        indices
            .into_iter()
            .map(|idx| {
                let ret = response.decode::<IProtocolDataProvider::getReserveTokensAddressesCall>(idx)?;
                Ok(RawReserveTokens {
                    a_token_address: ret.aTokenAddress,
                    stable_debt_token_address: ret.stableDebtTokenAddress,
                    variable_debt_token_address: ret.variableDebtTokenAddress,
                })
            })
            .collect()
    }

    /// Rates and configuration for every asset, in one batch
    ///
    /// The outer error means the round trip itself failed; inner errors are
    /// scoped to a single asset.
    pub async fn get_reserve_state(
        &self,
        assets: &[Address],
    ) -> Result<Vec<Result<(RawReserveRates, RawReserveConfiguration), AccessError>>, AccessError> {
        let mut batch = BatchRequest::new();
        let indices: Vec<(usize, usize)> = assets
            .iter()
            .map(|asset| {
                let data = batch.add(
                    self.address,
                    &IProtocolDataProvider::getReserveDataCall { asset: *asset },
                );
                let config = batch.add(
                    self.address,
                    &IProtocolDataProvider::getReserveConfigurationDataCall { asset: *asset },
                );
                (data, config)
            })
            .collect();

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;

        Ok(indices
            .into_iter()
            .map(|(data_idx, config_idx)| {
                let data = response.decode::<IProtocolDataProvider::getReserveDataCall>(data_idx)?;
                let config = response
                    .decode::<IProtocolDataProvider::getReserveConfigurationDataCall>(config_idx)?;

                Ok((
                    RawReserveRates {
                        liquidity_rate: data.liquidityRate,
                        variable_borrow_rate: data.variableBorrowRate,
                        stable_borrow_rate: data.stableBorrowRate,
                    },
                    RawReserveConfiguration {
                        liquidation_threshold: config.liquidationThreshold,
                        usage_as_collateral_enabled: config.usageAsCollateralEnabled,
                    },
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::mock::{MockChain, MockReserve};
    use crate::contracts::ContractFactory;
    use alloy_primitives::address;
    use alloy_sol_types::SolCall;

    const PROVIDER: Address = address!("057835Ad21a177dbdd3090bB1CAE03EaCF78Fc6d");

    fn chain() -> MockChain {
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, MockReserve::new("USDC", 1));
        chain.add_reserve(PROVIDER, MockReserve::new("DAI", 2));
        chain
    }

    #[tokio::test]
    async fn test_lists_reserves_in_provider_order() {
        let factory = ContractFactory::new(Arc::new(chain()));
        let provider = factory.protocol_data_provider(Network::Ethereum, PROVIDER);

        let assets = provider.get_all_reserves_tokens().await.unwrap();
        assert_eq!(
            assets,
            vec![MockReserve::new("USDC", 1).underlying, MockReserve::new("DAI", 2).underlying]
        );
    }

    #[tokio::test]
    async fn test_token_addresses_fail_as_a_whole() {
        let dai = MockReserve::new("DAI", 2);
        let mut chain = chain();
        chain.fail_call(
            IProtocolDataProvider::getReserveTokensAddressesCall::SELECTOR,
            dai.underlying,
        );
        let factory = ContractFactory::new(Arc::new(chain));
        let provider = factory.protocol_data_provider(Network::Ethereum, PROVIDER);

        let assets = provider.get_all_reserves_tokens().await.unwrap();
        assert!(provider.get_reserve_tokens_addresses(&assets).await.is_err());
    }

    #[tokio::test]
    async fn test_reserve_state_is_scoped_per_asset() {
        let usdc = MockReserve::new("USDC", 1);
        let dai = MockReserve::new("DAI", 2);
        let mut chain = chain();
        chain.fail_call(IProtocolDataProvider::getReserveDataCall::SELECTOR, dai.underlying);
        let factory = ContractFactory::new(Arc::new(chain));
        let provider = factory.protocol_data_provider(Network::Ethereum, PROVIDER);

        let state = provider
            .get_reserve_state(&[usdc.underlying, dai.underlying])
            .await
            .unwrap();

        let (rates, config) = state[0].as_ref().unwrap();
        assert_eq!(rates.liquidity_rate, usdc.liquidity_rate);
        assert_eq!(config.liquidation_threshold, usdc.liquidation_threshold);
        assert!(matches!(state[1], Err(AccessError::Reverted { .. })));
    }
}
