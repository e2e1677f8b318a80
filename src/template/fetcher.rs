//! Lending token position fetcher
//!
//! One pipeline shared by every lending market integration:
//!
//! 1. discovery: enumerate reserves, collapse each to the tracked token
//! 2. underlying resolution: `UNDERLYING_ASSET_ADDRESS()` per token
//! 3. data props: rates + configuration per underlying, signed liquidity
//! 4. display props: labels from metadata already in hand
//!
//! What differs per (market, role) lives behind [`LendingTokenStrategy`].
//! Discovery failures abort the market. Anything after discovery is scoped
//! to one position: a failed position is dropped and reported, the rest
//! carry on.

use alloy_primitives::Address;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::position::{AppTokenContext, DataProps, DisplayProps, Position, PositionRole, TokenBalance};
use super::reserve::{
    from_units, to_reserve_apy, to_reserve_configuration, to_reserve_token_addresses, ReserveApy,
    ReserveTokenAddresses,
};
use crate::contracts::{ContractFactory, RawReserveConfiguration, RawReserveRates};
use crate::error::{AccessError, PositionError};
use crate::network::Network;
use crate::prices::PriceSource;

// ============================================
// MARKET
// ============================================

/// A lending market deployment, validated when built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingMarket {
    app_id: String,
    network: Network,
    provider_address: Address,
}

impl LendingMarket {
    pub fn new(app_id: impl Into<String>, network: Network, provider_address: &str) -> Result<Self, PositionError> {
        let app_id = app_id.into();
        let trimmed = provider_address.trim();
        if trimmed.is_empty() {
            return Err(PositionError::InvalidMarket(format!(
                "{} on {}: empty provider address",
                app_id, network
            )));
        }

        let address = Address::from_str(trimmed).map_err(|e| {
            PositionError::InvalidMarket(format!(
                "{} on {}: bad provider address '{}': {}",
                app_id, network, trimmed, e
            ))
        })?;

        Self::from_address(app_id, network, address)
    }

    pub fn from_address(app_id: impl Into<String>, network: Network, provider_address: Address) -> Result<Self, PositionError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(PositionError::InvalidMarket("empty app id".to_string()));
        }
        if provider_address == Address::ZERO {
            return Err(PositionError::InvalidMarket(format!(
                "{} on {}: zero provider address",
                app_id, network
            )));
        }

        Ok(Self {
            app_id,
            network,
            provider_address,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn provider_address(&self) -> Address {
        self.provider_address
    }
}

// ============================================
// EXTENSION POINTS
// ============================================

/// The part of the pipeline that varies per (market, role)
pub trait LendingTokenStrategy: Send + Sync {
    /// Market whose data provider this variant reads
    fn market(&self) -> &LendingMarket;

    /// Decides the liquidity sign
    fn role(&self) -> PositionRole;

    /// Which of the reserve's three tokens this variant tracks
    fn token_address(&self, reserve: &ReserveTokenAddresses) -> Address;

    /// Which of the reserve's three rates this variant reports
    fn apy(&self, apy: &ReserveApy) -> f64;
}

/// The standard binding: token and rate follow from the role alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleToken {
    market: LendingMarket,
    role: PositionRole,
}

impl RoleToken {
    pub fn new(market: LendingMarket, role: PositionRole) -> Self {
        Self { market, role }
    }
}

impl LendingTokenStrategy for RoleToken {
    fn market(&self) -> &LendingMarket {
        &self.market
    }

    fn role(&self) -> PositionRole {
        self.role
    }

    fn token_address(&self, reserve: &ReserveTokenAddresses) -> Address {
        match self.role {
            PositionRole::Supply => reserve.a_token_address,
            PositionRole::StableDebt => reserve.stable_debt_token_address,
            PositionRole::VariableDebt => reserve.variable_debt_token_address,
        }
    }

    fn apy(&self, apy: &ReserveApy) -> f64 {
        match self.role {
            PositionRole::Supply => apy.supply_apy,
            PositionRole::StableDebt => apy.stable_borrow_apy,
            PositionRole::VariableDebt => apy.variable_borrow_apy,
        }
    }
}

// ============================================
// FETCHER
// ============================================

/// Outcome of one fetch cycle for one market
#[derive(Debug, Default)]
pub struct FetchReport {
    pub positions: Vec<Position>,
    /// Positions dropped along the way, one error each
    pub failures: Vec<PositionError>,
}

/// One owner's holdings in one market
#[derive(Debug, Default)]
pub struct BalanceReport {
    /// Non-zero balances only
    pub balances: Vec<TokenBalance>,
    /// Positions or balances that could not be read
    pub failures: Vec<PositionError>,
}

/// Object-safe view of a fetcher, for registries and scanners
#[async_trait]
pub trait PositionFetcher: Send + Sync {
    fn app_id(&self) -> &str;
    fn network(&self) -> Network;
    fn role(&self) -> PositionRole;
    fn provider_address(&self) -> Address;

    async fn fetch(&self) -> Result<FetchReport, PositionError>;

    async fn fetch_balances(&self, owner: Address) -> Result<BalanceReport, PositionError>;
}

pub struct LendingTokenFetcher<S> {
    strategy: S,
    contracts: ContractFactory,
    prices: Arc<dyn PriceSource>,
}

impl<S: LendingTokenStrategy> LendingTokenFetcher<S> {
    pub fn new(strategy: S, contracts: ContractFactory, prices: Arc<dyn PriceSource>) -> Self {
        Self {
            strategy,
            contracts,
            prices,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn discovery_error(&self, source: AccessError) -> PositionError {
        let market = self.strategy.market();
        PositionError::Discovery {
            app_id: market.app_id().to_string(),
            network: market.network(),
            role: self.strategy.role(),
            provider: market.provider_address(),
            source,
        }
    }

    /// Tracked token of every reserve in the market
    ///
    /// Order follows the provider's enumeration and carries no meaning
    /// across cycles. Duplicates are dropped.
    pub async fn get_addresses(&self) -> Result<Vec<Address>, PositionError> {
        let market = self.strategy.market();
        let provider = self
            .contracts
            .protocol_data_provider(market.network(), market.provider_address());

        let assets = provider
            .get_all_reserves_tokens()
            .await
            .map_err(|e| self.discovery_error(e))?;

        let reserves = provider
            .get_reserve_tokens_addresses(&assets)
            .await
            .map_err(|e| self.discovery_error(e))?;

        let mut seen = HashSet::new();
        let addresses: Vec<Address> = reserves
            .iter()
            .map(to_reserve_token_addresses)
            .map(|reserve| self.strategy.token_address(&reserve))
            .filter(|address| seen.insert(*address))
            .collect();

        debug!(
            "{} {} on {}: discovered {} tokens",
            market.app_id(),
            self.strategy.role(),
            market.network(),
            addresses.len()
        );

        Ok(addresses)
    }

    /// Underlying asset of each token, one result per token
    pub async fn get_underlying_token_addresses(&self, tokens: &[Address]) -> Vec<Result<Address, PositionError>> {
        let lending_token = self.contracts.lending_token(self.strategy.market().network());

        match lending_token.get_underlying_assets(tokens).await {
            Ok(results) => tokens
                .iter()
                .zip(results)
                .map(|(token, result)| {
                    result.map_err(|source| PositionError::Resolution {
                        token: *token,
                        source,
                    })
                })
                .collect(),
            Err(source) => tokens
                .iter()
                .map(|token| {
                    Err(PositionError::Resolution {
                        token: *token,
                        source: source.clone(),
                    })
                })
                .collect(),
        }
    }

    /// Metadata and price for (token, underlying) pairs
    pub async fn get_app_token_contexts(&self, pairs: &[(Address, Address)]) -> Vec<Result<AppTokenContext, PositionError>> {
        let market = self.strategy.market();
        let lending_token = self.contracts.lending_token(market.network());

        let metadata = match lending_token.get_metadata(pairs).await {
            Ok(metadata) => metadata,
            Err(source) => {
                return pairs
                    .iter()
                    .map(|(token, _)| {
                        Err(PositionError::Resolution {
                            token: *token,
                            source: source.clone(),
                        })
                    })
                    .collect()
            }
        };

        let prices = join_all(
            pairs
                .iter()
                .map(|(_, underlying)| self.prices.price(market.network(), *underlying)),
        )
        .await;

        pairs
            .iter()
            .zip(metadata)
            .zip(prices)
            .map(|((&(token, underlying), metadata), price)| {
                let metadata = metadata.map_err(|source| PositionError::Resolution { token, source })?;
                let price = price.ok_or(PositionError::MissingPrice { token, underlying })?;

                Ok(AppTokenContext {
                    app_id: market.app_id().to_string(),
                    network: market.network(),
                    role: self.strategy.role(),
                    address: token,
                    underlying,
                    supply: from_units(metadata.total_supply, metadata.decimals),
                    symbol: metadata.symbol,
                    decimals: metadata.decimals,
                    price,
                    underlying_symbol: metadata.underlying_symbol,
                })
            })
            .collect()
    }

    /// Rates and configuration for every context, read in one batch
    pub async fn get_data_props(&self, contexts: &[AppTokenContext]) -> Vec<Result<DataProps, PositionError>> {
        let market = self.strategy.market();
        let provider = self
            .contracts
            .protocol_data_provider(market.network(), market.provider_address());
        let assets: Vec<Address> = contexts.iter().map(|c| c.underlying).collect();

        match provider.get_reserve_state(&assets).await {
            Ok(state) => contexts
                .iter()
                .zip(state)
                .map(|(context, state)| {
                    let (rates, configuration) = state.map_err(|source| PositionError::DataFetch {
                        token: context.address,
                        source,
                    })?;
                    Ok(self.compute_data_props(context, &rates, &configuration))
                })
                .collect(),
            Err(source) => contexts
                .iter()
                .map(|context| {
                    Err(PositionError::DataFetch {
                        token: context.address,
                        source: source.clone(),
                    })
                })
                .collect(),
        }
    }

    pub fn compute_data_props(
        &self,
        context: &AppTokenContext,
        rates: &RawReserveRates,
        configuration: &RawReserveConfiguration,
    ) -> DataProps {
        let apy = self.strategy.apy(&to_reserve_apy(rates));
        DataProps::compute(
            self.strategy.role(),
            context.price,
            context.supply,
            apy,
            to_reserve_configuration(configuration),
        )
    }

    pub fn get_display_props(&self, context: &AppTokenContext) -> DisplayProps {
        DisplayProps::compute(context)
    }

    /// Run the full pipeline for this market
    pub async fn get_positions(&self) -> Result<FetchReport, PositionError> {
        let start = Instant::now();
        let market = self.strategy.market();
        let mut report = FetchReport::default();

        let addresses = self.get_addresses().await?;

        let underlying = self.get_underlying_token_addresses(&addresses).await;
        let pairs: Vec<(Address, Address)> = addresses
            .iter()
            .zip(underlying)
            .filter_map(|(token, underlying)| keep(underlying, &mut report.failures).map(|u| (*token, u)))
            .collect();

        let contexts: Vec<AppTokenContext> = self
            .get_app_token_contexts(&pairs)
            .await
            .into_iter()
            .filter_map(|context| keep(context, &mut report.failures))
            .collect();

        let data_props = self.get_data_props(&contexts).await;
        for (context, data_props) in contexts.into_iter().zip(data_props) {
            if let Some(data_props) = keep(data_props, &mut report.failures) {
                let display_props = self.get_display_props(&context);
                report
                    .positions
                    .push(Position::assemble(context, data_props, display_props));
            }
        }

        info!(
            "{} {} on {}: {} positions ({} dropped) in {:?}",
            market.app_id(),
            self.strategy.role(),
            market.network(),
            report.positions.len(),
            report.failures.len(),
            start.elapsed()
        );

        Ok(report)
    }

    /// `owner`'s balance of every position token in this market
    ///
    /// Runs the position pipeline, then reads all balances in one batch.
    /// Zero balances are left out.
    pub async fn get_balances(&self, owner: Address) -> Result<BalanceReport, PositionError> {
        let market = self.strategy.market();
        let positions = self.get_positions().await?;
        let mut report = BalanceReport {
            balances: Vec::new(),
            failures: positions.failures,
        };

        let tokens: Vec<Address> = positions.positions.iter().map(|p| p.address).collect();
        let lending_token = self.contracts.lending_token(market.network());
        let balances = match lending_token.get_balances(&tokens, owner).await {
            Ok(balances) => balances,
            Err(source) => tokens.iter().map(|_| Err(source.clone())).collect(),
        };

        for (position, balance) in positions.positions.iter().zip(balances) {
            let balance = balance.map_err(|source| PositionError::Balance {
                token: position.address,
                owner,
                source,
            });
            if let Some(raw) = keep(balance, &mut report.failures) {
                if !raw.is_zero() {
                    report.balances.push(TokenBalance::new(position, owner, raw));
                }
            }
        }

        debug!(
            "{} {} on {}: {} balances for {:#x}",
            market.app_id(),
            self.strategy.role(),
            market.network(),
            report.balances.len(),
            owner
        );

        Ok(report)
    }
}

/// Pass `Ok` through, park `Err` with the other dropped positions
fn keep<T>(result: Result<T, PositionError>, failures: &mut Vec<PositionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Dropping position: {}", e);
            failures.push(e);
            None
        }
    }
}

#[async_trait]
impl<S: LendingTokenStrategy> PositionFetcher for LendingTokenFetcher<S> {
    fn app_id(&self) -> &str {
        self.strategy.market().app_id()
    }

    fn network(&self) -> Network {
        self.strategy.market().network()
    }

    fn role(&self) -> PositionRole {
        self.strategy.role()
    }

    fn provider_address(&self) -> Address {
        self.strategy.market().provider_address()
    }

    async fn fetch(&self) -> Result<FetchReport, PositionError> {
        self.get_positions().await
    }

    async fn fetch_balances(&self, owner: Address) -> Result<BalanceReport, PositionError> {
        self.get_balances(owner).await
    }
}
