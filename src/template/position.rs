//! Position model
//!
//! A `Position` is one tracked token contract of one market with its derived
//! metrics. It is rebuilt from chain state on every fetch.

use alloy_primitives::{Address, U256};
use serde::{Serialize, Serializer};

use super::reserve::{from_units, ReserveConfiguration};
use crate::network::Network;

/// Addresses are always emitted as lower-case `0x` hex
pub fn serialize_address<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:#x}", address))
}

/// Which side of a reserve a token represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionRole {
    Supply,
    StableDebt,
    VariableDebt,
}

impl PositionRole {
    pub const ALL: [PositionRole; 3] = [
        PositionRole::Supply,
        PositionRole::StableDebt,
        PositionRole::VariableDebt,
    ];

    pub fn is_debt(&self) -> bool {
        !matches!(self, PositionRole::Supply)
    }

    /// +1 for claims, -1 for obligations
    pub fn liquidity_sign(&self) -> f64 {
        if self.is_debt() {
            -1.0
        } else {
            1.0
        }
    }

    pub fn group_id(&self) -> &'static str {
        match self {
            PositionRole::Supply => "supply",
            PositionRole::StableDebt => "stable-borrow",
            PositionRole::VariableDebt => "variable-borrow",
        }
    }
}

impl std::fmt::Display for PositionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group_id())
    }
}

/// Everything known about a token before its data props are computed
#[derive(Debug, Clone, PartialEq)]
pub struct AppTokenContext {
    pub app_id: String,
    pub network: Network,
    pub role: PositionRole,
    pub address: Address,
    pub underlying: Address,
    pub symbol: String,
    pub decimals: u8,
    pub supply: f64,
    /// USD price of one token; lending tokens trade 1:1 with their underlying
    pub price: f64,
    pub underlying_symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProps {
    pub apy: f64,
    pub enabled_as_collateral: bool,
    /// Signed USD value: negative for debt
    pub liquidity: f64,
    pub liquidation_threshold: f64,
    pub is_active: bool,
}

impl DataProps {
    pub fn compute(
        role: PositionRole,
        price: f64,
        supply: f64,
        apy: f64,
        configuration: ReserveConfiguration,
    ) -> Self {
        let liquidity = role.liquidity_sign() * price * supply;
        let is_active = liquidity.abs() > 0.0;

        Self {
            apy,
            enabled_as_collateral: configuration.enabled_as_collateral,
            liquidity,
            liquidation_threshold: configuration.liquidation_threshold,
            is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProps {
    pub label: String,
    pub label_detailed: String,
}

impl DisplayProps {
    /// Label is the underlying asset, detailed label the token itself
    pub fn compute(context: &AppTokenContext) -> Self {
        Self {
            label: context.underlying_symbol.clone(),
            label_detailed: context.symbol.clone(),
        }
    }
}

/// Display-ready output unit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub network: Network,
    pub app_id: String,
    pub group_id: &'static str,
    pub role: PositionRole,
    pub symbol: String,
    pub decimals: u8,
    pub supply: f64,
    pub price: f64,
    pub price_per_share: f64,
    #[serde(serialize_with = "serialize_address")]
    pub underlying_asset_address: Address,
    #[serde(flatten)]
    pub data_props: DataProps,
    #[serde(flatten)]
    pub display_props: DisplayProps,
}

impl Position {
    pub fn assemble(context: AppTokenContext, data_props: DataProps, display_props: DisplayProps) -> Self {
        Self {
            address: context.address,
            network: context.network,
            app_id: context.app_id,
            group_id: context.role.group_id(),
            role: context.role,
            symbol: context.symbol,
            decimals: context.decimals,
            supply: context.supply,
            price: context.price,
            price_per_share: 1.0,
            underlying_asset_address: context.underlying,
            data_props,
            display_props,
        }
    }

    pub fn liquidity(&self) -> f64 {
        self.data_props.liquidity
    }

    pub fn is_active(&self) -> bool {
        self.data_props.is_active
    }
}

/// An owner's holding of one position token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    pub network: Network,
    pub app_id: String,
    pub group_id: &'static str,
    pub role: PositionRole,
    #[serde(serialize_with = "serialize_address")]
    pub owner: Address,
    pub symbol: String,
    pub label: String,
    pub decimals: u8,
    pub balance: f64,
    pub price: f64,
    /// Signed like liquidity: negative for debt
    pub balance_usd: f64,
}

impl TokenBalance {
    pub fn new(position: &Position, owner: Address, raw: U256) -> Self {
        let balance = from_units(raw, position.decimals);
        Self {
            address: position.address,
            network: position.network,
            app_id: position.app_id.clone(),
            group_id: position.group_id,
            role: position.role,
            owner,
            symbol: position.symbol.clone(),
            label: position.display_props.label.clone(),
            decimals: position.decimals,
            balance,
            price: position.price,
            balance_usd: position.role.liquidity_sign() * position.price * balance,
        }
    }
}
