//! Reserve data adapters
//!
//! Pure mappings from raw provider values to the shapes the position
//! pipeline works with.

use alloy_primitives::{Address, U256};
use serde::Serialize;

use super::position::serialize_address;
use crate::contracts::{RawReserveConfiguration, RawReserveRates, RawReserveTokens};

/// Rates are stored as ray (1e27) fixed point
pub const RAY: f64 = 1e27;

/// Liquidation thresholds are stored in basis points
pub const PERCENTAGE_FACTOR: f64 = 1e4;

/// The three representations of one underlying asset inside a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveTokenAddresses {
    #[serde(serialize_with = "serialize_address")]
    pub a_token_address: Address,
    #[serde(serialize_with = "serialize_address")]
    pub stable_debt_token_address: Address,
    #[serde(serialize_with = "serialize_address")]
    pub variable_debt_token_address: Address,
}

impl std::fmt::Display for ReserveTokenAddresses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "a={:#x} stable={:#x} variable={:#x}",
            self.a_token_address, self.stable_debt_token_address, self.variable_debt_token_address
        )
    }
}

/// Yearly rates as fractions (0.05 = 5%)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveApy {
    pub supply_apy: f64,
    pub variable_borrow_apy: f64,
    pub stable_borrow_apy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveConfiguration {
    pub enabled_as_collateral: bool,
    /// Fraction in 0..1
    pub liquidation_threshold: f64,
}

/// Nearest f64 to `value`, exact up to 2^53
pub fn u256_to_f64(value: U256) -> f64 {
    f64::from(value)
}

/// Scale a raw integer amount by `10^decimals`
pub fn from_units(value: U256, decimals: u8) -> f64 {
    u256_to_f64(value) / 10f64.powi(decimals as i32)
}

pub fn to_reserve_token_addresses(raw: &RawReserveTokens) -> ReserveTokenAddresses {
    ReserveTokenAddresses {
        a_token_address: raw.a_token_address,
        stable_debt_token_address: raw.stable_debt_token_address,
        variable_debt_token_address: raw.variable_debt_token_address,
    }
}

pub fn to_reserve_apy(raw: &RawReserveRates) -> ReserveApy {
    ReserveApy {
        supply_apy: u256_to_f64(raw.liquidity_rate) / RAY,
        variable_borrow_apy: u256_to_f64(raw.variable_borrow_rate) / RAY,
        stable_borrow_apy: u256_to_f64(raw.stable_borrow_rate) / RAY,
    }
}

pub fn to_reserve_configuration(raw: &RawReserveConfiguration) -> ReserveConfiguration {
    ReserveConfiguration {
        enabled_as_collateral: raw.usage_as_collateral_enabled,
        liquidation_threshold: u256_to_f64(raw.liquidation_threshold) / PERCENTAGE_FACTOR,
    }
}
