//! Contract Access Layer
//!
//! ABI bindings plus typed read-only handles for the lending contracts.
//! Every read goes through a [`CallAggregator`] so reads issued together
//! land in one Multicall3 round trip against one block.

mod data_provider;
mod lending_token;
mod multicall;

#[cfg(test)]
pub(crate) mod mock;

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;
use std::sync::Arc;

use crate::network::Network;

pub use data_provider::{ProtocolDataProvider, RawReserveConfiguration, RawReserveRates, RawReserveTokens};
pub use lending_token::{LendingToken, TokenMetadata};
pub use multicall::{BatchRequest, CallAggregator, CallOutcome, RpcAggregator};

// ============================================
// CONSTANTS
// ============================================

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Maximum calls per batch (to avoid gas limits)
pub const MAX_CALLS_PER_BATCH: usize = 100;

// ============================================
// MULTICALL3 INTERFACE
// ============================================

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

// ============================================
// LENDING MARKET INTERFACES
// ============================================

sol! {
    /// Aave V2 AaveProtocolDataProvider (also deployed by forks such as Nereus)
    interface IProtocolDataProvider {
        struct TokenData {
            string symbol;
            address tokenAddress;
        }

        function getAllReservesTokens() external view returns (TokenData[] memory);

        function getReserveTokensAddresses(address asset) external view returns (
            address aTokenAddress,
            address stableDebtTokenAddress,
            address variableDebtTokenAddress
        );

        function getReserveData(address asset) external view returns (
            uint256 availableLiquidity,
            uint256 totalStableDebt,
            uint256 totalVariableDebt,
            uint256 liquidityRate,
            uint256 variableBorrowRate,
            uint256 stableBorrowRate,
            uint256 averageStableBorrowRate,
            uint256 liquidityIndex,
            uint256 variableBorrowIndex,
            uint40 lastUpdateTimestamp
        );

        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );
    }

    /// aTokens and both debt tokens expose the same read surface
    interface ILendingToken {
        function UNDERLYING_ASSET_ADDRESS() external view returns (address);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
    }

    /// Pre-ERC20-metadata tokens (MKR, SAI) answer `symbol()` with a bytes32
    interface ILegacyToken {
        function symbol() external view returns (bytes32);
    }
}

// ============================================
// CONTRACT FACTORY
// ============================================

/// Builds typed contract handles by (network, address)
///
/// Holds only immutable ABI knowledge and the shared aggregator, so one
/// factory can be cloned into any number of fetchers, including fetchers
/// belonging to a different product.
#[derive(Clone)]
pub struct ContractFactory {
    aggregator: Arc<dyn CallAggregator>,
}

impl ContractFactory {
    pub fn new(aggregator: Arc<dyn CallAggregator>) -> Self {
        Self { aggregator }
    }

    pub fn protocol_data_provider(&self, network: Network, address: Address) -> ProtocolDataProvider {
        ProtocolDataProvider::new(self.aggregator.clone(), network, address)
    }

    pub fn lending_token(&self, network: Network) -> LendingToken {
        LendingToken::new(self.aggregator.clone(), network)
    }
}

impl std::fmt::Debug for ContractFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractFactory").finish_non_exhaustive()
    }
}
