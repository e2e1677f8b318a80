//! Error taxonomy for the position pipeline
//!
//! `AccessError` describes what went wrong talking to the chain.
//! `PositionError` says which pipeline stage it broke, which decides
//! whether the whole market is lost or just one position.

use alloy_primitives::Address;
use thiserror::Error;

use crate::network::Network;
use crate::template::PositionRole;

/// Failure at the contract access layer
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    #[error("no RPC endpoint configured for {0}")]
    UnsupportedNetwork(Network),

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("call to {target} reverted")]
    Reverted { target: Address },

    /// The contract answered, but not in the shape we expect
    #[error("malformed response from {target}: {reason}")]
    MalformedResponse { target: Address, reason: String },
}

impl AccessError {
    pub fn malformed(target: Address, reason: impl std::fmt::Display) -> Self {
        AccessError::MalformedResponse {
            target,
            reason: reason.to_string(),
        }
    }
}

/// Failure of one stage of the position pipeline
#[derive(Debug, Clone, Error)]
pub enum PositionError {
    /// Raised while wiring fetchers, never at fetch time
    #[error("invalid market configuration: {0}")]
    InvalidMarket(String),

    /// Fatal to the whole market
    #[error("{app_id} {role} discovery failed on {network} (provider {provider}): {source}")]
    Discovery {
        app_id: String,
        network: Network,
        role: PositionRole,
        provider: Address,
        #[source]
        source: AccessError,
    },

    #[error("underlying asset resolution failed for {token}: {source}")]
    Resolution {
        token: Address,
        #[source]
        source: AccessError,
    },

    #[error("reserve data fetch failed for {token}: {source}")]
    DataFetch {
        token: Address,
        #[source]
        source: AccessError,
    },

    #[error("no price for {token} (underlying {underlying})")]
    MissingPrice { token: Address, underlying: Address },

    #[error("balance of {owner} in {token} unavailable: {source}")]
    Balance {
        token: Address,
        owner: Address,
        #[source]
        source: AccessError,
    },
}

impl PositionError {
    /// Token the error is scoped to, if it is a per-position failure
    pub fn token(&self) -> Option<Address> {
        match self {
            PositionError::Resolution { token, .. }
            | PositionError::DataFetch { token, .. }
            | PositionError::MissingPrice { token, .. }
            | PositionError::Balance { token, .. } => Some(*token),
            _ => None,
        }
    }

    /// True when the upstream contract broke its interface rather than being unreachable
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            PositionError::Discovery { source: AccessError::MalformedResponse { .. }, .. }
                | PositionError::Resolution { source: AccessError::MalformedResponse { .. }, .. }
                | PositionError::DataFetch { source: AccessError::MalformedResponse { .. }, .. }
                | PositionError::Balance { source: AccessError::MalformedResponse { .. }, .. }
        )
    }
}
