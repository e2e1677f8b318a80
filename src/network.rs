//! Supported EVM networks

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Networks a lending market can be deployed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Ethereum,
    Polygon,
    Avalanche,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Ethereum, Network::Polygon, Network::Avalanche];

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Polygon => 137,
            Network::Avalanche => 43114,
        }
    }

    /// Key used in config files and CLI flags
    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Polygon => "polygon",
            Network::Avalanche => "avalanche",
        }
    }

    /// Environment variable holding this network's RPC URL
    pub fn rpc_env_var(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETHEREUM_RPC_URL",
            Network::Polygon => "POLYGON_RPC_URL",
            Network::Avalanche => "AVALANCHE_RPC_URL",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Network {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "mainnet" | "eth" => Ok(Network::Ethereum),
            "polygon" | "matic" => Ok(Network::Polygon),
            "avalanche" | "avax" => Ok(Network::Avalanche),
            other => Err(eyre::eyre!("Unknown network '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_aliases() {
        assert_eq!(Network::from_str("Mainnet").unwrap(), Network::Ethereum);
        assert_eq!(Network::from_str("avax").unwrap(), Network::Avalanche);
        assert!(Network::from_str("solana").is_err());
    }

    #[test]
    fn test_name_round_trips_through_from_str() {
        for network in Network::ALL {
            assert_eq!(Network::from_str(network.name()).unwrap(), network);
        }
    }
}
