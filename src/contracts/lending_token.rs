//! aToken / debt token handle

use alloy_primitives::{Address, B256, U256};
use std::sync::Arc;

use super::multicall::{BatchRequest, BatchResponse, CallAggregator};
use super::{ILegacyToken, ILendingToken};
use crate::error::AccessError;
use crate::network::Network;

/// ERC20 metadata of a tracked token and its underlying asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
    pub underlying_symbol: String,
}

/// `symbol()` as a string, falling back to the bytes32 form of legacy tokens
fn decode_symbol(response: &BatchResponse, index: usize) -> Result<String, AccessError> {
    match response.decode::<ILendingToken::symbolCall>(index) {
        Err(err @ AccessError::MalformedResponse { .. }) => response
            .decode::<ILegacyToken::symbolCall>(index)
            .ok()
            .and_then(bytes32_symbol)
            .ok_or(err),
        other => other,
    }
}

/// NUL-padded bytes32 -> string, `None` unless it is non-empty UTF-8
fn bytes32_symbol(raw: B256) -> Option<String> {
    let len = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8(raw[..len].to_vec()).ok().filter(|s| !s.is_empty())
}

pub struct LendingToken {
    aggregator: Arc<dyn CallAggregator>,
    network: Network,
}

impl LendingToken {
    pub(super) fn new(aggregator: Arc<dyn CallAggregator>, network: Network) -> Self {
        Self { aggregator, network }
    }

    /// `UNDERLYING_ASSET_ADDRESS()` of each token, one result per token
    pub async fn get_underlying_assets(
        &self,
        tokens: &[Address],
    ) -> Result<Vec<Result<Address, AccessError>>, AccessError> {
        let mut batch = BatchRequest::new();
        let indices: Vec<usize> = tokens
            .iter()
            .map(|token| batch.add(*token, &ILendingToken::UNDERLYING_ASSET_ADDRESSCall {}))
            .collect();

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;

        Ok(indices
            .into_iter()
            .map(|idx| response.decode::<ILendingToken::UNDERLYING_ASSET_ADDRESSCall>(idx))
            .collect())
    }

    /// Metadata for (token, underlying) pairs, one result per pair
    pub async fn get_metadata(
        &self,
        pairs: &[(Address, Address)],
    ) -> Result<Vec<Result<TokenMetadata, AccessError>>, AccessError> {
        let mut batch = BatchRequest::new();
        let indices: Vec<[usize; 4]> = pairs
            .iter()
            .map(|(token, underlying)| {
                [
                    batch.add(*token, &ILendingToken::symbolCall {}),
                    batch.add(*token, &ILendingToken::decimalsCall {}),
                    batch.add(*token, &ILendingToken::totalSupplyCall {}),
                    batch.add(*underlying, &ILendingToken::symbolCall {}),
                ]
            })
            .collect();

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;

        Ok(indices
            .into_iter()
            .map(|[symbol, decimals, supply, u_symbol]| {
                Ok(TokenMetadata {
                    symbol: decode_symbol(&response, symbol)?,
                    decimals: response.decode::<ILendingToken::decimalsCall>(decimals)?,
                    total_supply: response.decode::<ILendingToken::totalSupplyCall>(supply)?,
                    underlying_symbol: decode_symbol(&response, u_symbol)?,
                })
            })
            .collect())
    }

    /// `balanceOf(owner)` of each token, one result per token
    pub async fn get_balances(
        &self,
        tokens: &[Address],
        owner: Address,
    ) -> Result<Vec<Result<U256, AccessError>>, AccessError> {
        let mut batch = BatchRequest::new();
        let indices: Vec<usize> = tokens
            .iter()
            .map(|token| batch.add(*token, &ILendingToken::balanceOfCall { owner }))
            .collect();

        let response = batch.execute(self.aggregator.as_ref(), self.network).await?;

        Ok(indices
            .into_iter()
            .map(|idx| response.decode::<ILendingToken::balanceOfCall>(idx))
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

    #[tokio::test]
    async fn test_underlying_and_metadata() {
        let usdc = MockReserve::new("USDC", 1);
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, usdc.clone());
        let factory = ContractFactory::new(Arc::new(chain));
        let token = factory.lending_token(Network::Ethereum);

        let underlying = token
            .get_underlying_assets(&[usdc.a_token, usdc.variable_debt_token])
            .await
            .unwrap();
        assert_eq!(underlying[0].as_ref().unwrap(), &usdc.underlying);
        assert_eq!(underlying[1].as_ref().unwrap(), &usdc.underlying);

        let metadata = token.get_metadata(&[(usdc.a_token, usdc.underlying)]).await.unwrap();
        let metadata = metadata[0].as_ref().unwrap();
        assert_eq!(metadata.symbol, "aUSDC");
        assert_eq!(metadata.underlying_symbol, "USDC");
        assert_eq!(metadata.decimals, usdc.decimals);
        assert_eq!(metadata.total_supply, usdc.a_token_supply);
    }

    #[tokio::test]
    async fn test_unknown_token_does_not_poison_batch() {
        let usdc = MockReserve::new("USDC", 1);
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, usdc.clone());
        let factory = ContractFactory::new(Arc::new(chain));
        let token = factory.lending_token(Network::Ethereum);

        let stranger = address!("00000000000000000000000000000000000000ff");
        let underlying = token
            .get_underlying_assets(&[stranger, usdc.a_token])
            .await
            .unwrap();
        assert!(underlying[0].is_err());
        assert!(underlying[1].is_ok());
    }

    #[tokio::test]
    async fn test_bytes32_symbol_is_read() {
        let mkr = MockReserve::new("MKR", 5);
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, mkr.clone());
        chain.use_bytes32_symbol(mkr.underlying);
        let factory = ContractFactory::new(Arc::new(chain));
        let token = factory.lending_token(Network::Ethereum);

        let metadata = token.get_metadata(&[(mkr.a_token, mkr.underlying)]).await.unwrap();
        let metadata = metadata[0].as_ref().unwrap();
        assert_eq!(metadata.underlying_symbol, "MKR");
        assert_eq!(metadata.symbol, "aMKR");
    }

    #[test]
    fn test_bytes32_symbol_trims_padding() {
        assert_eq!(bytes32_symbol(B256::right_padding_from(b"SAI")), Some("SAI".to_string()));
        assert_eq!(bytes32_symbol(B256::ZERO), None);
        assert_eq!(bytes32_symbol(B256::right_padding_from(&[0xff, 0xfe])), None);
    }

    #[tokio::test]
    async fn test_underlying_decimals_are_not_read() {
        let usdc = MockReserve::new("USDC", 1);
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, usdc.clone());
        chain.fail_call(ILendingToken::decimalsCall::SELECTOR, usdc.underlying);
        let factory = ContractFactory::new(Arc::new(chain));
        let token = factory.lending_token(Network::Ethereum);

        let metadata = token.get_metadata(&[(usdc.a_token, usdc.underlying)]).await.unwrap();
        assert!(metadata[0].is_ok());
    }

    #[tokio::test]
    async fn test_balances_in_one_batch() {
        let usdc = MockReserve::new("USDC", 1);
        let owner = address!("00000000000000000000000000000000000000b0");
        let mut chain = MockChain::new();
        chain.add_reserve(PROVIDER, usdc.clone());
        chain.set_balance(usdc.a_token, owner, U256::from(25_000_000u64));
        chain.fail_call(ILendingToken::balanceOfCall::SELECTOR, usdc.stable_debt_token);
        let chain = Arc::new(chain);
        let token = ContractFactory::new(chain.clone()).lending_token(Network::Ethereum);

        let balances = token
            .get_balances(&[usdc.a_token, usdc.stable_debt_token, usdc.variable_debt_token], owner)
            .await
            .unwrap();
        assert_eq!(balances[0].as_ref().unwrap(), &U256::from(25_000_000u64));
        assert!(matches!(balances[1], Err(AccessError::Reverted { .. })));
        assert_eq!(balances[2].as_ref().unwrap(), &U256::ZERO);
        assert_eq!(chain.batch_sizes(), vec![3]);
    }
}
