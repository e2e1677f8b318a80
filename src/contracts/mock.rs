//! In-memory chain for tests
//!
//! Decodes Multicall3 call descriptors by selector and answers from canned
//! reserve state, with switches to make contracts, single calls or whole
//! networks fail.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::multicall::{CallAggregator, CallOutcome};
use super::{ILendingToken, IMulticall3, IProtocolDataProvider};
use crate::error::AccessError;
use crate::network::Network;

/// Address with a seed in the first byte and a role tag in the last
pub(crate) fn mock_address(seed: u8, tag: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = seed;
    bytes[19] = tag;
    Address::from(bytes)
}

fn ray(percent: u64) -> U256 {
    U256::from(percent) * U256::from(10u64).pow(U256::from(25u64))
}

#[derive(Debug, Clone)]
pub(crate) struct MockReserve {
    pub symbol: String,
    pub decimals: u8,
    pub underlying: Address,
    pub a_token: Address,
    pub stable_debt_token: Address,
    pub variable_debt_token: Address,
    pub liquidity_rate: U256,
    pub variable_borrow_rate: U256,
    pub stable_borrow_rate: U256,
    pub liquidation_threshold: U256,
    pub collateral: bool,
    pub a_token_supply: U256,
    pub stable_debt_supply: U256,
    pub variable_debt_supply: U256,
}

impl MockReserve {
    /// 6-decimal reserve: 3% supply, 5% variable, 8% stable, 85% threshold,
    /// 1000 supplied, 100 stable debt, 400 variable debt
    pub fn new(symbol: &str, seed: u8) -> Self {
        let unit = U256::from(1_000_000u64);
        Self {
            symbol: symbol.to_string(),
            decimals: 6,
            underlying: mock_address(seed, 0x01),
            a_token: mock_address(seed, 0x0a),
            stable_debt_token: mock_address(seed, 0x5d),
            variable_debt_token: mock_address(seed, 0x7d),
            liquidity_rate: ray(3),
            variable_borrow_rate: ray(5),
            stable_borrow_rate: ray(8),
            liquidation_threshold: U256::from(8500u64),
            collateral: true,
            a_token_supply: U256::from(1000u64) * unit,
            stable_debt_supply: U256::from(100u64) * unit,
            variable_debt_supply: U256::from(400u64) * unit,
        }
    }
}

#[derive(Debug, Clone)]
struct MockToken {
    symbol: String,
    decimals: u8,
    total_supply: U256,
    underlying: Option<Address>,
}

#[derive(Default)]
pub(crate) struct MockChain {
    markets: HashMap<Address, Vec<MockReserve>>,
    tokens: HashMap<Address, MockToken>,
    unreachable: HashSet<Address>,
    failing: HashSet<([u8; 4], Address)>,
    offline: HashSet<Network>,
    legacy_symbols: HashSet<Address>,
    balances: HashMap<(Address, Address), U256>,
    batches: Mutex<Vec<usize>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reserve under `provider` along with its four tokens
    pub fn add_reserve(&mut self, provider: Address, reserve: MockReserve) {
        let token = |symbol: String, total_supply: U256, underlying: Option<Address>| MockToken {
            symbol,
            decimals: reserve.decimals,
            total_supply,
            underlying,
        };

        self.tokens.insert(
            reserve.underlying,
            token(reserve.symbol.clone(), U256::from(10u64).pow(U256::from(15u64)), None),
        );
        self.tokens.insert(
            reserve.a_token,
            token(format!("a{}", reserve.symbol), reserve.a_token_supply, Some(reserve.underlying)),
        );
        self.tokens.insert(
            reserve.stable_debt_token,
            token(
                format!("stableDebt{}", reserve.symbol),
                reserve.stable_debt_supply,
                Some(reserve.underlying),
            ),
        );
        self.tokens.insert(
            reserve.variable_debt_token,
            token(
                format!("variableDebt{}", reserve.symbol),
                reserve.variable_debt_supply,
                Some(reserve.underlying),
            ),
        );

        self.markets.entry(provider).or_default().push(reserve);
    }

    /// Every call to `target` reverts
    pub fn make_unreachable(&mut self, target: Address) {
        self.unreachable.insert(target);
    }

    /// Revert one read. `subject` is the asset argument for provider reads
    /// and the token address for token reads.
    pub fn fail_call(&mut self, selector: [u8; 4], subject: Address) {
        self.failing.insert((selector, subject));
    }

    /// `token` answers `symbol()` with a NUL-padded bytes32
    pub fn use_bytes32_symbol(&mut self, token: Address) {
        self.legacy_symbols.insert(token);
    }

    pub fn set_balance(&mut self, token: Address, owner: Address, amount: U256) {
        self.balances.insert((token, owner), amount);
    }

    /// Whole round trips on `network` fail at the transport level
    pub fn take_offline(&mut self, network: Network) {
        self.offline.insert(network);
    }

    /// Size of every batch served so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    fn respond(&self, call: &IMulticall3::Call3) -> Option<Vec<u8>> {
        if self.unreachable.contains(&call.target) {
            return None;
        }

        let data: &[u8] = &call.callData;
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;

        if let Some(reserves) = self.markets.get(&call.target) {
            return self.respond_provider(reserves, selector, data);
        }

        if self.failing.contains(&(selector, call.target)) {
            return None;
        }

        let token = self.tokens.get(&call.target)?;
        if selector == ILendingToken::UNDERLYING_ASSET_ADDRESSCall::SELECTOR {
            token.underlying.map(|u| (u,).abi_encode_params())
        } else if selector == ILendingToken::symbolCall::SELECTOR {
            if self.legacy_symbols.contains(&call.target) {
                Some((B256::right_padding_from(token.symbol.as_bytes()),).abi_encode_params())
            } else {
                Some((token.symbol.clone(),).abi_encode_params())
            }
        } else if selector == ILendingToken::decimalsCall::SELECTOR {
            Some((U256::from(token.decimals),).abi_encode_params())
        } else if selector == ILendingToken::totalSupplyCall::SELECTOR {
            Some((token.total_supply,).abi_encode_params())
        } else if selector == ILendingToken::balanceOfCall::SELECTOR {
            let owner = Address::from_slice(data.get(16..36)?);
            let balance = self.balances.get(&(call.target, owner)).copied().unwrap_or_default();
            Some((balance,).abi_encode_params())
        } else {
            None
        }
    }

    fn respond_provider(&self, reserves: &[MockReserve], selector: [u8; 4], data: &[u8]) -> Option<Vec<u8>> {
        if selector == IProtocolDataProvider::getAllReservesTokensCall::SELECTOR {
            let list: Vec<(String, Address)> = reserves
                .iter()
                .map(|r| (r.symbol.clone(), r.underlying))
                .collect();
            return Some((list,).abi_encode_params());
        }

        // Remaining provider reads take the asset as their only argument
        let asset = Address::from_slice(data.get(16..36)?);
        if self.failing.contains(&(selector, asset)) {
            return None;
        }
        let reserve = reserves.iter().find(|r| r.underlying == asset)?;

        if selector == IProtocolDataProvider::getReserveTokensAddressesCall::SELECTOR {
            Some(
                (reserve.a_token, reserve.stable_debt_token, reserve.variable_debt_token)
                    .abi_encode_params(),
            )
        } else if selector == IProtocolDataProvider::getReserveDataCall::SELECTOR {
            Some(
                (
                    U256::from(500u64),
                    reserve.stable_debt_supply,
                    reserve.variable_debt_supply,
                    reserve.liquidity_rate,
                    reserve.variable_borrow_rate,
                    reserve.stable_borrow_rate,
                    reserve.stable_borrow_rate,
                    ray(100),
                    ray(100),
                    U256::from(1_700_000_000u64),
                )
                    .abi_encode_params(),
            )
        } else if selector == IProtocolDataProvider::getReserveConfigurationDataCall::SELECTOR {
            Some(
                (
                    U256::from(reserve.decimals),
                    U256::from(8000u64),
                    reserve.liquidation_threshold,
                    U256::from(10500u64),
                    U256::from(1000u64),
                    reserve.collateral,
                    true,
                    true,
                    true,
                    false,
                )
                    .abi_encode_params(),
            )
        } else {
            None
        }
    }
}

#[async_trait]
impl CallAggregator for MockChain {
    async fn aggregate(
        &self,
        network: Network,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<CallOutcome>, AccessError> {
        if self.offline.contains(&network) {
            return Err(AccessError::Rpc(format!("{} endpoint unreachable", network)));
        }

        self.batches.lock().unwrap().push(calls.len());

        Ok(calls
            .iter()
            .map(|call| match self.respond(call) {
                Some(data) => CallOutcome {
                    success: true,
                    return_data: Bytes::from(data),
                },
                None => CallOutcome {
                    success: false,
                    return_data: Bytes::new(),
                },
            })
            .collect())
    }
}
