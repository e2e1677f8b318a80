//! Multicall3 batching
//!
//! Reads are collected into a [`BatchRequest`], shipped as a single
//! `aggregate3` call and fanned back out by request index. Every call is
//! sent with `allowFailure = true` so one reverting contract never takes
//! the rest of the batch with it; callers decide per index what a failed
//! slot means.

use alloy_eips::BlockId;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

use super::{IMulticall3, MAX_CALLS_PER_BATCH, MULTICALL3};
use crate::error::AccessError;
use crate::network::Network;

/// Outcome of one call inside an aggregated batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

/// Executes a list of calls as one logical round trip
///
/// Implementations must return exactly one outcome per call, in order, and
/// every outcome must observe the same block.
#[async_trait]
pub trait CallAggregator: Send + Sync {
    async fn aggregate(
        &self,
        network: Network,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<CallOutcome>, AccessError>;
}

// ============================================
// RPC AGGREGATOR
// ============================================

/// Aggregator backed by Multicall3 over JSON-RPC
pub struct RpcAggregator {
    rpc_urls: HashMap<Network, String>,
    multicall: Address,
    max_calls_per_batch: usize,
}

impl RpcAggregator {
    pub fn new(rpc_urls: HashMap<Network, String>) -> Self {
        Self {
            rpc_urls,
            multicall: MULTICALL3,
            max_calls_per_batch: MAX_CALLS_PER_BATCH,
        }
    }

    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = multicall;
        self
    }

    pub fn with_max_calls_per_batch(mut self, max_calls_per_batch: usize) -> Self {
        self.max_calls_per_batch = max_calls_per_batch.max(1);
        self
    }

    pub fn supports(&self, network: Network) -> bool {
        self.rpc_urls.contains_key(&network)
    }
}

#[async_trait]
impl CallAggregator for RpcAggregator {
    async fn aggregate(
        &self,
        network: Network,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<CallOutcome>, AccessError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let rpc_url = self
            .rpc_urls
            .get(&network)
            .ok_or(AccessError::UnsupportedNetwork(network))?;

        let url = rpc_url
            .parse()
            .map_err(|e| AccessError::Rpc(format!("invalid RPC URL for {}: {}", network, e)))?;
        let provider = ProviderBuilder::new().connect_http(url);

        self.aggregate_on(&provider, network, calls).await
    }
}

impl RpcAggregator {
    /// Run `calls` through Multicall3 on an already connected provider
    pub async fn aggregate_on<P: Provider>(
        &self,
        provider: &P,
        network: Network,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<CallOutcome>, AccessError> {
        let start = Instant::now();
        let total = calls.len();

        // Chunks must all read the same block
        let block = if total > self.max_calls_per_batch {
            let number = provider
                .get_block_number()
                .await
                .map_err(|e| AccessError::Rpc(format!("eth_blockNumber failed: {}", e)))?;
            Some(BlockId::number(number))
        } else {
            None
        };

        let mut outcomes = Vec::with_capacity(total);

        for chunk in calls.chunks(self.max_calls_per_batch) {
            let calldata = IMulticall3::aggregate3Call { calls: chunk.to_vec() }.abi_encode();

            let tx = TransactionRequest::default()
                .to(self.multicall)
                .input(calldata.into());

            let mut call = provider.call(tx);
            if let Some(block) = block {
                call = call.block(block);
            }

            let result = call
                .await
                .map_err(|e| AccessError::Rpc(format!("Multicall3 failed: {}", e)))?;

            let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&result)
                .map_err(|e| AccessError::malformed(self.multicall, e))?;

            if decoded.len() != chunk.len() {
                return Err(AccessError::malformed(
                    self.multicall,
                    format!("{} results for {} calls", decoded.len(), chunk.len()),
                ));
            }

            outcomes.extend(decoded.into_iter().map(|r| CallOutcome {
                success: r.success,
                return_data: r.returnData,
            }));
        }

        debug!(
            "Multicall3 on {}: {} calls in {:?} ({} RPC calls)",
            network,
            total,
            start.elapsed(),
            total.div_ceil(self.max_calls_per_batch)
        );

        Ok(outcomes)
    }
}

// ============================================
// BATCH BUILDER
// ============================================

/// Collects read descriptors for one round trip
#[derive(Default)]
pub struct BatchRequest {
    calls: Vec<IMulticall3::Call3>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a call, returning the index its result will have
    pub fn add<C: SolCall>(&mut self, target: Address, call: &C) -> usize {
        self.calls.push(IMulticall3::Call3 {
            target,
            allowFailure: true,
            callData: call.abi_encode().into(),
        });
        self.calls.len() - 1
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub async fn execute(
        self,
        aggregator: &dyn CallAggregator,
        network: Network,
    ) -> Result<BatchResponse, AccessError> {
        let targets: Vec<Address> = self.calls.iter().map(|c| c.target).collect();
        trace!("Executing batch of {} calls on {}", targets.len(), network);

        let outcomes = aggregator.aggregate(network, self.calls).await?;

        if outcomes.len() != targets.len() {
            return Err(AccessError::Rpc(format!(
                "aggregator returned {} results for {} calls",
                outcomes.len(),
                targets.len()
            )));
        }

        Ok(BatchResponse { targets, outcomes })
    }
}

/// Results of an executed [`BatchRequest`], addressed by request index
#[derive(Debug)]
pub struct BatchResponse {
    targets: Vec<Address>,
    outcomes: Vec<CallOutcome>,
}

impl BatchResponse {
    /// Decode the result at `index` as the return value of `C`
    pub fn decode<C: SolCall>(&self, index: usize) -> Result<C::Return, AccessError> {
        let (target, outcome) = match (self.targets.get(index), self.outcomes.get(index)) {
            (Some(target), Some(outcome)) => (*target, outcome),
            _ => {
                return Err(AccessError::Rpc(format!(
                    "no result at index {} of {}",
                    index,
                    self.outcomes.len()
                )))
            }
        };

        if !outcome.success {
            return Err(AccessError::Reverted { target });
        }

        C::abi_decode_returns(&outcome.return_data).map_err(|e| AccessError::malformed(target, e))
    }
}
