//! Position scanner
//!
//! Runs every fetcher of every app concurrently. Markets fail on their own:
//! a market whose discovery fails contributes an error and no positions,
//! the others are unaffected.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::apps::LendingApp;
use crate::error::PositionError;
use crate::network::Network;
use crate::template::{serialize_address, BalanceReport, FetchReport, Position, PositionFetcher, PositionRole, TokenBalance};

/// Result of one fetcher in a scan
#[derive(Debug)]
pub struct MarketReport<R = FetchReport> {
    pub app_id: String,
    pub network: Network,
    pub role: PositionRole,
    pub provider: Address,
    pub result: Result<R, PositionError>,
}

impl<R> MarketReport<R> {
    fn error(&self) -> Option<&PositionError> {
        self.result.as_ref().err()
    }
}

impl MarketReport<BalanceReport> {
    /// Empty when the market failed
    pub fn balances(&self) -> &[TokenBalance] {
        match &self.result {
            Ok(report) => &report.balances,
            Err(_) => &[],
        }
    }
}

impl MarketReport {
    /// Empty when the market failed
    pub fn positions(&self) -> &[Position] {
        match &self.result {
            Ok(report) => &report.positions,
            Err(_) => &[],
        }
    }
}

#[derive(Debug)]
pub struct ScanSummary {
    pub fetched_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub reports: Vec<MarketReport>,
}

impl ScanSummary {
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.reports.iter().flat_map(|r| r.positions())
    }

    /// Market-level failures
    pub fn market_errors(&self) -> impl Iterator<Item = &PositionError> {
        self.reports.iter().filter_map(|r| r.error())
    }

    /// Positions dropped inside otherwise healthy markets
    pub fn dropped(&self) -> impl Iterator<Item = &PositionError> {
        self.reports
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .flat_map(|r| r.failures.iter())
    }

    /// Sum of signed liquidity, i.e. supplied minus borrowed
    pub fn net_liquidity(&self) -> f64 {
        self.positions().map(|p| p.liquidity()).sum()
    }

    pub fn export(&self, include_inactive: bool) -> ScanExport<'_> {
        ScanExport {
            fetched_at: self.fetched_at,
            positions: self
                .positions()
                .filter(|p| include_inactive || p.is_active())
                .collect(),
            market_errors: self.market_errors().map(|e| e.to_string()).collect(),
            dropped: self.dropped().map(|e| e.to_string()).collect(),
        }
    }
}

/// JSON view of a scan
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanExport<'a> {
    pub fetched_at: DateTime<Utc>,
    pub positions: Vec<&'a Position>,
    pub market_errors: Vec<String>,
    pub dropped: Vec<String>,
}

/// One owner's balances across every scanned market
#[derive(Debug)]
pub struct BalanceSummary {
    pub owner: Address,
    pub fetched_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub reports: Vec<MarketReport<BalanceReport>>,
}

impl BalanceSummary {
    pub fn balances(&self) -> impl Iterator<Item = &TokenBalance> {
        self.reports.iter().flat_map(|r| r.balances())
    }

    pub fn market_errors(&self) -> impl Iterator<Item = &PositionError> {
        self.reports.iter().filter_map(|r| r.error())
    }

    pub fn dropped(&self) -> impl Iterator<Item = &PositionError> {
        self.reports
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .flat_map(|r| r.failures.iter())
    }

    /// Supplied minus borrowed, in USD
    pub fn net_value(&self) -> f64 {
        self.balances().map(|b| b.balance_usd).sum()
    }

    pub fn export(&self) -> BalanceExport<'_> {
        BalanceExport {
            owner: self.owner,
            fetched_at: self.fetched_at,
            net_value: self.net_value(),
            balances: self.balances().collect(),
            market_errors: self.market_errors().map(|e| e.to_string()).collect(),
            dropped: self.dropped().map(|e| e.to_string()).collect(),
        }
    }
}

/// JSON view of a balance scan
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceExport<'a> {
    #[serde(serialize_with = "serialize_address")]
    pub owner: Address,
    pub fetched_at: DateTime<Utc>,
    pub net_value: f64,
    pub balances: Vec<&'a TokenBalance>,
    pub market_errors: Vec<String>,
    pub dropped: Vec<String>,
}

pub struct PositionScanner {
    fetchers: Vec<Box<dyn PositionFetcher>>,
}

impl PositionScanner {
    pub fn new(fetchers: Vec<Box<dyn PositionFetcher>>) -> Self {
        Self { fetchers }
    }

    pub fn from_apps(apps: &[Box<dyn LendingApp>]) -> Self {
        Self::new(apps.iter().flat_map(|app| app.fetchers()).collect())
    }

    /// Keep only fetchers matching the given app and network
    pub fn filter(mut self, app_id: Option<&str>, network: Option<Network>) -> Self {
        self.fetchers.retain(|f| {
            app_id.map_or(true, |id| f.app_id() == id) && network.map_or(true, |n| f.network() == n)
        });
        self
    }

    /// Drop fetchers for networks with no RPC access
    pub fn only_networks(mut self, networks: &[Network]) -> Self {
        self.fetchers.retain(|f| networks.contains(&f.network()));
        self
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    pub async fn scan(&self) -> ScanSummary {
        let start = Instant::now();
        let fetched_at = Utc::now();

        let results = join_all(self.fetchers.iter().map(|f| f.fetch())).await;

        let summary = ScanSummary {
            fetched_at,
            elapsed: start.elapsed(),
            reports: self.reports(results),
        };

        info!(
            "Scan complete: {} positions from {} fetchers ({} market errors, {} dropped) in {:?}",
            summary.positions().count(),
            self.fetchers.len(),
            summary.market_errors().count(),
            summary.dropped().count(),
            summary.elapsed
        );

        summary
    }

    /// Balances of `owner` in every market
    pub async fn scan_balances(&self, owner: Address) -> BalanceSummary {
        let start = Instant::now();
        let fetched_at = Utc::now();

        let results = join_all(self.fetchers.iter().map(|f| f.fetch_balances(owner))).await;

        let summary = BalanceSummary {
            owner,
            fetched_at,
            elapsed: start.elapsed(),
            reports: self.reports(results),
        };

        info!(
            "Balance scan for {:#x}: {} balances from {} fetchers ({} market errors, {} dropped) in {:?}",
            owner,
            summary.balances().count(),
            self.fetchers.len(),
            summary.market_errors().count(),
            summary.dropped().count(),
            summary.elapsed
        );

        summary
    }

    /// Pair results with the fetchers that produced them
    fn reports<R>(&self, results: Vec<Result<R, PositionError>>) -> Vec<MarketReport<R>> {
        self.fetchers
            .iter()
            .zip(results)
            .map(|(fetcher, result)| {
                if let Err(e) = &result {
                    warn!("Market fetch failed: {}", e);
                }
                MarketReport {
                    app_id: fetcher.app_id().to_string(),
                    network: fetcher.network(),
                    role: fetcher.role(),
                    provider: fetcher.provider_address(),
                    result,
                }
            })
            .collect()
    }
}
