//! Lending Positions - scan Aave V2 style markets
//!
//! Run with: cargo run -- [--config positions.toml] [--app aave-v2] [--network polygon] [--json]
//!           cargo run -- --owner 0x... [--json]

use alloy_primitives::Address;
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_positions::apps::{build_apps, APP_IDS};
use lending_positions::config::Config;
use lending_positions::contracts::{ContractFactory, RpcAggregator};
use lending_positions::network::Network;
use lending_positions::prices::StaticPriceSource;
use lending_positions::scanner::{BalanceSummary, PositionScanner, ScanSummary};

#[derive(Parser, Debug)]
#[command(name = "lending-positions", about = "Supply and debt positions of Aave V2 style lending markets")]
struct Args {
    /// TOML config file. Falls back to environment variables when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only scan this app (aave-v2, nereus-finance)
    #[arg(long)]
    app: Option<String>,

    /// Only scan this network
    #[arg(long)]
    network: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Keep positions with zero liquidity
    #[arg(long)]
    include_inactive: bool,

    /// Show this account's balances instead of market positions
    #[arg(long)]
    owner: Option<Address>,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" LENDING POSITIONS - Aave V2 markets").cyan().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn print_table(summary: &ScanSummary, include_inactive: bool) {
    for report in &summary.reports {
        let header = format!(
            "{} / {} / {} ({:#x})",
            report.app_id, report.network, report.role, report.provider
        );

        match &report.result {
            Ok(fetched) => {
                println!("{}", style(header).bold());
                for position in fetched.positions.iter().filter(|p| include_inactive || p.is_active()) {
                    let liquidity = position.liquidity();
                    let liquidity = if liquidity < 0.0 {
                        style(format!("{:>16.2}", liquidity)).red()
                    } else {
                        style(format!("{:>16.2}", liquidity)).green()
                    };
                    println!(
                        "  {:<10} {:<22} {:>8.2}%  ${} {:#x}",
                        position.display_props.label,
                        position.display_props.label_detailed,
                        position.data_props.apy * 100.0,
                        liquidity,
                        position.address
                    );
                }
                for failure in &fetched.failures {
                    println!("  {} {}", style("skipped:").yellow(), failure);
                }
            }
            Err(e) => {
                println!("{}", style(header).bold().dim());
                println!("  {} {}", style("failed:").red(), e);
            }
        }
        println!();
    }

    println!(
        "{} positions, {} failed markets, {} skipped tokens, net liquidity ${:.2} ({:?})",
        style(summary.positions().filter(|p| include_inactive || p.is_active()).count()).cyan(),
        summary.market_errors().count(),
        summary.dropped().count(),
        summary.net_liquidity(),
        summary.elapsed
    );
}

fn print_balances(summary: &BalanceSummary) {
    println!("{}", style(format!("Balances of {:#x}", summary.owner)).bold());
    for report in &summary.reports {
        if let Err(e) = &report.result {
            println!(
                "  {} {} / {} / {}: {}",
                style("failed:").red(),
                report.app_id,
                report.network,
                report.role,
                e
            );
            continue;
        }
        for balance in report.balances() {
            let value = if balance.balance_usd < 0.0 {
                style(format!("{:>16.2}", balance.balance_usd)).red()
            } else {
                style(format!("{:>16.2}", balance.balance_usd)).green()
            };
            println!(
                "  {:<16} {:<10} {:<16} {:>18.6} {:<22} ${}",
                balance.app_id,
                balance.network.name(),
                balance.group_id,
                balance.balance,
                balance.symbol,
                value
            );
        }
    }
    for failure in summary.dropped() {
        println!("  {} {}", style("skipped:").yellow(), failure);
    }

    println!();
    println!(
        "{} balances, {} failed markets, net value ${:.2} ({:?})",
        style(summary.balances().count()).cyan(),
        summary.market_errors().count(),
        summary.net_value(),
        summary.elapsed
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lending_positions=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    let network = args.network.as_deref().map(Network::from_str).transpose()?;
    if let Some(app) = &args.app {
        if !APP_IDS.contains(&app.as_str()) {
            return Err(eyre!("Unknown app '{}', expected one of {}", app, APP_IDS.join(", ")));
        }
    }

    if !args.json {
        print_banner();
        config.print_summary();
        println!();
    }

    let aggregator = RpcAggregator::new(config.rpc_url_map())
        .with_multicall(config.multicall()?)
        .with_max_calls_per_batch(config.max_calls_per_batch);
    let contracts = ContractFactory::new(Arc::new(aggregator));
    let prices = Arc::new(StaticPriceSource::from_config(&config)?);
    info!("Loaded {} static prices", prices.len());

    let apps = build_apps(&config, contracts, prices)?;

    let scanner = PositionScanner::from_apps(&apps)
        .only_networks(&config.networks())
        .filter(args.app.as_deref(), network);
    if scanner.is_empty() {
        return Err(eyre!("Nothing to scan: no market matches the filters and configured RPC URLs"));
    }
    info!("Scanning {} markets", scanner.len());

    if let Some(owner) = args.owner {
        let summary = scanner.scan_balances(owner).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary.export())?);
        } else {
            print_balances(&summary);
        }
        return Ok(());
    }

    let summary = scanner.scan().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary.export(args.include_inactive))?);
    } else {
        print_table(&summary, args.include_inactive);
    }

    Ok(())
}
