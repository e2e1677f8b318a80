//! Diagnostic tool - Check configuration
//!
//! Run with: cargo run --bin diagnose

use std::env;
use std::str::FromStr;

use lending_positions::apps::{aave_v2, nereus_finance};
use lending_positions::config::Config;
use lending_positions::network::Network;

/// First 30 and last 15 characters of long URLs
fn shorten(url: &str) -> String {
    let chars = url.chars().count();
    if chars > 50 {
        let head: String = url.chars().take(30).collect();
        let tail: String = url.chars().skip(chars - 15).collect();
        format!("{}...{}", head, tail)
    } else {
        url.to_string()
    }
}

fn main() {
    println!("🔍 LENDING POSITIONS DIAGNOSTIC CHECK\n");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Could not load configuration: {}", e);
            return;
        }
    };

    println!("═══════════════════════════════════════════════════");
    println!("                     RPC URLS                       ");
    println!("═══════════════════════════════════════════════════\n");

    for network in Network::ALL {
        match config.rpc_urls.get(network.name()) {
            Some(url) => println!("  {:<10} ✅ {}", network.name(), shorten(url)),
            None => println!("  {:<10} ❌ Not set ({})", network.name(), network.rpc_env_var()),
        }
    }

    println!("\n═══════════════════════════════════════════════════");
    println!("                      MARKETS                       ");
    println!("═══════════════════════════════════════════════════\n");

    for (network, provider) in aave_v2::PROVIDERS {
        let overridden = config
            .markets
            .iter()
            .any(|m| m.app_id == aave_v2::APP_ID && Network::from_str(&m.network).ok() == Some(*network));
        let marker = if overridden { "(overridden)" } else { "(built-in)" };
        println!("  {} on {}: {} {}", aave_v2::APP_ID, network, provider, marker);
    }

    let nereus = config
        .markets
        .iter()
        .find(|m| m.app_id == nereus_finance::APP_ID)
        .map(|m| (m.provider_address.as_str(), "(from config)"))
        .unwrap_or((nereus_finance::AVALANCHE_PROVIDER, "(built-in, unverified)"));
    println!("  {} on avalanche: {} {}", nereus_finance::APP_ID, nereus.0, nereus.1);

    if env::var("NEREUS_PROVIDER_ADDRESS").is_err() {
        println!("    └─ set NEREUS_PROVIDER_ADDRESS to override");
    }

    println!("\n═══════════════════════════════════════════════════");
    println!("                     STATUS                         ");
    println!("═══════════════════════════════════════════════════\n");

    println!("  Multicall: {} (max {} calls/batch)", config.multicall_address, config.max_calls_per_batch);
    println!("  Static prices: {}", config.prices.len());

    match config.validate() {
        Ok(()) => println!("\n✅ Configuration is valid, {} network(s) will be scanned\n", config.networks().len()),
        Err(e) => println!("\n❌ {}\n", e),
    }
}
