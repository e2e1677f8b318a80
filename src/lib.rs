//! Lending Positions
//!
//! Discovers the supply and debt tokens of Aave V2 style lending markets and
//! turns them into priced, labelled positions. Products built on the Aave V2
//! codebase (Nereus Finance) reuse the same pipeline against their own market.

pub mod apps;
pub mod config;
pub mod contracts;
pub mod error;
pub mod network;
pub mod prices;
pub mod scanner;
pub mod template;
