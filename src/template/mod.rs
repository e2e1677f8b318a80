//! Template position fetcher for lending markets
//!
//! - `reserve`: raw provider values -> domain shapes
//! - `position`: the output model
//! - `fetcher`: the shared pipeline and its extension points

mod fetcher;
mod position;
mod reserve;

pub use fetcher::{
    BalanceReport, FetchReport, LendingMarket, LendingTokenFetcher, LendingTokenStrategy, PositionFetcher, RoleToken,
};
pub use position::{
    serialize_address, AppTokenContext, DataProps, DisplayProps, Position, PositionRole, TokenBalance,
};
pub use reserve::{
    from_units, to_reserve_apy, to_reserve_configuration, to_reserve_token_addresses, u256_to_f64, ReserveApy,
    ReserveConfiguration, ReserveTokenAddresses, PERCENTAGE_FACTOR, RAY,
};
