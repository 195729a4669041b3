//! ClickHouse HTTP interface.

pub mod client;
pub mod errors;
pub mod executor;

pub use client::{ClickHouseClient, ClickHouseConfig};
pub use errors::ClickHouseError;
pub use executor::{fetch, QueryExecutor};
