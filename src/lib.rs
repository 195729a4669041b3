//! Library entrypoint for trend-engine.
//!
//! Exposes all modules so integration tests can import them.

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod query;
pub mod server;
pub mod state;
