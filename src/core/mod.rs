//! Core translation routing engine

pub mod backends;
pub mod cache;
pub mod chunker;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod rate_limiter;
pub mod retry;
pub mod router;
pub mod selector;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;
