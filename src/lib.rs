//! Gator - A command-line RSS feed aggregator
//!
//! Users register, follow feeds by URL, and run aggregation cycles that
//! fetch the least recently fetched feeds in round-robin order.

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod render;
pub mod router;
pub mod scheduler;
pub mod session;
