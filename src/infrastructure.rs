//! Infrastructure: configuration, logging, page fetching, persistence.

pub mod config;
pub mod fetcher;
pub mod logging;
pub mod store;
