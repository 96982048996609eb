//! Layered application configuration.
//!
//! Values resolve in order: coded defaults, then an optional
//! `trolley.toml` next to the working directory, then `TROLLEY_*`
//! environment variables (`TROLLEY_DATABASE__URL`, `TROLLEY_LOGGING__LEVEL`
//! and so on, `__` separating sections).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub crawl: CrawlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/trolley.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User agent presented to the retailer sites. A mobile profile keeps
    /// the markup closer to what the adapters were written against.
    pub user_agent: String,
    /// Hard cap on a single page load.
    pub page_timeout_secs: u64,
    /// Post-load delay letting script-driven content settle.
    pub settle_delay_ms: u64,
    /// How long `fetch_and_wait` blocks on the listing selector.
    pub listing_wait_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148"
                .to_string(),
            page_timeout_secs: 60,
            settle_delay_ms: 5000,
            listing_wait_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Category names worth crawling; discovered categories outside this
    /// list are persisted but never paginated. Mixed casing mirrors how
    /// the retailers label them.
    pub allowed_categories: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            allowed_categories: [
                "bakery",
                "fresh food",
                "frozen food",
                "Bakery & Cakes",
                "Fresh",
                "Frozen",
                "fresh",
                "frozen",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Directory the rolling log files land in.
    pub dir: String,
    /// Whether to write log files at all (console output is always on).
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the layered sources.
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(File::with_name("trolley").required(false))
            .add_source(Environment::with_prefix("TROLLEY").separator("__"))
            .build()
            .context("failed to assemble configuration sources")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

impl CrawlConfig {
    /// Whether a discovered category is on the crawl allow-list.
    pub fn is_allowed(&self, category_name: &str) -> bool {
        self.allowed_categories
            .iter()
            .any(|allowed| allowed == category_name)
    }
}
