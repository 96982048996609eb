//! Rendered-page retrieval through a headless browser.
//!
//! Every call launches its own browser so no cookies, storage or crashed
//! renderer state leaks between pages. The `Browser` guard kills the
//! Chrome process when it drops, which covers every exit path out of the
//! blocking closure. Callers get `Option<String>`; transport and render
//! failures are logged here and never surface as errors.

use std::ffi::OsStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use tracing::{error, info, warn};

use crate::infrastructure::config::FetcherConfig;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load a page and return its rendered HTML after the settle delay.
    async fn fetch(&self, url: &str) -> Option<String>;

    /// Like [`fetch`](Self::fetch), but block until `selector` becomes
    /// visible first. A wait timeout means "no more content here" and
    /// returns `None` without an error.
    async fn fetch_and_wait(&self, url: &str, selector: &str) -> Option<String>;
}

/// One isolated headless-Chrome session per call, run on the blocking
/// thread pool since the browser API is synchronous.
pub struct ChromeFetcher {
    config: FetcherConfig,
}

impl ChromeFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    async fn render(&self, url: String, wait_selector: Option<String>) -> Option<String> {
        info!(%url, "fetching page");
        let config = self.config.clone();
        let task_url = url.clone();

        let handle = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .idle_browser_timeout(Duration::from_secs(config.page_timeout_secs))
                .args(vec![
                    OsStr::new("--disable-gpu"),
                    OsStr::new("--disable-blink-features=AutomationControlled"),
                    OsStr::new("--start-maximized"),
                ])
                .build()
                .map_err(|e| anyhow!("failed to assemble browser options: {e}"))?;

            // Dropping `browser` terminates the Chrome process, on the
            // error paths below as much as on success.
            let browser = Browser::new(options).context("failed to launch browser")?;
            let tab = browser.new_tab().context("failed to open tab")?;
            tab.set_user_agent(&config.user_agent, None, None)
                .context("failed to set user agent")?;

            tab.navigate_to(&task_url).context("navigation failed")?;
            tab.wait_until_navigated().context("page load failed")?;

            if let Some(selector) = wait_selector {
                let timeout = Duration::from_secs(config.listing_wait_timeout_secs);
                if tab
                    .wait_for_element_with_custom_timeout(&selector, timeout)
                    .is_err()
                {
                    warn!(url = %task_url, selector, "timed out waiting for element");
                    return Ok(None);
                }
            }

            std::thread::sleep(Duration::from_millis(config.settle_delay_ms));
            let html = tab.get_content().context("failed to read page content")?;
            Ok(Some(html))
        });

        match handle.await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                error!(%url, error = %e, "page fetch failed");
                None
            }
            Err(e) => {
                error!(%url, error = %e, "fetch task panicked");
                None
            }
        }
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.render(url.to_string(), None).await
    }

    async fn fetch_and_wait(&self, url: &str, selector: &str) -> Option<String> {
        self.render(url.to_string(), Some(selector.to_string()))
            .await
    }
}
