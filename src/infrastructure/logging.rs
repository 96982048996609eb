//! Tracing initialization: console output always, plus an optional
//! daily-rolling file appender whose worker guard is parked in a global
//! so the writer stays alive for the process lifetime.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize the global subscriber. `RUST_LOG` overrides the configured
/// level; noisy dependency targets are capped unless trace is requested.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let mut filter = EnvFilter::new(&config.level);
            if !config.level.eq_ignore_ascii_case("trace") {
                for directive in [
                    "sqlx::query=warn",
                    "headless_chrome=warn",
                    "tungstenite=warn",
                    "html5ever=warn",
                ] {
                    filter = filter.add_directive(
                        directive
                            .parse()
                            .with_context(|| format!("bad log directive {directive:?}"))?,
                    );
                }
            }
            filter
        }
    };

    let console_layer = fmt::Layer::new()
        .with_writer(std::io::stdout)
        .with_target(false);
    let registry = Registry::default().with(filter);

    if config.file_output {
        std::fs::create_dir_all(&config.dir)
            .with_context(|| format!("failed to create log directory {:?}", config.dir))?;
        let file_appender = rolling::daily(&config.dir, "trolley.log");
        let (file_writer, guard) = non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_target(false)
            .with_ansi(false);
        registry.with(console_layer).with(file_layer).init();
    } else {
        registry.with(console_layer).init();
    }

    info!(level = %config.level, file_output = config.file_output, "logging initialized");
    Ok(())
}
