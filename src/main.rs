//! Command-line front door.
//!
//! `trolley crawl` runs the full ingestion pipeline; `trolley search
//! <term> [excluded-allergens...]` queries the existing catalog and prints
//! the grouped comparison. The search command stands in for the web
//! front end as a debugging surface.

use anyhow::{bail, Result};
use tracing::warn;

use trolley::domain::{allergens, comparison};
use trolley::infrastructure::{config::AppConfig, fetcher::ChromeFetcher, logging};
use trolley::{retailers, CatalogStore, Crawler};

const USAGE: &str = "usage: trolley <crawl | search <term> [excluded-allergens...]>";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("crawl") => crawl(config).await,
        Some("search") => {
            let Some(term) = args.get(1) else {
                bail!("{USAGE}");
            };
            search(config, term, &args[2..]).await
        }
        _ => bail!("{USAGE}"),
    }
}

async fn crawl(config: AppConfig) -> Result<()> {
    let store = CatalogStore::connect(&config.database.url).await?;
    store.migrate().await?;

    let crawler = Crawler::new(
        ChromeFetcher::new(config.fetcher),
        store,
        retailers::registry()?,
        config.crawl,
    );
    crawler.run().await
}

async fn search(config: AppConfig, term: &str, exclusions: &[String]) -> Result<()> {
    let store = CatalogStore::connect(&config.database.url).await?;
    store.migrate().await?;

    let exclusions: Vec<String> = exclusions.iter().map(|e| e.to_lowercase()).collect();
    for excluded in &exclusions {
        if !allergens::VOCABULARY.contains(&excluded.as_str()) {
            warn!(allergen = %excluded, "not in the allergen vocabulary, will never match");
        }
    }

    let outcome = comparison::compare(&store, term, &exclusions).await?;
    print_groups("Safe results", &outcome.safe);
    print_groups("Containing excluded allergens", &outcome.with_allergens);
    Ok(())
}

fn print_groups(heading: &str, groups: &[comparison::ProductGroup]) {
    println!("{heading}:");
    if groups.is_empty() {
        println!("  (none)");
        return;
    }
    for group in groups {
        println!("  {}", group.name);
        for entry in &group.entries {
            let marker = if entry.is_cheapest { " (cheapest)" } else { "" };
            println!(
                "    £{:.2}{marker}  {}",
                entry.product.price, entry.url
            );
        }
    }
}
