//! Sequential crawl orchestration.
//!
//! One retailer runs to completion before the next starts, and within a
//! retailer one category, one page, one detail fetch at a time. The
//! store sees a single writer because of this ordering, not because of
//! any locking. There are no retries: a failed fetch or parse advances
//! to the next unit of work.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::domain::entities::Category;
use crate::infrastructure::config::CrawlConfig;
use crate::infrastructure::fetcher::PageFetcher;
use crate::infrastructure::store::CatalogStore;
use crate::retailers::{join_url, Retailer};

pub struct Crawler<F: PageFetcher> {
    fetcher: F,
    store: CatalogStore,
    retailers: Vec<Box<dyn Retailer>>,
    crawl: CrawlConfig,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(
        fetcher: F,
        store: CatalogStore,
        retailers: Vec<Box<dyn Retailer>>,
        crawl: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            retailers,
            crawl,
        }
    }

    /// Run a full crawl over every registered retailer.
    pub async fn run(&self) -> Result<()> {
        for retailer in &self.retailers {
            info!(retailer = retailer.name(), "starting crawl");
            self.crawl_retailer(retailer.as_ref()).await?;
            info!(retailer = retailer.name(), "crawl finished");
        }
        Ok(())
    }

    async fn crawl_retailer(&self, retailer: &dyn Retailer) -> Result<()> {
        let supermarket_id = self
            .store
            .upsert_supermarket(retailer.name(), retailer.logo_url(), retailer.base_url())
            .await?;

        let html = self.fetcher.fetch(retailer.base_url()).await;
        let categories = retailer.parse_categories(html.as_deref());
        self.store
            .upsert_categories(supermarket_id, &categories)
            .await?;

        for category in self.store.categories_for_supermarket(supermarket_id).await? {
            if !self.crawl.is_allowed(&category.name) {
                debug!(category = %category.name, "category not on the allow-list, skipping");
                continue;
            }
            info!(retailer = retailer.name(), category = %category.name, "crawling category");
            let inserted = self.crawl_category(retailer, &category).await?;
            info!(
                category = %category.name,
                products = inserted.len(),
                "listing pages done, fetching details"
            );
            self.fetch_details(retailer, &category, &inserted).await?;
        }
        Ok(())
    }

    /// Paginate one category's listing pages, persisting each batch.
    /// Returns the row ids inserted during this run.
    async fn crawl_category(
        &self,
        retailer: &dyn Retailer,
        category: &Category,
    ) -> Result<Vec<i64>> {
        let start_url = join_url(retailer.base_url(), &category.part_url);
        let mut inserted = Vec::new();
        let mut page: u32 = 1;

        loop {
            match retailer.build_url(&start_url, page) {
                // No pagination: a single fetch covers the category.
                None => {
                    let html = self.fetcher.fetch(&start_url).await;
                    let products = retailer.parse_products(html.as_deref());
                    inserted.extend(self.store.insert_products(category.id, &products).await?);
                    break;
                }
                Some(url) => {
                    let Some(html) = self
                        .fetcher
                        .fetch_and_wait(&url, retailer.listing_ready_selector())
                        .await
                    else {
                        // End of pagination, not an error.
                        info!(category = %category.name, page, "no more listing pages");
                        break;
                    };
                    let products = retailer.parse_products(Some(&html));
                    inserted.extend(self.store.insert_products(category.id, &products).await?);
                    page += 1;
                }
            }
        }
        Ok(inserted)
    }

    /// Fetch and persist nutrition/allergen details for the products
    /// inserted during this run.
    async fn fetch_details(
        &self,
        retailer: &dyn Retailer,
        category: &Category,
        inserted: &[i64],
    ) -> Result<()> {
        let inserted: HashSet<i64> = inserted.iter().copied().collect();

        for product in self.store.products_for_category(category.id).await? {
            if !inserted.contains(&product.id) {
                continue;
            }
            let url = retailer.detail_url(&product.part_url);
            let html = self.fetcher.fetch(&url).await;

            match retailer.parse_product_details(html.as_deref()) {
                Some(details) => {
                    self.store
                        .insert_product_details(product.id, &details)
                        .await?;
                    self.store
                        .insert_product_allergens(product.id, &details.allergens)
                        .await?;
                }
                None => {
                    warn!(product = %product.name, "no detail data, skipping");
                }
            }
        }
        Ok(())
    }
}
