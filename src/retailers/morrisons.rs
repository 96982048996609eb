//! Morrisons adapter.
//!
//! Categories render on a single page, so there is no pagination URL to
//! build. All catalog links are served under a `/browse` prefix that the
//! product detail pages do not use, so part URLs are stored with the
//! prefix stripped and re-joined against the bare host.

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::{error, warn};

use crate::domain::allergens;
use crate::domain::entities::{ParsedCategory, ParsedProduct, ProductDetails};

use super::{
    compile, details_from_strings, element_text, join_url, normalize_image_src,
    parse_price_pence, parse_price_pounds, select_text, Retailer,
};

pub struct Morrisons {
    category_item: Selector,
    category_link: Selector,
    product_wrapper: Selector,
    product_name: Selector,
    product_price: Selector,
    product_link: Selector,
    product_image: Selector,
    detail_info: Selector,
    detail_table: Selector,
    detail_row: Selector,
    detail_cell: Selector,
}

impl Morrisons {
    pub fn new() -> Result<Self> {
        Ok(Self {
            category_item: compile("li.level-item.has-children")?,
            category_link: compile("a[href]")?,
            product_wrapper: compile("div.fop-contentWrapper")?,
            product_name: compile("h4.fop-title span")?,
            product_price: compile("span.fop-price")?,
            product_link: compile("a[href]")?,
            product_image: compile("img.fop-img")?,
            detail_info: compile("div.bop-info__content")?,
            detail_table: compile("tbody")?,
            detail_row: compile("tr")?,
            detail_cell: compile("td")?,
        })
    }

    /// Per-100g values from the nutrition table, in row order. The final
    /// row is the reference-intake footer and is dropped; the gram suffix
    /// is stripped from each value.
    fn nutrition_values(&self, document: &Html) -> Vec<String> {
        let Some(table) = document.select(&self.detail_table).next() else {
            warn!("Morrisons detail page without a nutrition table");
            return Vec::new();
        };

        let mut values = Vec::new();
        for row in table.select(&self.detail_row) {
            let cells: Vec<_> = row.select(&self.detail_cell).collect();
            if cells.len() >= 2 {
                values.push(element_text(cells[1]).replace('g', ""));
            }
        }
        values.pop();
        values
    }
}

impl Retailer for Morrisons {
    fn name(&self) -> &str {
        "Morrisons"
    }

    fn logo_url(&self) -> &str {
        "https://groceries.morrisons.com/static/morrisonslogo-fe24a.svg"
    }

    fn base_url(&self) -> &str {
        "https://groceries.morrisons.com/browse"
    }

    // Single-page categories.
    fn build_url(&self, _url: &str, _page: u32) -> Option<String> {
        None
    }

    fn detail_url(&self, part_url: &str) -> String {
        join_url(&self.base_url().replace("/browse", ""), part_url)
    }

    fn parse_categories(&self, html: Option<&str>) -> Vec<ParsedCategory> {
        let Some(html) = html else {
            error!("category page for Morrisons was not fetched");
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut categories = Vec::new();

        for item in document.select(&self.category_item) {
            let name = item
                .select(&self.category_link)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty());

            let part_url = item
                .select(&self.category_link)
                .filter_map(|a| a.value().attr("href"))
                .next()
                .map(|href| {
                    let trimmed = match href.find('?') {
                        Some(pos) => &href[..pos],
                        None => href,
                    };
                    trimmed.replace("/browse", "")
                });

            match (name, part_url) {
                (Some(name), Some(part_url)) => categories.push(ParsedCategory { name, part_url }),
                _ => warn!("skipping Morrisons category entry without a usable name/link pair"),
            }
        }
        categories
    }

    fn parse_products(&self, html: Option<&str>) -> Vec<ParsedProduct> {
        let Some(html) = html else {
            error!("product page for Morrisons was not fetched");
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut products = Vec::new();

        for wrapper in document.select(&self.product_wrapper) {
            let mut product = ParsedProduct::default();

            product.name = select_text(wrapper, &self.product_name);

            if let Some(price_text) = select_text(wrapper, &self.product_price) {
                // Sub-pound prices render as "45p", everything else as "£1.50".
                let parsed = if !price_text.starts_with('£') && price_text.contains('p') {
                    parse_price_pence(&price_text)
                } else {
                    parse_price_pounds(&price_text)
                };
                match parsed {
                    Ok(price) => product.price = Some(price),
                    Err(e) => {
                        warn!(name = ?product.name, %e, "dropping unparsable Morrisons price")
                    }
                }
            }

            product.part_url = wrapper
                .select(&self.product_link)
                .filter_map(|a| a.value().attr("href"))
                .next()
                .map(|href| href.replace("/browse", ""));

            product.image_url = wrapper
                .select(&self.product_image)
                .filter_map(|img| img.value().attr("src"))
                .next()
                .map(|src| {
                    normalize_image_src(&format!("https://groceries.morrisons.com{src}"))
                });

            products.push(product);
        }
        products
    }

    fn parse_product_details(&self, html: Option<&str>) -> Option<ProductDetails> {
        let Some(html) = html else {
            error!("detail page for Morrisons was not fetched");
            return None;
        };
        let document = Html::parse_document(html);

        let mut found = Vec::new();
        for block in document.select(&self.detail_info) {
            allergens::merge(&mut found, allergens::scan(&element_text(block)));
        }

        let values = self.nutrition_values(&document);
        Some(details_from_strings(self.name(), &values, found))
    }
}
