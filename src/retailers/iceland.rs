//! Iceland adapter.
//!
//! Listing pages paginate with a `?start=N` offset of 25 products per
//! page. Category links double as category names: the site exposes no
//! separate label in its "view all" menu entries, so the path is stored
//! for both. Product images are lazy-loaded, so the recorded src may be
//! a placeholder.

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::{error, warn};

use crate::domain::allergens;
use crate::domain::entities::{ParsedCategory, ParsedProduct, ProductDetails};

use super::{
    compile, details_from_strings, element_text, parse_price_pounds, select_text, Retailer,
};

const PRODUCTS_PER_PAGE: u32 = 25;

pub struct Iceland {
    category_link: Selector,
    product_tile: Selector,
    product_name: Selector,
    product_price: Selector,
    product_image: Selector,
    detail_info: Selector,
    detail_table: Selector,
    detail_row: Selector,
    detail_cell: Selector,
}

impl Iceland {
    pub fn new() -> Result<Self> {
        Ok(Self {
            category_link: compile("a.menu-sub-cat-link.viewall")?,
            product_tile: compile("div.product-tile")?,
            product_name: compile("a.name-link")?,
            product_price: compile("span.product-sales-price")?,
            product_image: compile("img")?,
            detail_info: compile("div.product-info-content")?,
            detail_table: compile("tbody")?,
            detail_row: compile("tr")?,
            detail_cell: compile("td")?,
        })
    }

    /// Per-100g values from the nutrition table, in row order. Values
    /// carry mixed unit suffixes, which are stripped before parsing; the
    /// table may trail reference-intake rows, so only the leading nine
    /// count.
    fn nutrition_values(&self, document: &Html) -> Vec<String> {
        let Some(table) = document.select(&self.detail_table).next() else {
            warn!("Iceland detail page without a nutrition table");
            return Vec::new();
        };

        let mut values = Vec::new();
        for row in table.select(&self.detail_row) {
            let cells: Vec<_> = row.select(&self.detail_cell).collect();
            if cells.len() >= 2 {
                let cleaned = element_text(cells[1])
                    .to_lowercase()
                    .replace("kcal", "")
                    .replace("kj", "")
                    .replace('g', "")
                    .replace('<', "")
                    .trim()
                    .to_string();
                values.push(cleaned);
            }
        }
        values.truncate(9);
        values
    }
}

impl Retailer for Iceland {
    fn name(&self) -> &str {
        "Iceland"
    }

    fn logo_url(&self) -> &str {
        "https://www.bing.com/th?id=OIP.nn40kuPZtVCz-7QNSxbVUwHaHa&w=101&h=100&c=8&rs=1&qlt=90&o=6&pid=3.1&rm=2"
    }

    fn base_url(&self) -> &str {
        "https://www.iceland.co.uk/"
    }

    fn build_url(&self, url: &str, page: u32) -> Option<String> {
        Some(format!("{url}?start={}", page * PRODUCTS_PER_PAGE))
    }

    fn parse_categories(&self, html: Option<&str>) -> Vec<ParsedCategory> {
        let Some(html) = html else {
            error!("category page for Iceland was not fetched");
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut categories = Vec::new();

        for link in document.select(&self.category_link) {
            if let Some(href) = link.value().attr("href") {
                let path = href.replace(self.base_url(), "");
                categories.push(ParsedCategory {
                    name: path.clone(),
                    part_url: path,
                });
            }
        }
        categories
    }

    fn parse_products(&self, html: Option<&str>) -> Vec<ParsedProduct> {
        let Some(html) = html else {
            error!("product page for Iceland was not fetched");
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut products = Vec::new();

        for tile in document.select(&self.product_tile) {
            let mut product = ParsedProduct::default();

            product.name = select_text(tile, &self.product_name);

            if let Some(price_text) = select_text(tile, &self.product_price) {
                match parse_price_pounds(&price_text) {
                    Ok(price) => product.price = Some(price),
                    Err(e) => warn!(name = ?product.name, %e, "dropping unparsable Iceland price"),
                }
            }

            product.part_url = tile
                .select(&self.product_name)
                .filter_map(|a| a.value().attr("href"))
                .next()
                .map(|href| href.replace(self.base_url(), ""));

            // Lazy-loaded grid: the first img src may be a placeholder,
            // but it is still the only stable attribute available.
            product.image_url = tile
                .select(&self.product_image)
                .filter_map(|img| img.value().attr("src"))
                .next()
                .map(str::to_string);

            products.push(product);
        }
        products
    }

    fn parse_product_details(&self, html: Option<&str>) -> Option<ProductDetails> {
        let Some(html) = html else {
            error!("detail page for Iceland was not fetched");
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

#[cfg(test)]
mod tests {
    use super::Iceland;
    use crate::retailers::Retailer;

    const MENU: &str = r#"
        <html><body>
          <a class="menu-sub-cat-link viewall" href="https://www.iceland.co.uk/frozen">View all</a>
          <a class="menu-sub-cat-link viewall" href="https://www.iceland.co.uk/bakery">View all</a>
          <a class="menu-sub-cat-link" href="https://www.iceland.co.uk/frozen/chips">Chips</a>
        </body></html>"#;

    const LISTING: &str = r#"
        <html><body>
          <div class="product-tile">
            <a class="name-link" href="https://www.iceland.co.uk/p/garlic-bread/58707.html">Iceland Garlic Bread Baguettes</a>
            <span class="product-sales-price">£1.25</span>
            <img src="https://assets.iceland.co.uk/i/iceland/placeholder.jpg">
          </div>
        </body></html>"#;

    const DETAIL: &str = r#"
        <html><body>
          <div class="product-info-content">Wheat Flour, Garlic Butter (Milk), Parsley</div>
          <table><tbody>
            <tr><td>Energy</td><td>1180kJ</td></tr>
            <tr><td>Energy</td><td>282kcal</td></tr>
            <tr><td>Fat</td><td>12.1g</td></tr>
            <tr><td>of which saturates</td><td>7.2g</td></tr>
            <tr><td>Carbohydrate</td><td>36.6g</td></tr>
            <tr><td>of which sugars</td><td>2.8g</td></tr>
            <tr><td>Fibre</td><td>2.1g</td></tr>
            <tr><td>Protein</td><td>6.1g</td></tr>
            <tr><td>Salt</td><td>1.1g</td></tr>
            <tr><td>Reference intake</td><td>8400kJ</td></tr>
          </tbody></table>
        </body></html>"#;

    #[test]
    fn absent_pages_yield_empty_results() {
        let iceland = Iceland::new().unwrap();
        assert!(iceland.parse_categories(None).is_empty());
        assert!(iceland.parse_products(None).is_empty());
        assert!(iceland.parse_product_details(None).is_none());
    }

    #[test]
    fn pagination_uses_start_offsets_of_twenty_five() {
        let iceland = Iceland::new().unwrap();
        assert_eq!(
            iceland.build_url("https://www.iceland.co.uk/frozen", 1),
            Some("https://www.iceland.co.uk/frozen?start=25".to_string())
        );
        assert_eq!(
            iceland.build_url("https://www.iceland.co.uk/frozen", 4),
            Some("https://www.iceland.co.uk/frozen?start=100".to_string())
        );
    }

    #[test]
    fn view_all_links_become_categories() {
        let iceland = Iceland::new().unwrap();
        let categories = iceland.parse_categories(Some(MENU));
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "frozen");
        assert_eq!(categories[0].part_url, "frozen");
        assert_eq!(categories[1].part_url, "bakery");
    }

    #[test]
    fn product_tiles_extract_all_fields() {
        let iceland = Iceland::new().unwrap();
        let products = iceland.parse_products(Some(LISTING));
        assert_eq!(products.len(), 1);

        let baguettes = &products[0];
        assert_eq!(
            baguettes.name.as_deref(),
            Some("Iceland Garlic Bread Baguettes")
        );
        assert_eq!(baguettes.price, Some(1.25));
        assert_eq!(baguettes.part_url.as_deref(), Some("p/garlic-bread/58707.html"));
        assert_eq!(
            baguettes.image_url.as_deref(),
            Some("https://assets.iceland.co.uk/i/iceland/placeholder.jpg")
        );
    }

    #[test]
    fn detail_page_yields_nutrition_and_allergens() {
        let iceland = Iceland::new().unwrap();
        let details = iceland.parse_product_details(Some(DETAIL)).unwrap();
        assert_eq!(details.nutrition.energy_kj, 1180.0);
        assert_eq!(details.nutrition.energy_kcal, 282.0);
        assert_eq!(details.nutrition.fat, 12.1);
        assert_eq!(details.nutrition.salt, 1.1);
        assert_eq!(details.allergens, vec!["milk", "wheat"]);
    }

    #[test]
    fn short_nutrition_table_defaults_to_zero() {
        let iceland = Iceland::new().unwrap();
        let html = r#"<html><body><table><tbody>
            <tr><td>Energy</td><td>1180kJ</td></tr>
        </tbody></table></body></html>"#;
        let details = iceland.parse_product_details(Some(html)).unwrap();
        assert_eq!(details.nutrition, Default::default());
        assert!(details.allergens.is_empty());
    }
}
