//! Aldi adapter.
//!
//! Listing pages paginate with an `&page=N` query. Category links sit in
//! the "SHOP ALL …" entries of the navigation drop-down. Detail pages put
//! ingredients, allergy advice and the nutrition table into rows of a
//! single `tbody`, with nutrition published as free text that needs a
//! token pattern rather than cell-wise extraction.

use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{error, warn};

use crate::domain::allergens;
use crate::domain::entities::{ParsedCategory, ParsedProduct, ProductDetails};

use super::{
    compile, details_from_strings, element_text, normalize_image_src, parse_price_pounds,
    select_text, Retailer,
};

pub struct Aldi {
    menu_item: Selector,
    category_name: Selector,
    category_link: Selector,
    product_tile: Selector,
    product_name: Selector,
    product_price: Selector,
    product_link: Selector,
    product_image: Selector,
    detail_table: Selector,
    detail_row: Selector,
    nutrition_pattern: Regex,
}

impl Aldi {
    pub fn new() -> Result<Self> {
        Ok(Self {
            menu_item: compile("li.submenu")?,
            category_name: compile("a.dropdown-item")?,
            category_link: compile("a[href]")?,
            product_tile: compile("div.product-tile")?,
            product_name: compile("a.p.text-default-font")?,
            product_price: compile("span.h4")?,
            product_link: compile("div.image-tile a")?,
            product_image: compile("figure img")?,
            detail_table: compile("tbody")?,
            detail_row: compile("tr")?,
            nutrition_pattern: Regex::new(
                r"(Fat|of which saturates|Carbohydrate|of which sugars|Fibre|Protein|Salt)(\s+<?\d+\.?\d+|\s+\d+)|(\d+\.?[kK][jJ]|\d+\.?kcal)",
            )?,
        })
    }

    /// Pull the nine nutrition values out of the free-text block, in
    /// table order. Energy tokens ("2272kJ", "539kcal") match first; the
    /// remaining seven come from labelled value pairs. Anything missing
    /// defaults to "0".
    fn nutrition_values(&self, text: &str) -> Vec<String> {
        let captures: Vec<_> = self.nutrition_pattern.captures_iter(text).collect();
        if captures.len() != 2 && captures.len() != 9 {
            warn!(matches = captures.len(), "nutrition text not in expected format");
            return vec!["0".to_string(); 9];
        }

        let mut values = Vec::with_capacity(9);
        for index in 0..9 {
            if index < 2 {
                // Energy tokens carry their unit; strip it along with the
                // stray dot some pages embed in the number.
                let token = captures
                    .get(index)
                    .and_then(|c| c.get(3))
                    .map(|m| m.as_str().to_lowercase())
                    .unwrap_or_default();
                let cleaned = token
                    .replace('<', "")
                    .replace('.', "")
                    .replace("kj", "")
                    .replace("kcal", "")
                    .trim()
                    .to_string();
                if cleaned.is_empty() {
                    warn!(index, "energy value missing, defaulting to 0");
                    values.push("0".to_string());
                } else {
                    values.push(cleaned);
                }
            } else {
                match captures.get(index).and_then(|c| c.get(2)) {
                    Some(m) => values.push(m.as_str().replace('<', "").trim().to_string()),
                    None => {
                        warn!(index, "nutrition value missing, defaulting to 0");
                        values.push("0".to_string());
                    }
                }
            }
        }
        values
    }
}

impl Retailer for Aldi {
    fn name(&self) -> &str {
        "Aldi"
    }

    fn logo_url(&self) -> &str {
        "https://cdn.aldi-digital.co.uk/32FDVWu4Lhbxgj9Z3v03ji0pGJIp?&w=70&h=84"
    }

    fn base_url(&self) -> &str {
        "https://groceries.aldi.co.uk"
    }

    fn build_url(&self, url: &str, page: u32) -> Option<String> {
        Some(format!("{url}&page={page}"))
    }

    fn parse_categories(&self, html: Option<&str>) -> Vec<ParsedCategory> {
        let Some(html) = html else {
            error!("category page for Aldi was not fetched");
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut categories = Vec::new();

        for item in document.select(&self.menu_item) {
            // Category names hide behind "SHOP ALL <NAME>" menu entries.
            let name = select_text(item, &self.category_name)
                .filter(|text| text.contains("SHOP ALL"))
                .map(|text| text["SHOP ALL".len()..].trim().to_lowercase());

            // The matching link is the one routed through /shopall.
            let part_url = item
                .select(&self.category_link)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.contains("shopall"))
                .map(|href| match href.find('?') {
                    Some(pos) => href[..=pos].to_string(),
                    None => href.to_string(),
                });

            match (name, part_url) {
                (Some(name), Some(part_url)) => categories.push(ParsedCategory { name, part_url }),
                _ => warn!("skipping Aldi menu entry without a usable name/link pair"),
            }
        }
        categories
    }

    fn parse_products(&self, html: Option<&str>) -> Vec<ParsedProduct> {
        let Some(html) = html else {
            error!("product page for Aldi was not fetched");
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
                    Err(e) => warn!(name = ?product.name, %e, "dropping unparsable Aldi price"),
                }
            }

            product.part_url = tile
                .select(&self.product_link)
                .filter_map(|a| a.value().attr("href"))
                .next()
                .map(str::to_string);

            product.image_url = tile
                .select(&self.product_image)
                .filter_map(|img| img.value().attr("src"))
                .next()
                .map(normalize_image_src);

            products.push(product);
        }
        products
    }

    fn parse_product_details(&self, html: Option<&str>) -> Option<ProductDetails> {
        let Some(html) = html else {
            error!("detail page for Aldi was not fetched");
            return None;
        };
        let document = Html::parse_document(html);
        let mut found = Vec::new();

        let Some(table) = document.select(&self.detail_table).next() else {
            warn!("Aldi detail page without an information table");
            return Some(ProductDetails::defaulted(found));
        };

        for row in table.select(&self.detail_row) {
            let text = element_text(row);

            if text.contains("Ingredients") {
                allergens::merge(&mut found, allergens::scan(&text.replace("Ingredients", "")));
            }
            if text.contains("Allergy advice") {
                allergens::merge(
                    &mut found,
                    allergens::scan(&text.replace("Allergy advice", "")),
                );
            }
            if text.contains("Nutrition information") {
                let values = self.nutrition_values(&text.replace("Nutrition information", ""));
                return Some(details_from_strings(self.name(), &values, found));
            }
        }

        // No nutrition row on the page: store the defaulted record so the
        // detail schema stays consistent.
        Some(ProductDetails::defaulted(found))
    }
}

#[cfg(test)]
mod tests {
    use super::Aldi;
    use crate::retailers::Retailer;

    const LISTING: &str = r#"
        <html><body>
          <div class="product-tile">
            <a class="p text-default-font" href="/p/1">Wholemeal Bread 800g</a>
            <span class="h4">£1.09</span>
            <div class="image-tile"><a href="/product/wholemeal-bread-800g"></a></div>
            <figure><img src="https://cdn.aldi-digital.co.uk\products\bread.jpg"></figure>
          </div>
          <div class="product-tile">
            <a class="p text-default-font" href="/p/2">Butter Croissants 4 Pack</a>
            <span class="h4">every day low price</span>
            <div class="image-tile"><a href="/product/butter-croissants"></a></div>
            <figure><img src="https://cdn.aldi-digital.co.uk/products/croissants.jpg"></figure>
          </div>
        </body></html>"#;

    const MENU: &str = r#"
        <html><body><ul>
          <li class="submenu">
            <a class="dropdown-item" href="/c/bakery">SHOP ALL BAKERY</a>
            <a href="/c/shopall-bakery?view=grid">Bakery</a>
          </li>
          <li class="submenu">
            <a class="dropdown-item" href="/c/wine">Featured wines</a>
            <a href="/c/wine-offers">Wine</a>
          </li>
        </ul></body></html>"#;

    const DETAIL: &str = r#"
        <html><body><table><tbody>
          <tr><td>Ingredients</td><td>Wholemeal WHEAT Flour, Water, Soya Flour</td></tr>
          <tr><td>Allergy advice</td><td>For allergens, see ingredients in bold. May contain sesame.</td></tr>
          <tr><td>Nutrition information</td><td>Energy 985kJ 233kcal Fat 1.9 of which saturates 0.4 Carbohydrate 40.5 of which sugars 3.2 Fibre 6.2 Protein 10.2 Salt 0.95</td></tr>
        </tbody></table></body></html>"#;

    #[test]
    fn absent_pages_yield_empty_results() {
        let aldi = Aldi::new().unwrap();
        assert!(aldi.parse_categories(None).is_empty());
        assert!(aldi.parse_products(None).is_empty());
        assert!(aldi.parse_product_details(None).is_none());
    }

    #[test]
    fn pagination_appends_page_query() {
        let aldi = Aldi::new().unwrap();
        assert_eq!(
            aldi.build_url("https://groceries.aldi.co.uk/c/shopall-bakery?", 3),
            Some("https://groceries.aldi.co.uk/c/shopall-bakery?&page=3".to_string())
        );
    }

    #[test]
    fn categories_come_from_shop_all_entries() {
        let aldi = Aldi::new().unwrap();
        let categories = aldi.parse_categories(Some(MENU));
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "bakery");
        assert_eq!(categories[0].part_url, "/c/shopall-bakery?");
    }

    #[test]
    fn product_tiles_extract_all_fields() {
        let aldi = Aldi::new().unwrap();
        let products = aldi.parse_products(Some(LISTING));
        assert_eq!(products.len(), 2);

        let bread = &products[0];
        assert_eq!(bread.name.as_deref(), Some("Wholemeal Bread 800g"));
        assert_eq!(bread.price, Some(1.09));
        assert_eq!(bread.part_url.as_deref(), Some("/product/wholemeal-bread-800g"));
        assert_eq!(
            bread.image_url.as_deref(),
            Some("https://cdn.aldi-digital.co.uk/products/bread.jpg")
        );
    }

    #[test]
    fn bad_price_drops_only_that_field() {
        let aldi = Aldi::new().unwrap();
        let products = aldi.parse_products(Some(LISTING));
        let croissants = &products[1];
        assert_eq!(croissants.name.as_deref(), Some("Butter Croissants 4 Pack"));
        assert_eq!(croissants.price, None);
        assert!(croissants.part_url.is_some());
    }

    #[test]
    fn detail_page_yields_nutrition_and_allergens() {
        let aldi = Aldi::new().unwrap();
        let details = aldi.parse_product_details(Some(DETAIL)).unwrap();
        assert_eq!(details.nutrition.energy_kj, 985.0);
        assert_eq!(details.nutrition.energy_kcal, 233.0);
        assert_eq!(details.nutrition.fat, 1.9);
        assert_eq!(details.nutrition.salt, 0.95);
        assert!(details.allergens.contains(&"wheat".to_string()));
        assert!(details.allergens.contains(&"soya".to_string()));
        assert!(details.allergens.contains(&"sesame".to_string()));
    }

    #[test]
    fn malformed_nutrition_defaults_to_zero_but_keeps_allergens() {
        let aldi = Aldi::new().unwrap();
        let html = r#"<html><body><table><tbody>
            <tr><td>Ingredients</td><td>Milk chocolate (milk)</td></tr>
            <tr><td>Nutrition information</td><td>per portion: see pack</td></tr>
        </tbody></table></body></html>"#;
        let details = aldi.parse_product_details(Some(html)).unwrap();
        assert_eq!(details.nutrition, Default::default());
        assert_eq!(details.allergens, vec!["milk"]);
    }
}
