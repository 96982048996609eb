//! Retailer adapters.
//!
//! One adapter per supermarket, each owning its site's markup quirks:
//! selector sets, price formats, lazy-loaded images and nutrition-table
//! layout. Adapters are registered in [`registry`] and looked up by name;
//! everything they share lives at this module level.

pub mod aldi;
pub mod iceland;
pub mod morrisons;

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};
use thiserror::Error;
use tracing::warn;

use crate::domain::entities::{
    NutritionFacts, ParsedCategory, ParsedProduct, ProductDetails,
};

pub use aldi::Aldi;
pub use iceland::Iceland;
pub use morrisons::Morrisons;

/// Failure to turn a price string into a number.
///
/// This is the one parse error that is allowed past an extraction helper:
/// the adapter catches it one level up and drops the field rather than
/// storing a zero or a negative price.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    #[error("price string {0:?} is not numeric")]
    NotNumeric(String),
    #[error("parsed price {0} is negative")]
    Negative(f64),
}

/// Common capability set implemented once per retailer.
pub trait Retailer: Send + Sync {
    fn name(&self) -> &str;
    fn logo_url(&self) -> &str;
    fn base_url(&self) -> &str;

    /// URL for the given listing page index, or `None` when the retailer
    /// shows a category on a single page (fetch once, then stop).
    fn build_url(&self, url: &str, page: u32) -> Option<String>;

    /// Extract navigable category links from the retailer's landing page.
    /// Absent or unparsable markup yields an empty list, never an error.
    fn parse_categories(&self, html: Option<&str>) -> Vec<ParsedCategory>;

    /// Extract one entry per product tile on a listing page. A tile with
    /// an unparsable field keeps its other fields; the bad field is
    /// logged and omitted.
    fn parse_products(&self, html: Option<&str>) -> Vec<ParsedProduct>;

    /// Extract nutrition values and allergen mentions from a product
    /// detail page. `None` when the page is absent; a zero-valued record
    /// carrying the found allergens when the nutrition table is missing
    /// or malformed.
    fn parse_product_details(&self, html: Option<&str>) -> Option<ProductDetails>;

    /// Element the fetcher waits for before a listing page counts as
    /// rendered.
    fn listing_ready_selector(&self) -> &str {
        "div.product-tile"
    }

    /// Canonical URL of a product's detail page.
    fn detail_url(&self, part_url: &str) -> String {
        join_url(self.base_url(), part_url)
    }
}

/// All known adapters, keyed by position; looked up by name via
/// [`by_name`]. Selector compilation can fail, so construction is
/// fallible.
pub fn registry() -> Result<Vec<Box<dyn Retailer>>> {
    Ok(vec![
        Box::new(Aldi::new()?),
        Box::new(Morrisons::new()?),
        Box::new(Iceland::new()?),
    ])
}

/// Look up a single adapter by retailer name (case-insensitive).
pub fn by_name(name: &str) -> Result<Option<Box<dyn Retailer>>> {
    Ok(registry()?
        .into_iter()
        .find(|retailer| retailer.name().eq_ignore_ascii_case(name)))
}

/// Parse a pound-symbol price string: `"£10.50"` → `10.50`.
pub fn parse_price_pounds(raw: &str) -> Result<f64, PriceError> {
    let cleaned = raw.replace('£', "");
    let value: f64 = cleaned
        .trim()
        .parse()
        .map_err(|_| PriceError::NotNumeric(raw.to_string()))?;
    if value < 0.0 {
        return Err(PriceError::Negative(value));
    }
    Ok(value)
}

/// Parse a pence-form price string, converting to pounds: `"85p"` → `0.85`.
pub fn parse_price_pence(raw: &str) -> Result<f64, PriceError> {
    let cleaned = raw.trim().trim_end_matches(['p', 'P']);
    let pence: f64 = cleaned
        .parse()
        .map_err(|_| PriceError::NotNumeric(raw.to_string()))?;
    if pence < 0.0 {
        return Err(PriceError::Negative(pence));
    }
    Ok(pence / 100.0)
}

/// Canonicalize an image source: some retailers emit backslash-separated
/// paths.
pub fn normalize_image_src(src: &str) -> String {
    src.replace('\\', "/")
}

/// Join a retailer base URL and a part URL by concatenation. Part URLs
/// are stored relative (with or without a leading slash); absolute ones
/// pass through.
pub fn join_url(base: &str, part: &str) -> String {
    if part.starts_with("http") {
        return part.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        part.trim_start_matches('/')
    )
}

/// Compile a CSS selector string, surfacing the selector text on failure.
pub(crate) fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e}"))
}

/// Collected, trimmed text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the first match under `element`, if non-empty.
pub(crate) fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Build a detail record from stringly nutrition values plus found
/// allergens, falling back to the zero-valued default when any value is
/// non-numeric or the count is off.
pub(crate) fn details_from_strings(
    retailer: &str,
    values: &[String],
    allergens: Vec<String>,
) -> ProductDetails {
    let parsed: Result<Vec<f64>, _> = values.iter().map(|v| v.trim().parse::<f64>()).collect();
    match parsed.ok().and_then(|v| NutritionFacts::from_values(&v)) {
        Some(nutrition) => ProductDetails {
            nutrition,
            allergens,
        },
        None => {
            warn!(retailer, "nutrition values unusable, assigning defaults");
            ProductDetails::defaulted(allergens)
        }
    }
}
