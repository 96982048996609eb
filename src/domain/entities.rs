//! Catalog entities and the parsed records the adapters produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retailer row. Seeded once per crawl run; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Supermarket {
    pub id: i64,
    pub name: String,
    pub logo_url: String,
    pub base_url: String,
}

/// A navigable category discovered on a retailer's landing page.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub supermarket_id: i64,
    pub name: String,
    pub part_url: String,
}

/// A persisted product listing. `(name, image_url)` acts as the
/// cross-listing identity key: the image URL embeds a retailer-specific
/// path, so the pair is unique per physical catalog entry even when names
/// collide across retailers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub price: f64,
    pub image_url: String,
    pub part_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_available: bool,
}

/// Per-100g nutrition values from a product detail page.
///
/// All-zero values are a valid record: a malformed or missing nutrition
/// table is stored as zeros rather than treated as a failure, so every
/// detail row has a consistent shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NutritionFacts {
    pub energy_kj: f64,
    pub energy_kcal: f64,
    pub fat: f64,
    pub saturates: f64,
    pub carbohydrates: f64,
    pub sugars: f64,
    pub fibre: f64,
    pub protein: f64,
    pub salt: f64,
}

impl NutritionFacts {
    /// Number of tracked nutrients, in table order.
    pub const FIELD_COUNT: usize = 9;

    /// Build from values in table order (kJ, kcal, fat, saturates,
    /// carbohydrates, sugars, fibre, protein, salt). Returns `None` when
    /// the slice is not exactly nine values long.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() != Self::FIELD_COUNT {
            return None;
        }
        Some(Self {
            energy_kj: values[0],
            energy_kcal: values[1],
            fat: values[2],
            saturates: values[3],
            carbohydrates: values[4],
            sugars: values[5],
            fibre: values[6],
            protein: values[7],
            salt: values[8],
        })
    }
}

/// Outcome of parsing one product detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDetails {
    pub nutrition: NutritionFacts,
    pub allergens: Vec<String>,
}

impl ProductDetails {
    /// The defaulting policy: zero nutrition plus whatever allergens were
    /// found in the free text.
    pub fn defaulted(allergens: Vec<String>) -> Self {
        Self {
            nutrition: NutritionFacts::default(),
            allergens,
        }
    }
}

/// A category link extracted from a landing/menu page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCategory {
    pub name: String,
    pub part_url: String,
}

/// One product tile from a listing page. Individual fields may be absent
/// when the tile was partially unparsable; incomplete entries are skipped
/// at persistence time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub part_url: Option<String>,
}

impl ParsedProduct {
    /// Whether every field required for a catalog row was extracted.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.price.is_some()
            && self.image_url.is_some()
            && self.part_url.is_some()
    }
}
