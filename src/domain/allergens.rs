//! Shared allergen vocabulary and free-text matching.
//!
//! Every retailer publishes ingredient and allergy-advice blocks as free
//! text, so matching is a case-insensitive substring scan against a fixed
//! vocabulary rather than anything structured.

/// The fixed allergen vocabulary shared by all adapters and the
/// comparison engine. User allergen choices are drawn from this set.
pub const VOCABULARY: [&str; 19] = [
    "peanuts",
    "almonds",
    "walnuts",
    "cashews",
    "pistachios",
    "milk",
    "eggs",
    "wheat",
    "barley",
    "soya",
    "mustard",
    "lupin",
    "rye",
    "sulphites",
    "fish",
    "shellfish",
    "celery",
    "sesame",
    "molluscs",
];

/// Scan a free-text block (ingredients, allergy advice) for vocabulary
/// allergens. Returns each allergen at most once, in vocabulary order.
pub fn scan(text: &str) -> Vec<String> {
    let haystack = text.to_lowercase();
    VOCABULARY
        .iter()
        .filter(|allergen| haystack.contains(*allergen))
        .map(|allergen| (*allergen).to_string())
        .collect()
}

/// Merge allergen lists with set semantics, preserving first-seen order.
pub fn merge(found: &mut Vec<String>, more: Vec<String>) {
    for allergen in more {
        if !found.contains(&allergen) {
            found.push(allergen);
        }
    }
}
