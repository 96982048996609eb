//! Cross-retailer price comparison.
//!
//! Search results come back price-ascending; everything downstream
//! preserves that order. Deduplication keys on `(name, image_url)` so
//! repeated crawl runs collapse while same-name listings from different
//! retailers survive, and grouping then keys on name alone so those
//! survivors land in one comparable group.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::warn;
use url::Url;

use crate::domain::entities::{Product, Supermarket};
use crate::infrastructure::store::CatalogStore;
use crate::retailers::join_url;

/// One search hit joined with its retailer and allergen tags.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub product: Product,
    pub supermarket: Supermarket,
    pub allergens: Vec<String>,
}

/// A search hit placed in its comparison group.
#[derive(Debug, Clone)]
pub struct GroupedProduct {
    pub product: Product,
    pub logo_url: String,
    pub url: String,
    pub is_cheapest: bool,
}

/// All listings sharing one product name, cheapest member marked.
#[derive(Debug, Clone)]
pub struct ProductGroup {
    pub name: String,
    pub entries: Vec<GroupedProduct>,
}

/// Grouped search results, split by the user's allergen exclusions.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub safe: Vec<ProductGroup>,
    pub with_allergens: Vec<ProductGroup>,
}

/// Run a catalog search and build the grouped comparison for it.
///
/// `exclusions` is the user's chosen allergen set; listings tagged with
/// any of them are still returned, but in the `with_allergens` partition.
pub async fn compare(
    store: &CatalogStore,
    term: &str,
    exclusions: &[String],
) -> Result<SearchOutcome> {
    let products = dedup_products(store.search_products(term).await?);

    let mut candidates = Vec::with_capacity(products.len());
    for product in products {
        let Some(supermarket) = store.retailer_for_product(product.id).await? else {
            warn!(product_id = product.id, "product without a retailer, dropping from results");
            continue;
        };
        let allergens = store.allergens_for_product(product.id).await?;
        candidates.push(Candidate {
            product,
            supermarket,
            allergens,
        });
    }

    let (safe, flagged) = partition_by_allergens(candidates, exclusions);
    Ok(SearchOutcome {
        safe: group_and_compare(safe),
        with_allergens: group_and_compare(flagged),
    })
}

/// Collapse duplicate listings by `(name, image_url)`, keeping the first
/// occurrence so the incoming price order decides which row survives.
pub fn dedup_products(products: Vec<Product>) -> Vec<Product> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    products
        .into_iter()
        .filter(|product| seen.insert((product.name.clone(), product.image_url.clone())))
        .collect()
}

/// Split candidates into (safe, contains-excluded-allergen), preserving
/// order within each partition.
pub fn partition_by_allergens(
    candidates: Vec<Candidate>,
    exclusions: &[String],
) -> (Vec<Candidate>, Vec<Candidate>) {
    candidates.into_iter().partition(|candidate| {
        !candidate.allergens.iter().any(|allergen| {
            exclusions
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(allergen))
        })
    })
}

/// Group candidates by product name in first-seen order and mark the
/// cheapest member of each group. Ties keep the first minimum; a
/// singleton group is always cheapest.
pub fn group_and_compare(candidates: Vec<Candidate>) -> Vec<ProductGroup> {
    let mut groups: Vec<ProductGroup> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let url = canonical_url(&candidate.supermarket.base_url, &candidate.product.part_url);
        let entry = GroupedProduct {
            logo_url: candidate.supermarket.logo_url,
            url,
            is_cheapest: false,
            product: candidate.product,
        };

        match index_by_name.get(&entry.product.name).copied() {
            Some(index) => groups[index].entries.push(entry),
            None => {
                index_by_name.insert(entry.product.name.clone(), groups.len());
                groups.push(ProductGroup {
                    name: entry.product.name.clone(),
                    entries: vec![entry],
                });
            }
        }
    }

    for group in &mut groups {
        let mut cheapest = 0;
        for (index, entry) in group.entries.iter().enumerate() {
            if entry.product.price < group.entries[cheapest].product.price {
                cheapest = index;
            }
        }
        if let Some(entry) = group.entries.get_mut(cheapest) {
            entry.is_cheapest = true;
        }
    }
    groups
}

/// Detail-page URL for a listing: proper RFC join against the retailer
/// base where possible, plain concatenation otherwise.
fn canonical_url(base: &str, part: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(part)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => join_url(base, part),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::{compare, dedup_products, group_and_compare, partition_by_allergens, Candidate};
    use crate::domain::entities::{ParsedCategory, ParsedProduct, Product, Supermarket};
    use crate::infrastructure::store::CatalogStore;

    fn product(id: i64, name: &str, price: f64, image_url: &str) -> Product {
        Product {
            id,
            category_id: 1,
            name: name.to_string(),
            price,
            image_url: image_url.to_string(),
            part_url: format!("/products/{id}"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_available: true,
        }
    }

    fn supermarket(id: i64, name: &str) -> Supermarket {
        Supermarket {
            id,
            name: name.to_string(),
            logo_url: format!("https://cdn.example.com/{name}.svg"),
            base_url: format!("https://{name}.example.com"),
        }
    }

    fn candidate(product: Product, retailer: &str, allergens: &[&str]) -> Candidate {
        Candidate {
            product,
            supermarket: supermarket(1, retailer),
            allergens: allergens.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn dedup_collapses_identical_name_and_image() {
        let products = vec![
            product(1, "Bread", 1.00, "https://a.example.com/bread.jpg"),
            product(2, "Bread", 1.20, "https://a.example.com/bread.jpg"),
            product(3, "Bread", 1.50, "https://b.example.com/bread.jpg"),
        ];
        let surviving = dedup_products(products);
        assert_eq!(surviving.len(), 2);
        // First occurrence wins, so the cheaper duplicate is the keeper.
        assert_eq!(surviving[0].id, 1);
        assert_eq!(surviving[1].id, 3);
    }

    #[test]
    fn partition_routes_on_exclusion_intersection() {
        let candidates = vec![
            candidate(product(1, "Bread", 1.00, "a"), "aldi", &["wheat"]),
            candidate(product(2, "Milk", 1.45, "b"), "morrisons", &["milk"]),
        ];
        let (safe, flagged) =
            partition_by_allergens(candidates, &["wheat".to_string()]);
        assert_eq!(safe.len(), 1);
        assert_eq!(safe[0].product.name, "Milk");
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].product.name, "Bread");
    }

    #[test]
    fn no_exclusions_means_everything_is_safe() {
        let candidates = vec![candidate(product(1, "Bread", 1.00, "a"), "aldi", &["wheat"])];
        let (safe, flagged) = partition_by_allergens(candidates, &[]);
        assert_eq!(safe.len(), 1);
        assert!(flagged.is_empty());
    }

    #[test]
    fn grouping_marks_first_minimum_cheapest() {
        let candidates = vec![
            candidate(product(1, "Bread", 1.00, "a"), "aldi", &[]),
            candidate(product(2, "Bread", 1.50, "b"), "morrisons", &[]),
            candidate(product(3, "Milk", 1.45, "c"), "morrisons", &[]),
        ];
        let groups = group_and_compare(candidates);
        assert_eq!(groups.len(), 2);

        let bread = &groups[0];
        assert_eq!(bread.name, "Bread");
        assert_eq!(bread.entries.len(), 2);
        assert!(bread.entries[0].is_cheapest);
        assert!(!bread.entries[1].is_cheapest);

        // Singleton groups are always their own cheapest.
        assert!(groups[1].entries[0].is_cheapest);
    }

    #[test]
    fn price_ties_keep_the_first_mark() {
        let candidates = vec![
            candidate(product(1, "Bread", 1.00, "a"), "aldi", &[]),
            candidate(product(2, "Bread", 1.00, "b"), "iceland", &[]),
        ];
        let groups = group_and_compare(candidates);
        assert!(groups[0].entries[0].is_cheapest);
        assert!(!groups[0].entries[1].is_cheapest);
    }

    #[test]
    fn grouped_entries_resolve_detail_urls() {
        let candidates = vec![candidate(product(7, "Bread", 1.00, "a"), "aldi", &[])];
        let groups = group_and_compare(candidates);
        assert_eq!(groups[0].entries[0].url, "https://aldi.example.com/products/7");
    }

    async fn seed_bread(
        store: &CatalogStore,
        retailer: &str,
        price: f64,
        allergens: &[&str],
    ) -> i64 {
        let id = store
            .upsert_supermarket(
                retailer,
                &format!("https://cdn.example.com/{retailer}.svg"),
                &format!("https://{retailer}.example.com"),
            )
            .await
            .unwrap();
        store
            .upsert_categories(
                id,
                &[ParsedCategory {
                    name: "bakery".to_string(),
                    part_url: "/bakery".to_string(),
                }],
            )
            .await
            .unwrap();
        let category = store.categories_for_supermarket(id).await.unwrap()[0].id;
        let products = store
            .insert_products(
                category,
                &[ParsedProduct {
                    name: Some("Bread".to_string()),
                    price: Some(price),
                    image_url: Some(format!("https://cdn.example.com/{retailer}-bread.jpg")),
                    part_url: Some("/p/bread".to_string()),
                }],
            )
            .await
            .unwrap();
        let allergens: Vec<String> = allergens.iter().map(|a| a.to_string()).collect();
        store
            .insert_product_allergens(products[0], &allergens)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn compare_partitions_and_groups_a_seeded_catalog() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("compare.db").display());
        let store = CatalogStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();

        seed_bread(&store, "aldi", 1.09, &["wheat"]).await;
        seed_bread(&store, "iceland", 1.45, &[]).await;

        let outcome = compare(&store, "bread", &["wheat".to_string()])
            .await
            .unwrap();

        // The wheat-tagged listing lands in the flagged partition; the
        // untagged one stays safe and is its group's cheapest.
        assert_eq!(outcome.safe.len(), 1);
        let safe = &outcome.safe[0];
        assert_eq!(safe.name, "Bread");
        assert_eq!(safe.entries.len(), 1);
        assert!(safe.entries[0].is_cheapest);
        assert_eq!(safe.entries[0].logo_url, "https://cdn.example.com/iceland.svg");
        assert_eq!(safe.entries[0].url, "https://iceland.example.com/p/bread");

        assert_eq!(outcome.with_allergens.len(), 1);
        assert_eq!(outcome.with_allergens[0].entries[0].product.price, 1.09);
    }

    #[tokio::test]
    async fn compare_without_exclusions_groups_across_retailers() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("grouping.db").display());
        let store = CatalogStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();

        seed_bread(&store, "aldi", 1.09, &[]).await;
        seed_bread(&store, "iceland", 1.45, &[]).await;

        let outcome = compare(&store, "bread", &[]).await.unwrap();
        assert!(outcome.with_allergens.is_empty());
        assert_eq!(outcome.safe.len(), 1);

        let group = &outcome.safe[0];
        assert_eq!(group.entries.len(), 2);
        assert!(group.entries[0].is_cheapest);
        assert_eq!(group.entries[0].product.price, 1.09);
        assert!(!group.entries[1].is_cheapest);
    }
}
