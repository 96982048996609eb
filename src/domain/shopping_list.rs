//! Basket totals across retailers for a user's shopping list.
//!
//! This is the name-only matching pass used by the shopping-list surface:
//! for each basket item, same-name products at other retailers are priced
//! into a hypothetical per-retailer basket. It deliberately skips the
//! comparison engine's dedup/grouping machinery.

use std::collections::HashMap;

use anyhow::Result;

use crate::infrastructure::store::CatalogStore;

/// One line of a user's shopping list, as supplied by the list service.
#[derive(Debug, Clone)]
pub struct BasketItem {
    pub product_name: String,
    pub price: f64,
    pub supermarket_id: i64,
}

/// Per-retailer totals for one basket item.
#[derive(Debug, Clone)]
pub struct ItemComparison {
    pub product_name: String,
    pub totals_by_supermarket: HashMap<i64, f64>,
}

/// Totals for every basket item plus the id → name map needed to label
/// them.
#[derive(Debug, Clone, Default)]
pub struct BasketComparison {
    pub items: Vec<ItemComparison>,
    pub supermarket_names: HashMap<i64, String>,
}

/// Price each basket item at every retailer that lists a same-name
/// product. The item's own price stands in for the current retailer;
/// multiple same-name listings at one retailer sum into its total.
pub async fn compare_baskets(
    store: &CatalogStore,
    items: &[BasketItem],
    current_supermarket_id: i64,
) -> Result<BasketComparison> {
    let mut comparison = BasketComparison::default();
    for supermarket in store.supermarkets().await? {
        comparison
            .supermarket_names
            .insert(supermarket.id, supermarket.name);
    }

    for item in items {
        let alternatives: Vec<(i64, f64)> = store
            .products_named(&item.product_name)
            .await?
            .into_iter()
            .filter(|(_, supermarket_id)| *supermarket_id != current_supermarket_id)
            .map(|(product, supermarket_id)| (supermarket_id, product.price))
            .collect();

        comparison.items.push(ItemComparison {
            product_name: item.product_name.clone(),
            totals_by_supermarket: item_totals(item, current_supermarket_id, &alternatives),
        });
    }
    Ok(comparison)
}

fn item_totals(
    item: &BasketItem,
    current_supermarket_id: i64,
    alternatives: &[(i64, f64)],
) -> HashMap<i64, f64> {
    let mut totals = HashMap::new();
    totals.insert(current_supermarket_id, item.price);
    for (supermarket_id, price) in alternatives {
        *totals.entry(*supermarket_id).or_insert(0.0) += price;
    }
    totals
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{compare_baskets, item_totals, BasketItem};
    use crate::domain::entities::{ParsedCategory, ParsedProduct};
    use crate::infrastructure::store::CatalogStore;

    fn item(name: &str, price: f64, supermarket_id: i64) -> BasketItem {
        BasketItem {
            product_name: name.to_string(),
            price,
            supermarket_id,
        }
    }

    #[test]
    fn own_price_stands_in_for_the_current_retailer() {
        let totals = item_totals(&item("Bread", 1.09, 1), 1, &[]);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[&1], 1.09);
    }

    #[test]
    fn alternatives_total_per_retailer() {
        let totals = item_totals(&item("Bread", 1.09, 1), 1, &[(2, 1.45), (3, 0.99)]);
        assert_eq!(totals[&1], 1.09);
        assert_eq!(totals[&2], 1.45);
        assert_eq!(totals[&3], 0.99);
    }

    #[test]
    fn duplicate_listings_at_one_retailer_sum() {
        let totals = item_totals(&item("Bread", 1.09, 1), 1, &[(2, 1.45), (2, 1.45)]);
        assert_eq!(totals[&2], 2.90);
    }

    async fn seed_retailer(store: &CatalogStore, name: &str, bread_price: f64) -> i64 {
        let id = store
            .upsert_supermarket(name, "logo", "https://example.com")
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
        store
            .insert_products(
                category,
                &[ParsedProduct {
                    name: Some("Bread".to_string()),
                    price: Some(bread_price),
                    image_url: Some(format!("https://cdn.example.com/{name}-bread.jpg")),
                    part_url: Some("/p/bread".to_string()),
                }],
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn basket_totals_span_a_multi_retailer_catalog() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("baskets.db").display());
        let store = CatalogStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();

        let aldi = seed_retailer(&store, "Aldi", 1.20).await;
        let iceland = seed_retailer(&store, "Iceland", 1.45).await;

        let basket = vec![item("Bread", 1.09, aldi)];
        let comparison = compare_baskets(&store, &basket, aldi).await.unwrap();

        assert_eq!(comparison.supermarket_names[&aldi], "Aldi");
        assert_eq!(comparison.supermarket_names[&iceland], "Iceland");

        assert_eq!(comparison.items.len(), 1);
        let totals = &comparison.items[0].totals_by_supermarket;
        // The basket's own price stands in for the current retailer; the
        // catalog row at that retailer must not be double-counted.
        assert_eq!(totals[&aldi], 1.09);
        assert_eq!(totals[&iceland], 1.45);
    }
}
