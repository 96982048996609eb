//! SQLite-backed catalog store.
//!
//! Schema is bootstrapped with `CREATE TABLE IF NOT EXISTS` at startup
//! rather than migration files. Supermarket and category writes check
//! for an existing row by natural key before inserting; product writes
//! are append-only, so repeated crawl runs accumulate rows and the
//! comparison layer deduplicates at read time.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::domain::entities::{
    Category, NutritionFacts, ParsedCategory, ParsedProduct, Product, ProductDetails,
    Supermarket,
};

#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct NamedProductRow {
    #[sqlx(flatten)]
    product: Product,
    supermarket_id: i64,
}

impl CatalogStore {
    /// Open (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        if let Some(parent) = Path::new(db_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create database directory for {db_path}"))?;
        }
        if !Path::new(db_path).exists() {
            std::fs::File::create(db_path)
                .with_context(|| format!("failed to create database file {db_path}"))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the catalog tables and their indexes.
    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS supermarkets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                logo_url TEXT NOT NULL,
                base_url TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                supermarket_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                part_url TEXT NOT NULL,
                FOREIGN KEY (supermarket_id) REFERENCES supermarkets (id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                image_url TEXT NOT NULL,
                part_url TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                FOREIGN KEY (category_id) REFERENCES categories (id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS product_nutrition (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                energy_kj REAL NOT NULL DEFAULT 0,
                energy_kcal REAL NOT NULL DEFAULT 0,
                fat REAL NOT NULL DEFAULT 0,
                saturates REAL NOT NULL DEFAULT 0,
                carbohydrates REAL NOT NULL DEFAULT 0,
                sugars REAL NOT NULL DEFAULT 0,
                fibre REAL NOT NULL DEFAULT 0,
                protein REAL NOT NULL DEFAULT 0,
                salt REAL NOT NULL DEFAULT 0,
                FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS product_allergens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                allergen TEXT NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_categories_supermarket_id
                ON categories (supermarket_id);
            CREATE INDEX IF NOT EXISTS idx_products_category_id
                ON products (category_id);
            CREATE INDEX IF NOT EXISTS idx_products_name ON products (name);
            CREATE INDEX IF NOT EXISTS idx_product_allergens_product_id
                ON product_allergens (product_id);
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Ensure the supermarket row exists; returns its id either way.
    /// Natural key is the name, checked by lookup rather than constraint.
    pub async fn upsert_supermarket(
        &self,
        name: &str,
        logo_url: &str,
        base_url: &str,
    ) -> Result<i64> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM supermarkets WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let result =
            sqlx::query("INSERT INTO supermarkets (name, logo_url, base_url) VALUES (?, ?, ?)")
                .bind(name)
                .bind(logo_url)
                .bind(base_url)
                .execute(&self.pool)
                .await?;
        info!(name, "seeded supermarket");
        Ok(result.last_insert_rowid())
    }

    /// Insert categories that do not already exist for this supermarket,
    /// keyed by `(supermarket_id, name)`.
    pub async fn upsert_categories(
        &self,
        supermarket_id: i64,
        categories: &[ParsedCategory],
    ) -> Result<()> {
        for category in categories {
            let existing: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM categories WHERE supermarket_id = ? AND name = ?",
            )
            .bind(supermarket_id)
            .bind(&category.name)
            .fetch_optional(&self.pool)
            .await?;
            if existing.is_some() {
                continue;
            }

            sqlx::query("INSERT INTO categories (supermarket_id, name, part_url) VALUES (?, ?, ?)")
                .bind(supermarket_id)
                .bind(&category.name)
                .bind(&category.part_url)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Append the complete entries from one listing page and return the
    /// new row ids, in insertion order, for the detail phase. Entries
    /// missing any field are logged and skipped.
    pub async fn insert_products(
        &self,
        category_id: i64,
        products: &[ParsedProduct],
    ) -> Result<Vec<i64>> {
        let mut inserted = Vec::new();
        let now = Utc::now();

        for product in products {
            if !product.is_complete() {
                warn!(name = ?product.name, "skipping incomplete product entry");
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO products
                    (category_id, name, price, image_url, part_url, created_at, updated_at, is_available)
                VALUES (?, ?, ?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(category_id)
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.image_url)
            .bind(&product.part_url)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
            inserted.push(result.last_insert_rowid());
        }
        Ok(inserted)
    }

    /// Persist the nutrition record for a product.
    pub async fn insert_product_details(
        &self,
        product_id: i64,
        details: &ProductDetails,
    ) -> Result<()> {
        let n = &details.nutrition;
        sqlx::query(
            r#"
            INSERT INTO product_nutrition
                (product_id, energy_kj, energy_kcal, fat, saturates,
                 carbohydrates, sugars, fibre, protein, salt)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(n.energy_kj)
        .bind(n.energy_kcal)
        .bind(n.fat)
        .bind(n.saturates)
        .bind(n.carbohydrates)
        .bind(n.sugars)
        .bind(n.fibre)
        .bind(n.protein)
        .bind(n.salt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a product's allergen tags, one row each.
    pub async fn insert_product_allergens(
        &self,
        product_id: i64,
        allergens: &[String],
    ) -> Result<()> {
        for allergen in allergens {
            sqlx::query("INSERT INTO product_allergens (product_id, allergen) VALUES (?, ?)")
                .bind(product_id)
                .bind(allergen)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn supermarkets(&self) -> Result<Vec<Supermarket>> {
        Ok(sqlx::query_as("SELECT * FROM supermarkets ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn categories_for_supermarket(&self, supermarket_id: i64) -> Result<Vec<Category>> {
        Ok(
            sqlx::query_as("SELECT * FROM categories WHERE supermarket_id = ? ORDER BY id")
                .bind(supermarket_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn products_for_category(&self, category_id: i64) -> Result<Vec<Product>> {
        Ok(
            sqlx::query_as("SELECT * FROM products WHERE category_id = ? ORDER BY id")
                .bind(category_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Case-insensitive contains search, price ascending.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        Ok(sqlx::query_as(
            "SELECT * FROM products WHERE name LIKE '%' || ? || '%' ORDER BY price ASC, id ASC",
        )
        .bind(term)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Exact-name lookup across all retailers, paired with the owning
    /// supermarket id. Used by the shopping-list basket comparison.
    pub async fn products_named(&self, name: &str) -> Result<Vec<(Product, i64)>> {
        let rows: Vec<NamedProductRow> = sqlx::query_as(
            r#"
            SELECT p.*, c.supermarket_id
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.name = ?
            ORDER BY p.id
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.product, row.supermarket_id))
            .collect())
    }

    pub async fn allergens_for_product(&self, product_id: i64) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT allergen FROM product_allergens WHERE product_id = ? ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn nutrition_for_product(&self, product_id: i64) -> Result<Option<NutritionFacts>> {
        Ok(sqlx::query_as(
            r#"
            SELECT energy_kj, energy_kcal, fat, saturates, carbohydrates,
                   sugars, fibre, protein, salt
            FROM product_nutrition WHERE product_id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// The supermarket owning a product, via its category.
    pub async fn retailer_for_product(&self, product_id: i64) -> Result<Option<Supermarket>> {
        Ok(sqlx::query_as(
            r#"
            SELECT s.*
            FROM supermarkets s
            JOIN categories c ON c.supermarket_id = s.id
            JOIN products p ON p.category_id = c.id
            WHERE p.id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
