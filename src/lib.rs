//! Grocery catalog crawler and cross-supermarket price comparison.
//!
//! The pipeline crawls retailer sites sequentially (category discovery,
//! paginated listings, per-product detail pages) into a SQLite catalog,
//! which the comparison engine then queries to group same-name products
//! across retailers and mark the cheapest listing, filtered by a user's
//! allergen exclusions.

pub mod crawler;
pub mod domain;
pub mod infrastructure;
pub mod retailers;

pub use crawler::Crawler;
pub use infrastructure::config::AppConfig;
pub use infrastructure::store::CatalogStore;
