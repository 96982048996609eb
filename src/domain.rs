//! Domain model: catalog entities, allergen vocabulary, and the pure
//! comparison logic built on them.

pub mod allergens;
pub mod comparison;
pub mod entities;
pub mod shopping_list;
