//! Data models for the category tree and product pricing.
//!
//! This module contains the flat category representation with its
//! validation helpers, the two-space identifier types, and pricing tiers.

mod category;
mod ids;
mod tier;

pub use category::{Category, CategoryRow, StoredCategory, validate_collection, validate_name};
pub use ids::{CategoryId, LocalId, PersistentId};
pub use tier::{PricingTier, ProductPricing};
