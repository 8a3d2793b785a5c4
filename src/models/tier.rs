//! Quantity-based pricing tiers.

use serde::{Deserialize, Serialize};

/// One step of a bulk discount: `unit_price` applies from `min_quantity`
/// upwards.
///
/// The expected shape for a product is ascending `min_quantity` with
/// non-increasing `unit_price`; resolution does not rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    /// Threshold at or above which the tier is active.
    pub min_quantity: u32,
    /// Price per unit while the tier is active.
    pub unit_price: f64,
}

impl PricingTier {
    /// Creates a tier.
    #[inline]
    #[must_use]
    pub const fn new(min_quantity: u32, unit_price: f64) -> Self {
        Self {
            min_quantity,
            unit_price,
        }
    }

    /// Returns `true` if the tiers have unique thresholds and the price
    /// never rises as the threshold grows.
    #[must_use]
    pub fn is_bulk_discount_shape(tiers: &[Self]) -> bool {
        let mut sorted = tiers.to_vec();
        sorted.sort_by_key(|tier| tier.min_quantity);
        sorted.iter().zip(sorted.iter().skip(1)).all(|(lower, upper)| {
            lower.min_quantity < upper.min_quantity && upper.unit_price <= lower.unit_price
        })
    }
}

/// Base price plus the tier table of a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricing {
    /// Price when no tier applies.
    pub base_price: f64,
    /// Tier table, any order.
    #[serde(default)]
    pub tiers: Vec<PricingTier>,
}

impl ProductPricing {
    /// Creates pricing with the given base price and no tiers.
    #[inline]
    #[must_use]
    pub const fn new(base_price: f64) -> Self {
        Self {
            base_price,
            tiers: Vec::new(),
        }
    }

    /// Adds a tier.
    #[inline]
    #[must_use]
    pub fn tier(mut self, min_quantity: u32, unit_price: f64) -> Self {
        self.tiers.push(PricingTier::new(min_quantity, unit_price));
        self
    }
}
