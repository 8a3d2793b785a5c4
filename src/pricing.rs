//! Quantity-dependent unit prices and subscription discounts.
//!
//! All functions are pure: a quantity change simply calls them again.
//! Nothing is rounded here; currency formatting belongs to the caller.

use crate::models::{PricingTier, ProductPricing};

/// Multiplier applied to the unit price of subscription orders.
pub const SUBSCRIPTION_DISCOUNT_RATE: f64 = 0.95;

/// Returns the tier active for `quantity`: the one with the greatest
/// `min_quantity` not above it. Among equal thresholds the first listed
/// wins.
#[must_use]
pub fn active_tier(tiers: &[PricingTier], quantity: u32) -> Option<&PricingTier> {
    tiers
        .iter()
        .filter(|tier| tier.min_quantity <= quantity)
        .fold(None, |best: Option<&PricingTier>, tier| match best {
            Some(current) if current.min_quantity >= tier.min_quantity => Some(current),
            Some(_) | None => Some(tier),
        })
}

/// Resolves the unit price for `quantity`.
///
/// Falls back to `base_price` when there are no tiers or no tier
/// threshold is reached (including a quantity of zero).
#[inline]
#[must_use]
pub fn resolve_unit_price(base_price: f64, tiers: &[PricingTier], quantity: u32) -> f64 {
    active_tier(tiers, quantity).map_or(base_price, |tier| tier.unit_price)
}

/// Applies the subscription discount to an already resolved unit price.
#[inline]
#[must_use]
pub fn apply_subscription_discount(unit_price: f64, is_subscription: bool) -> f64 {
    if is_subscription {
        unit_price * SUBSCRIPTION_DISCOUNT_RATE
    } else {
        unit_price
    }
}

/// Total for a cart line: the tier is chosen from the raw quantity, the
/// discount applies to the tier price, then the quantity multiplies.
#[inline]
#[must_use]
pub fn line_total(
    base_price: f64,
    tiers: &[PricingTier],
    quantity: u32,
    is_subscription: bool,
) -> f64 {
    apply_subscription_discount(
        resolve_unit_price(base_price, tiers, quantity),
        is_subscription,
    ) * f64::from(quantity)
}

/// Returns the cheapest-threshold tier above `quantity`, for "order N more
/// to pay X" hints.
#[must_use]
pub fn next_tier(tiers: &[PricingTier], quantity: u32) -> Option<&PricingTier> {
    tiers
        .iter()
        .filter(|tier| tier.min_quantity > quantity)
        .fold(None, |best: Option<&PricingTier>, tier| match best {
            Some(current) if current.min_quantity <= tier.min_quantity => Some(current),
            Some(_) | None => Some(tier),
        })
}

/// A fully resolved price for one cart line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// Ordered quantity.
    pub quantity: u32,
    /// Tier that set the unit price, `None` when the base price applies.
    pub tier: Option<PricingTier>,
    /// Unit price before the subscription discount.
    pub unit_price: f64,
    /// Unit price after the subscription discount.
    pub discounted_unit_price: f64,
    /// Line total.
    pub total: f64,
}

/// Builds a [`PriceQuote`] for `quantity` units of a product.
#[must_use]
pub fn quote(pricing: &ProductPricing, quantity: u32, is_subscription: bool) -> PriceQuote {
    let tier = active_tier(&pricing.tiers, quantity).copied();
    let unit_price = tier.map_or(pricing.base_price, |active| active.unit_price);
    let discounted_unit_price = apply_subscription_discount(unit_price, is_subscription);
    PriceQuote {
        quantity,
        tier,
        unit_price,
        discounted_unit_price,
        total: discounted_unit_price * f64::from(quantity),
    }
}
