//! Quantity policy: the single ceiling/stock check behind every entry point.
//!
//! Pure and deterministic; "add to cart", "set quantity", and the login merge
//! all delegate here so they observe identical limits.

use crate::error::CommerceError;

/// Validate a quantity change against the per-product ceiling and stock.
///
/// `current` is the quantity already in the cart (0 if no line exists),
/// `delta` the requested change (negative for decreases). Returns the new
/// accepted quantity.
///
/// # Errors
///
/// - [`CommerceError::InvalidQuantity`] if the result would fall below 1;
///   removal goes through the explicit remove operation, never quantity 0.
/// - [`CommerceError::QuantityCeiling`] if the result exceeds `max_per_product`.
/// - [`CommerceError::InsufficientStock`] if the result exceeds `stock`.
pub fn validate(
    current: u32,
    delta: i64,
    stock: u32,
    max_per_product: u32,
) -> Result<u32, CommerceError> {
    let requested = i64::from(current).saturating_add(delta);

    if requested < 1 {
        return Err(CommerceError::InvalidQuantity);
    }
    if requested > i64::from(max_per_product) {
        return Err(CommerceError::QuantityCeiling {
            limit: max_per_product,
        });
    }
    if requested > i64::from(stock) {
        return Err(CommerceError::InsufficientStock { available: stock });
    }

    u32::try_from(requested).map_err(|_| CommerceError::InvalidQuantity)
}

/// The largest quantity the policy would accept for this product.
#[must_use]
pub fn ceiling(stock: u32, max_per_product: u32) -> u32 {
    stock.min(max_per_product)
}
