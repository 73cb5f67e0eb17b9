//! Shared pricing rule for cart summaries and order totals.
//!
//! The cart page and the checkout commit must agree on every amount, so both
//! go through [`compute_totals`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clementine_core::{CurrencyCode, Price};

use crate::error::CommerceError;
use crate::model::{OrderLine, Totals};

/// Pricing knobs, loaded from configuration by the binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: CurrencyCode,
    /// Subtotals strictly above this ship free.
    pub free_shipping_threshold: Decimal,
    pub standard_shipping_rate: Decimal,
    /// Fraction of the subtotal, e.g. 0.08 for 8%.
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::USD,
            free_shipping_threshold: Decimal::new(10000, 2), // 100.00
            standard_shipping_rate: Decimal::new(750, 2),    // 7.50
            tax_rate: Decimal::new(8, 2),                    // 8%
        }
    }
}

/// Compute subtotal, shipping, tax, and total for a set of priced lines.
///
/// Shipping is zero when the subtotal exceeds the free-shipping threshold,
/// otherwise the standard rate. Tax is `subtotal * tax_rate`, rounded to two
/// decimal places.
///
/// # Errors
///
/// Returns [`CommerceError::Pricing`] on arithmetic overflow or currency
/// mismatch between lines.
pub fn compute_totals(lines: &[OrderLine], config: &PricingConfig) -> Result<Totals, CommerceError> {
    let mut subtotal = Price::zero(config.currency);
    for line in lines {
        let line_total = line
            .unit_price
            .checked_mul_quantity(line.quantity)
            .ok_or(CommerceError::Pricing)?;
        subtotal = subtotal
            .checked_add(&line_total)
            .ok_or(CommerceError::Pricing)?;
    }

    let shipping_amount = if subtotal.amount > config.free_shipping_threshold {
        Decimal::ZERO
    } else {
        config.standard_shipping_rate
    };
    let shipping = Price::new(shipping_amount, config.currency);

    let tax_amount = subtotal
        .amount
        .checked_mul(config.tax_rate)
        .ok_or(CommerceError::Pricing)?
        .round_dp(2);
    let tax = Price::new(tax_amount, config.currency);

    let total = subtotal
        .checked_add(&shipping)
        .and_then(|t| t.checked_add(&tax))
        .ok_or(CommerceError::Pricing)?;

    Ok(Totals {
        subtotal,
        shipping,
        tax,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clementine_core::ProductId;
    use rust_decimal::dec;

    fn line(price: Decimal, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(1),
            title: "Widget".to_owned(),
            unit_price: Price::new(price, CurrencyCode::USD),
            quantity,
        }
    }

    #[test]
    fn test_standard_shipping_below_threshold() {
        let totals =
            compute_totals(&[line(dec!(20.00), 2)], &PricingConfig::default()).expect("totals");
        assert_eq!(totals.subtotal.amount, dec!(40.00));
        assert_eq!(totals.shipping.amount, dec!(7.50));
        assert_eq!(totals.tax.amount, dec!(3.20));
        assert_eq!(totals.total.amount, dec!(50.70));
    }

    #[test]
    fn test_free_shipping_above_threshold() {
        let totals =
            compute_totals(&[line(dec!(60.00), 2)], &PricingConfig::default()).expect("totals");
        assert_eq!(totals.subtotal.amount, dec!(120.00));
        assert_eq!(totals.shipping.amount, Decimal::ZERO);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly at the threshold still pays shipping.
        let totals =
            compute_totals(&[line(dec!(100.00), 1)], &PricingConfig::default()).expect("totals");
        assert_eq!(totals.shipping.amount, dec!(7.50));
    }

    #[test]
    fn test_tax_rounds_to_cents() {
        let totals =
            compute_totals(&[line(dec!(9.99), 1)], &PricingConfig::default()).expect("totals");
        // 9.99 * 0.08 = 0.7992 -> 0.80
        assert_eq!(totals.tax.amount, dec!(0.80));
    }

    #[test]
    fn test_empty_lines_yield_shipping_only() {
        let totals = compute_totals(&[], &PricingConfig::default()).expect("totals");
        assert_eq!(totals.subtotal.amount, Decimal::ZERO);
        assert_eq!(totals.shipping.amount, dec!(7.50));
    }
}
