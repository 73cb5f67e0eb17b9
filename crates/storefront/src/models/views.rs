//! JSON view types returned by the storefront API.

use serde::Serialize;

use clementine_commerce::{OrderLine, Totals};
use clementine_core::{AuthorizationHandle, CurrencyCode, Price, ProductId};

/// One cart line, priced for display.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// Cart page payload: priced lines plus the shared totals summary.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub totals: Totals,
}

impl CartView {
    /// An empty cart. Totals are all zero; the shipping rate only applies
    /// once there is something to ship.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        let zero = Price::zero(currency);
        Self {
            lines: Vec::new(),
            item_count: 0,
            totals: Totals {
                subtotal: zero,
                shipping: zero,
                tax: zero,
                total: zero,
            },
        }
    }

    /// Build the view from catalog-priced lines and computed totals.
    #[must_use]
    pub fn from_lines(lines: Vec<OrderLine>, totals: Totals) -> Self {
        let item_count = lines.iter().map(|l| l.quantity).sum();
        let lines = lines
            .into_iter()
            .map(|line| {
                let line_total = line
                    .unit_price
                    .checked_mul_quantity(line.quantity)
                    .unwrap_or(line.unit_price);
                CartLineView {
                    product_id: line.product_id,
                    title: line.title,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total,
                }
            })
            .collect();
        Self {
            lines,
            item_count,
            totals,
        }
    }
}

/// Response of the checkout shipping step.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStartedView {
    /// Handle the client confirms with the payment provider out-of-band.
    pub handle: AuthorizationHandle,
    /// Totals the authorization is scoped to.
    pub totals: Totals,
}
