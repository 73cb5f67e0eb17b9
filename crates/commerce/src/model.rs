//! Domain models: cart lines, orders, shipping details, totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clementine_core::{AuthorizationHandle, CartIdentity, OrderId, OrderStatus, Price, ProductId};

/// One product line in a cart.
///
/// Unique per `(identity, product_id)`; the identity is the storage key, not
/// part of the line itself. `unit_price` is the price snapshot taken when the
/// line was first added and is display-only: totals are always computed from
/// live catalog prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Option<Price>,
    pub added_at: DateTime<Utc>,
}

/// One line of an order snapshot. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// Order totals computed by the shared pricing rule at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

/// Validated shipping details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    name: String,
    phone: String,
    address: String,
}

/// Shipping field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingError {
    #[error("name must be at least 2 characters")]
    NameTooShort,
    #[error("phone number must contain at least 7 digits")]
    PhoneInvalid,
    #[error("address must be at least 5 characters")]
    AddressTooShort,
}

impl ShippingError {
    /// The offending field, for field-specific client messages.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::NameTooShort => "name",
            Self::PhoneInvalid => "phone",
            Self::AddressTooShort => "address",
        }
    }
}

impl ShippingDetails {
    /// Validate and normalize raw shipping input.
    ///
    /// # Errors
    ///
    /// Returns the first failing field: name shorter than 2 characters, phone
    /// with fewer than 7 digits after stripping formatting, or an address
    /// with fewer than 5 non-whitespace characters.
    pub fn parse(name: &str, phone: &str, address: &str) -> Result<Self, ShippingError> {
        let name = name.trim();
        if name.chars().count() < 2 {
            return Err(ShippingError::NameTooShort);
        }

        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 7 {
            return Err(ShippingError::PhoneInvalid);
        }

        let address = address.trim();
        if address.chars().filter(|c| !c.is_whitespace()).count() < 5 {
            return Err(ShippingError::AddressTooShort);
        }

        Ok(Self {
            name: name.to_owned(),
            phone: digits,
            address: address.to_owned(),
        })
    }

    /// Reconstruct already-validated details (e.g., from a database row).
    #[must_use]
    pub const fn from_stored(name: String, phone: String, address: String) -> Self {
        Self {
            name,
            phone,
            address,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized phone number (digits only).
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// A placed order.
///
/// Immutable except for `status` and its status-dependent metadata
/// (`return_reason`, `refund_date`). Orders are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Identity that placed the order; customer actions require it to match.
    pub placed_by: CartIdentity,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingDetails,
    pub totals: Totals,
    pub status: OrderStatus,
    /// Payment authorization this order was created for. At most one order
    /// exists per handle.
    pub payment_handle: AuthorizationHandle,
    pub return_reason: Option<String>,
    pub refund_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for order creation; the store assigns id, status, and timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub placed_by: CartIdentity,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingDetails,
    pub totals: Totals,
    pub payment_handle: AuthorizationHandle,
}
