//! Commerce error taxonomy.
//!
//! Recoverable rejections (quantity, shipping, transitions) carry the
//! specific reason so callers can surface it inline; infrastructure failures
//! (store, catalog, payment provider) are retryable and leave no partial
//! state behind; reconciliation failures are neither and get their own
//! variant so they can be alerted distinctly.

use thiserror::Error;

use clementine_core::{AuthorizationHandle, InvalidTransition, OrderId, ProductId};

use crate::catalog::CatalogError;
use crate::model::ShippingError;
use crate::payment::PaymentError;
use crate::store::StoreError;

/// Error type for all commerce service operations.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Requested quantity exceeds the per-product cart ceiling.
    #[error("quantity ceiling exceeded: at most {limit} per product")]
    QuantityCeiling { limit: u32 },

    /// Requested quantity exceeds available stock.
    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: u32 },

    /// Quantity would fall below 1; removal goes through the remove operation.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Shipping field validation failed.
    #[error(transparent)]
    InvalidShipping(#[from] ShippingError),

    /// Order status does not permit the attempted action.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Product is not in the catalog.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Caller is not allowed to act on this entity.
    #[error("forbidden")]
    Forbidden,

    /// Checkout cannot proceed on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The checkout attempt for this handle is unknown or has expired.
    ///
    /// Retryable: the client restarts the shipping step; no payment has been
    /// consumed against the forgotten attempt.
    #[error("checkout attempt expired for authorization {0}")]
    AttemptExpired(AuthorizationHandle),

    /// The payment provider has not reported success for this handle.
    #[error("payment not confirmed for authorization {0}")]
    PaymentNotConfirmed(AuthorizationHandle),

    /// Payment succeeded but order creation failed.
    ///
    /// Not locally recoverable; surfaced generically to the user and reported
    /// through the alert sink for out-of-band remediation.
    #[error("order creation failed after payment capture for authorization {0}")]
    Reconciliation(AuthorizationHandle),

    /// Money arithmetic overflowed or mixed currencies.
    #[error("price computation failed")]
    Pricing,

    /// Backing store failure. Retryable; no partial state is left behind.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog service failure. Retryable.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Payment provider failure. Retryable.
    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),
}

impl CommerceError {
    /// Stable machine-readable reason code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::QuantityCeiling { .. } => "QUANTITY_CEILING",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InvalidShipping(_) => "INVALID_SHIPPING",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::UnknownProduct(_) => "UNKNOWN_PRODUCT",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::EmptyCart => "EMPTY_CART",
            Self::AttemptExpired(_) => "CHECKOUT_EXPIRED",
            Self::PaymentNotConfirmed(_) => "PAYMENT_NOT_CONFIRMED",
            Self::Reconciliation(_) => "RECONCILIATION_FAILURE",
            Self::Pricing => "PRICING_ERROR",
            Self::Store(_) | Self::Catalog(_) | Self::Payment(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Whether the caller can retry the same request and expect success once
    /// the underlying collaborator recovers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Catalog(_) | Self::Payment(_) | Self::AttemptExpired(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct_for_rejections() {
        let ceiling = CommerceError::QuantityCeiling { limit: 10 };
        let stock = CommerceError::InsufficientStock { available: 2 };
        assert_ne!(ceiling.code(), stock.code());
        assert_eq!(ceiling.code(), "QUANTITY_CEILING");
        assert_eq!(stock.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_reconciliation_is_not_retryable() {
        let err = CommerceError::Reconciliation(AuthorizationHandle::new("auth_1"));
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "RECONCILIATION_FAILURE");
    }
}
