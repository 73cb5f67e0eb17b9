//! Clementine Commerce - cart identity, checkout, and order lifecycle.
//!
//! This crate is the service layer behind the storefront and admin binaries.
//! It owns the invariants the HTTP surfaces rely on:
//!
//! - at most one cart per [`clementine_core::CartIdentity`], with all
//!   mutations for an identity serialized through [`locks::KeyedLocks`]
//! - every quantity change (add, set, merge) goes through the same
//!   [`policy::validate`] ceiling/stock checks
//! - the guest -> user cart merge is idempotent and safe to trigger on every
//!   authenticated request
//! - checkout creates exactly one order per payment authorization handle,
//!   and always creates the order before clearing the cart
//! - order status transitions follow the closed table in
//!   [`clementine_core::OrderStatus::apply`] and commit via status
//!   compare-and-swap, so concurrent transitions resolve to one winner
//!
//! Store backends (`store::memory`, `store::postgres`) implement the same
//! traits; collaborators (catalog, payment provider, notification and alert
//! sinks) are trait objects so the binaries can wire real clients and the
//! tests can wire fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod identity;
pub mod locks;
pub mod model;
pub mod notify;
pub mod orders;
pub mod payment;
pub mod policy;
pub mod pricing;
pub mod store;

pub use cart::CartService;
pub use checkout::{CheckoutOrchestrator, CheckoutStarted};
pub use error::CommerceError;
pub use identity::{CartIdentityResolver, Resolution};
pub use model::{CartLine, NewOrder, Order, OrderLine, ShippingDetails, Totals};
pub use orders::OrderService;
pub use pricing::PricingConfig;
