//! Storefront data models.
//!
//! Session-stored types and the JSON view types handlers return.

pub mod session;
pub mod views;

pub use session::{CurrentUser, session_keys};
pub use views::{CartLineView, CartView, CheckoutStartedView};
