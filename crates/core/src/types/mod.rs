//! Core types for Clementine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod identity;
pub mod price;
pub mod status;

pub use id::*;
pub use identity::CartIdentity;
pub use price::{CurrencyCode, Price};
pub use status::*;
