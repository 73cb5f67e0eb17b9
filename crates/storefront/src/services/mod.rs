//! Storefront-side service adapters.
//!
//! The commerce crate owns the business logic; this module holds the
//! production implementations of its collaborator traits that depend on
//! storefront infrastructure (Sentry).

pub mod alert;
