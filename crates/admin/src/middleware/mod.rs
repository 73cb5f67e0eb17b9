//! HTTP middleware for the admin binary.

pub mod auth;

pub use auth::require_admin;
