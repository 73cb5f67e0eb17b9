//! HTTP route handlers for the admin binary.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check (unauthenticated)
//!
//! # Orders (bearer token required)
//! GET  /orders[?status=pending]      - Order queue, optionally by status
//! GET  /orders/{id}                  - One order
//! POST /orders/{id}/approve          - pending -> processing
//! POST /orders/{id}/cancel           - pending -> cancelled
//! POST /orders/{id}/ship             - processing -> shipped
//! POST /orders/{id}/deliver          - shipped -> delivered
//! POST /orders/{id}/returns/approve  - return_requested -> returned
//! ```

pub mod orders;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::require_admin;
use crate::state::AppState;

/// Create the order management routes router.
pub fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/approve", post(orders::approve))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/ship", post(orders::ship))
        .route("/{id}/deliver", post(orders::deliver))
        .route("/{id}/returns/approve", post(orders::approve_return))
        .layer(axum::middleware::from_fn_with_state(state, require_admin))
}

/// Health check endpoint.
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Assemble the full admin router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/orders", order_routes(state))
}
