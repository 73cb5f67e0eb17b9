//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart (JSON)
//! GET    /cart                     - Cart with priced lines and totals
//! GET    /cart/count               - Cart item count badge
//! POST   /cart/items               - Add item to cart
//! PUT    /cart/items               - Set item quantity
//! DELETE /cart/items/{product_id}  - Remove item
//! DELETE /cart                     - Empty the cart
//!
//! # Checkout
//! POST /checkout           - Shipping step: validate, price, authorize payment
//! POST /checkout/complete  - Commit: create order, clear cart
//!
//! # Orders (customer)
//! GET  /orders               - Caller's order history
//! GET  /orders/{id}          - One order
//! POST /orders/{id}/cancel   - Customer cancellation
//! POST /orders/{id}/return   - Request a return
//!
//! # Auth (session establishment from the identity provider)
//! POST   /auth/session  - Establish the user session; merges the guest cart
//! DELETE /auth/session  - Logout
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::middleware::{cart_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add).put(cart::update))
        .route("/items/{product_id}", delete(cart::remove))
        .layer(cart_rate_limiter())
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::begin))
        .route("/complete", post(checkout::complete))
        .layer(checkout_rate_limiter())
}

/// Create the customer order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/return", post(orders::request_return))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/session", post(auth::login).delete(auth::logout))
}

/// Health check endpoint.
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Assemble the full storefront router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/auth", auth_routes())
}
