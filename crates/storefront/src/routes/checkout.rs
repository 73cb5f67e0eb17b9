//! Checkout route handlers.
//!
//! Two steps: the shipping step validates input and returns a payment
//! authorization handle; the client confirms the payment with the provider
//! out-of-band and then calls complete. Retrying complete for the same
//! handle returns the same order.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use clementine_commerce::CommerceError;
use clementine_commerce::Order;
use clementine_core::AuthorizationHandle;

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::CheckoutStartedView;
use crate::routes::cart::resolve_identity;
use crate::state::AppState;

/// Shipping step request body.
#[derive(Debug, Deserialize)]
pub struct BeginCheckoutRequest {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Commit step request body.
#[derive(Debug, Deserialize)]
pub struct CompleteCheckoutRequest {
    pub handle: AuthorizationHandle,
}

/// Shipping step: validate fields, re-validate stock, price the cart, and
/// request a payment authorization scoped to the total.
#[instrument(skip(state, session, auth, form))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Json(form): Json<BeginCheckoutRequest>,
) -> Result<Json<CheckoutStartedView>> {
    // No identity means no cart was ever created; same outcome as empty.
    let identity = resolve_identity(&state, &session, auth)
        .await?
        .ok_or(CommerceError::EmptyCart)?;

    let started = state
        .checkout()
        .begin(identity, &form.name, &form.phone, &form.address)
        .await?;

    Ok(Json(CheckoutStartedView {
        handle: started.handle,
        totals: started.totals,
    }))
}

/// Commit step: on provider-reported success, create the order and clear
/// the cart. Idempotent per authorization handle.
#[instrument(skip(state, session, auth, form))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Json(form): Json<CompleteCheckoutRequest>,
) -> Result<Json<Order>> {
    let identity = resolve_identity(&state, &session, auth)
        .await?
        .ok_or(CommerceError::EmptyCart)?;

    let order = state.checkout().commit(identity, form.handle).await?;
    Ok(Json(order))
}
