//! Cart route handlers.
//!
//! Every handler resolves the request to a single [`CartIdentity`] up front
//! (guest token from the session, user id from auth) and hands it to the
//! cart service; nothing downstream re-derives identity. Resolution also
//! runs the guest -> user merge whenever both are present, which makes the
//! merge safe to trigger from any cart request after login.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use clementine_commerce::pricing;
use clementine_core::{CartIdentity, GuestToken, ProductId};

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::{CartView, CurrentUser, session_keys};
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the guest cart token from the session.
async fn guest_token(session: &Session) -> Option<GuestToken> {
    session
        .get::<GuestToken>(session_keys::GUEST_CART_TOKEN)
        .await
        .ok()
        .flatten()
}

/// Resolve the request to a cart identity, running the merge when a guest
/// token and an authenticated user are both present. Returns `None` for a
/// fully anonymous request with no cart yet.
pub async fn resolve_identity(
    state: &AppState,
    session: &Session,
    user: Option<CurrentUser>,
) -> Result<Option<CartIdentity>> {
    let token = guest_token(session).await;
    let Some(resolution) = state
        .resolver()
        .resolve(token, user.map(|u| u.id))
        .await?
    else {
        return Ok(None);
    };

    // The guest cart is gone; revoke the client-held token.
    if resolution.merged.is_some() {
        let _revoked = session
            .remove::<GuestToken>(session_keys::GUEST_CART_TOKEN)
            .await?;
    }

    Ok(Some(resolution.identity))
}

/// Resolve the identity, minting a guest token on first cart mutation.
async fn resolve_or_create_identity(
    state: &AppState,
    session: &Session,
    user: Option<CurrentUser>,
) -> Result<CartIdentity> {
    if let Some(identity) = resolve_identity(state, session, user).await? {
        return Ok(identity);
    }

    let token = GuestToken::generate();
    session
        .insert(session_keys::GUEST_CART_TOKEN, token)
        .await?;
    Ok(CartIdentity::Guest(token))
}

/// Build the cart view for an identity (empty view when there is none).
async fn cart_view(state: &AppState, identity: Option<&CartIdentity>) -> Result<CartView> {
    let currency = state.pricing().currency;
    let Some(identity) = identity else {
        return Ok(CartView::empty(currency));
    };

    let lines = state.carts().priced_lines(identity).await?;
    if lines.is_empty() {
        return Ok(CartView::empty(currency));
    }

    let totals = pricing::compute_totals(&lines, state.pricing())?;
    Ok(CartView::from_lines(lines, totals))
}

// =============================================================================
// Request Types
// =============================================================================

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
}

/// Set quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Cart count response.
#[derive(Debug, serde::Serialize)]
pub struct CartCount {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart with priced lines and totals.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Json<CartView>> {
    let identity = resolve_identity(&state, &session, auth).await?;
    Ok(Json(cart_view(&state, identity.as_ref()).await?))
}

/// Cart item count badge.
#[instrument(skip(state, session, auth))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Json<CartCount>> {
    let count = match resolve_identity(&state, &session, auth).await? {
        Some(identity) => state.carts().item_count(&identity).await?,
        None => 0,
    };
    Ok(Json(CartCount { count }))
}

/// Add an item to the cart, creating the guest cart on first use.
#[instrument(skip(state, session, auth))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Json(form): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let identity = resolve_or_create_identity(&state, &session, auth).await?;
    state
        .carts()
        .add_item(&identity, form.product_id, form.quantity.unwrap_or(1))
        .await?;
    Ok(Json(cart_view(&state, Some(&identity)).await?))
}

/// Set an item's quantity to an absolute value.
#[instrument(skip(state, session, auth))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Json(form): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let identity = resolve_or_create_identity(&state, &session, auth).await?;
    state
        .carts()
        .set_quantity(&identity, form.product_id, form.quantity)
        .await?;
    Ok(Json(cart_view(&state, Some(&identity)).await?))
}

/// Remove an item. Removing an absent item is a success.
#[instrument(skip(state, session, auth))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Path(product_id): Path<i32>,
) -> Result<Json<CartView>> {
    let identity = resolve_identity(&state, &session, auth).await?;
    if let Some(identity) = &identity {
        state
            .carts()
            .remove_item(identity, ProductId::new(product_id))
            .await?;
    }
    Ok(Json(cart_view(&state, identity.as_ref()).await?))
}

/// Empty the cart.
#[instrument(skip(state, session, auth))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Json<CartView>> {
    if let Some(identity) = resolve_identity(&state, &session, auth).await? {
        state.carts().clear(&identity).await?;
    }
    Ok(Json(CartView::empty(state.pricing().currency)))
}
