//! Customer order route handlers.
//!
//! Orders belong to the identity that placed them (user or guest); every
//! handler resolves the caller's identity and the service enforces
//! ownership. Status changes go through the shared transition table, so a
//! stale UI can never force an invalid transition.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use clementine_commerce::{CommerceError, Order};
use clementine_core::{OrderAction, OrderId};

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::routes::cart::resolve_identity;
use crate::state::AppState;

/// Return request body.
#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub reason: Option<String>,
}

/// The caller's order history, newest first.
#[instrument(skip(state, session, auth))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = match resolve_identity(&state, &session, auth).await? {
        Some(identity) => state.orders().list_for(&identity).await?,
        None => Vec::new(),
    };
    Ok(Json(orders))
}

/// One of the caller's orders.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let id = OrderId::new(id);
    let identity = resolve_identity(&state, &session, auth)
        .await?
        .ok_or(CommerceError::OrderNotFound(id))?;
    let order = state.orders().get_for(id, &identity).await?;
    Ok(Json(order))
}

/// Customer cancellation (allowed while pending or processing).
#[instrument(skip(state, session, auth))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    let id = OrderId::new(id);
    let identity = resolve_identity(&state, &session, auth)
        .await?
        .ok_or(CommerceError::OrderNotFound(id))?;
    let order = state
        .orders()
        .apply_as_customer(id, OrderAction::CustomerCancel, &identity, None)
        .await?;
    Ok(Json(order))
}

/// Request a return of a delivered order.
#[instrument(skip(state, session, auth, form))]
pub async fn request_return(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Path(id): Path<i32>,
    Json(form): Json<ReturnRequest>,
) -> Result<Json<Order>> {
    let id = OrderId::new(id);
    let identity = resolve_identity(&state, &session, auth)
        .await?
        .ok_or(CommerceError::OrderNotFound(id))?;
    let order = state
        .orders()
        .apply_as_customer(id, OrderAction::RequestReturn, &identity, form.reason)
        .await?;
    Ok(Json(order))
}
