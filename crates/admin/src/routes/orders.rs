//! Admin order management handlers.
//!
//! Each action maps to one transition in the shared table. The store-level
//! compare-and-swap means two admins (or an admin racing a customer
//! cancellation) resolve to one winner; the loser sees a 409 with the
//! fresh status and re-fetches the queue.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use clementine_commerce::Order;
use clementine_commerce::store::OrderFilter;
use clementine_core::{OrderAction, OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Order queue query parameters.
#[derive(Debug, Deserialize)]
pub struct OrderQueueQuery {
    /// Restrict to one status, e.g. `?status=return_requested`.
    pub status: Option<String>,
}

/// The order queue, newest first, optionally filtered by status.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<OrderQueueQuery>,
) -> Result<Json<Vec<Order>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let orders = state
        .orders()
        .list(&OrderFilter {
            placed_by: None,
            status,
        })
        .await?;
    Ok(Json(orders))
}

/// One order.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Order>> {
    let order = state.orders().get(OrderId::new(id)).await?;
    Ok(Json(order))
}

async fn apply(state: &AppState, id: i32, action: OrderAction) -> Result<Json<Order>> {
    let order = state
        .orders()
        .apply_as_admin(OrderId::new(id), action)
        .await?;
    Ok(Json(order))
}

/// Approve a pending order for fulfillment.
#[instrument(skip(state))]
pub async fn approve(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Order>> {
    apply(&state, id, OrderAction::Approve).await
}

/// Cancel a pending order.
#[instrument(skip(state))]
pub async fn cancel(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Order>> {
    apply(&state, id, OrderAction::Cancel).await
}

/// Mark a processing order shipped.
#[instrument(skip(state))]
pub async fn ship(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Order>> {
    apply(&state, id, OrderAction::Ship).await
}

/// Mark a shipped order delivered.
#[instrument(skip(state))]
pub async fn deliver(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<Order>> {
    apply(&state, id, OrderAction::Deliver).await
}

/// Approve a requested return; sets the refund date.
#[instrument(skip(state))]
pub async fn approve_return(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    apply(&state, id, OrderAction::ApproveReturn).await
}
