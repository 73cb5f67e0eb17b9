//! Order inspection commands.
//!
//! Read-only operational views over the order store; status changes go
//! through the admin API, not the CLI.

use std::sync::Arc;

use clementine_commerce::store::postgres::{PgOrderStore, create_pool};
use clementine_commerce::store::{OrderFilter, OrderStore};
use clementine_core::{OrderId, OrderStatus};

/// Order command failure.
#[derive(Debug, thiserror::Error)]
pub enum OrdersError {
    #[error(transparent)]
    MissingEnvVar(#[from] super::MissingEnvVar),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] clementine_commerce::store::StoreError),

    #[error("Invalid status filter: {0}")]
    InvalidStatus(String),

    #[error("Order not found: {0}")]
    NotFound(OrderId),
}

async fn store() -> Result<Arc<PgOrderStore>, OrdersError> {
    let database_url = super::database_url()?;
    let pool = create_pool(&database_url).await?;
    Ok(Arc::new(PgOrderStore::new(pool)))
}

/// List orders, newest first, optionally filtered by status.
///
/// # Errors
///
/// Returns `OrdersError` on connection failure or an unknown status value.
pub async fn list(status: Option<&str>) -> Result<(), OrdersError> {
    let status = status
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(OrdersError::InvalidStatus)?;

    let orders = store()
        .await?
        .list(&OrderFilter {
            placed_by: None,
            status,
        })
        .await?;

    #[allow(clippy::print_stdout)]
    for order in orders {
        println!(
            "#{:<6} {:<18} {:>10}  {}",
            order.id,
            order.status.to_string(),
            order.totals.total.display(),
            order.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Print one order as JSON.
///
/// # Errors
///
/// Returns `OrdersError::NotFound` if the order does not exist.
pub async fn show(id: i32) -> Result<(), OrdersError> {
    let id = OrderId::new(id);
    let order = store()
        .await?
        .get(id)
        .await?
        .ok_or(OrdersError::NotFound(id))?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{}",
            serde_json::to_string_pretty(&order).unwrap_or_else(|e| format!("serialize error: {e}"))
        );
    }
    Ok(())
}
