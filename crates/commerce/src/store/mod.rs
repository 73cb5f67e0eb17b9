//! Store traits and backends for carts and orders.
//!
//! Two backends implement the same traits: [`memory`] (tests, local dev) and
//! [`postgres`] (production). The service layer owns invariant enforcement;
//! the stores guarantee only the primitives those invariants need:
//!
//! - `CartStore::move_line` transfers one line between identities atomically,
//!   which is what makes the login merge resumable after a crash
//! - `OrderStore::insert` refuses a second order for the same payment
//!   authorization handle (`StoreError::Conflict`)
//! - `OrderStore::transition` is a status compare-and-swap: it commits only
//!   if the stored status still matches the expected source status

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use clementine_core::{AuthorizationHandle, CartIdentity, OrderId, OrderStatus, ProductId};

use crate::model::{CartLine, NewOrder, Order};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uniqueness violated (e.g., second order for one payment handle).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Row does not exist.
    #[error("not found")]
    NotFound,

    /// Stored data failed validation on read.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Backend is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Cart line persistence, keyed by cart identity and product.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All lines for an identity, in insertion order.
    async fn lines(&self, identity: &CartIdentity) -> Result<Vec<CartLine>, StoreError>;

    /// The line for one product, if present.
    async fn find_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, StoreError>;

    /// Insert or replace the line for `line.product_id`.
    async fn upsert_line(
        &self,
        identity: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError>;

    /// Delete the line for one product. Removing an absent line is a no-op.
    async fn remove_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<(), StoreError>;

    /// Atomically write `line` under `to` and delete the same product's line
    /// under `from`. Used by the login merge so a processed line leaves the
    /// guest cart in the same step that lands it in the user cart.
    async fn move_line(
        &self,
        from: &CartIdentity,
        to: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError>;

    /// Delete all lines for an identity.
    async fn clear(&self, identity: &CartIdentity) -> Result<(), StoreError>;
}

/// Filter for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub placed_by: Option<CartIdentity>,
    pub status: Option<OrderStatus>,
}

/// Status-dependent metadata written together with a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionMeta {
    pub return_reason: Option<String>,
    pub refund_date: Option<DateTime<Utc>>,
}

/// Order persistence and the transition commit point.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Create an order with status `pending`.
    ///
    /// Fails with [`StoreError::Conflict`] if an order already exists for
    /// `order.payment_handle`.
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// The order created for a payment authorization, if any.
    async fn find_by_handle(
        &self,
        handle: &AuthorizationHandle,
    ) -> Result<Option<Order>, StoreError>;

    /// Orders matching the filter, newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Compare-and-swap status update.
    ///
    /// Commits `from -> to` plus `meta` only if the stored status equals
    /// `from`. Returns the updated order, or `None` if the stored status
    /// differed (a concurrent transition won). [`StoreError::NotFound`] if
    /// the order does not exist.
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        meta: TransitionMeta,
    ) -> Result<Option<Order>, StoreError>;
}
