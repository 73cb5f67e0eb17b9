//! In-memory store backend.
//!
//! Backs the integration tests and local development. Upholds the same
//! contracts as the Postgres backend: insertion-ordered cart lines, one order
//! per payment handle, compare-and-swap transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use clementine_core::{AuthorizationHandle, CartIdentity, OrderId, OrderStatus, ProductId};

use super::{CartStore, OrderFilter, OrderStore, StoreError, TransitionMeta};
use crate::model::{CartLine, NewOrder, Order};

/// In-memory cart store. Lines per identity keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<String, Vec<CartLine>>>,
    fail_writes: AtomicBool,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: make every subsequent write fail as unavailable.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write failure injected".to_owned()));
        }
        Ok(())
    }
}

fn upsert_into(lines: &mut Vec<CartLine>, line: CartLine) {
    match lines.iter_mut().find(|l| l.product_id == line.product_id) {
        Some(existing) => *existing = line,
        None => lines.push(line),
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn lines(&self, identity: &CartIdentity) -> Result<Vec<CartLine>, StoreError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&identity.storage_key()).cloned().unwrap_or_default())
    }

    async fn find_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, StoreError> {
        let carts = self.carts.read().await;
        Ok(carts
            .get(&identity.storage_key())
            .and_then(|lines| lines.iter().find(|l| l.product_id == product_id))
            .cloned())
    }

    async fn upsert_line(
        &self,
        identity: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut carts = self.carts.write().await;
        upsert_into(carts.entry(identity.storage_key()).or_default(), line);
        Ok(())
    }

    async fn remove_line(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut carts = self.carts.write().await;
        if let Some(lines) = carts.get_mut(&identity.storage_key()) {
            lines.retain(|l| l.product_id != product_id);
            if lines.is_empty() {
                carts.remove(&identity.storage_key());
            }
        }
        Ok(())
    }

    async fn move_line(
        &self,
        from: &CartIdentity,
        to: &CartIdentity,
        line: CartLine,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let product_id = line.product_id;
        // One write guard covers both identities, so the transfer is atomic.
        let mut carts = self.carts.write().await;
        upsert_into(carts.entry(to.storage_key()).or_default(), line);
        if let Some(lines) = carts.get_mut(&from.storage_key()) {
            lines.retain(|l| l.product_id != product_id);
            if lines.is_empty() {
                carts.remove(&from.storage_key());
            }
        }
        Ok(())
    }

    async fn clear(&self, identity: &CartIdentity) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut carts = self.carts.write().await;
        carts.remove(&identity.storage_key());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct OrdersInner {
    orders: HashMap<i32, Order>,
    by_handle: HashMap<String, OrderId>,
    next_id: i32,
}

/// In-memory order store.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    inner: RwLock<OrdersInner>,
    fail_inserts: AtomicBool,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: make every subsequent insert fail as unavailable.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "insert failure injected".to_owned(),
            ));
        }

        let mut inner = self.inner.write().await;
        if inner.by_handle.contains_key(order.payment_handle.as_str()) {
            return Err(StoreError::Conflict(format!(
                "order already exists for authorization {}",
                order.payment_handle
            )));
        }

        inner.next_id += 1;
        let id = OrderId::new(inner.next_id);
        let now = Utc::now();
        let stored = Order {
            id,
            placed_by: order.placed_by,
            lines: order.lines,
            shipping: order.shipping,
            totals: order.totals,
            status: OrderStatus::Pending,
            payment_handle: order.payment_handle.clone(),
            return_reason: None,
            refund_date: None,
            created_at: now,
            updated_at: now,
        };
        inner
            .by_handle
            .insert(order.payment_handle.as_str().to_owned(), id);
        inner.orders.insert(id.as_i32(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.orders.get(&id.as_i32()).cloned())
    }

    async fn find_by_handle(
        &self,
        handle: &AuthorizationHandle,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_handle
            .get(handle.as_str())
            .and_then(|id| inner.orders.get(&id.as_i32()))
            .cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| {
                filter
                    .placed_by
                    .is_none_or(|identity| o.placed_by == identity)
                    && filter.status.is_none_or(|status| o.status == status)
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.as_i32().cmp(&a.id.as_i32())));
        Ok(orders)
    }

    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        meta: TransitionMeta,
    ) -> Result<Option<Order>, StoreError> {
        let mut inner = self.inner.write().await;
        let order = inner.orders.get_mut(&id.as_i32()).ok_or(StoreError::NotFound)?;
        if order.status != from {
            return Ok(None);
        }
        order.status = to;
        if let Some(reason) = meta.return_reason {
            order.return_reason = Some(reason);
        }
        if let Some(refund_date) = meta.refund_date {
            order.refund_date = Some(refund_date);
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

/// Convenience pair of shared in-memory backends.
#[must_use]
pub fn shared() -> (Arc<MemoryCartStore>, Arc<MemoryOrderStore>) {
    (
        Arc::new(MemoryCartStore::new()),
        Arc::new(MemoryOrderStore::new()),
    )
}
