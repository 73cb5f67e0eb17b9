//! Order lifecycle service.
//!
//! Applies customer and admin actions through the single transition table in
//! `clementine_core::OrderStatus::apply`, commits via the store's status
//! compare-and-swap, and fans out status-change notifications. Concurrent
//! transitions for one order resolve to exactly one winner; the loser gets
//! `INVALID_TRANSITION` and is expected to re-fetch.

use std::sync::Arc;

use chrono::Utc;

use clementine_core::{Actor, CartIdentity, InvalidTransition, OrderAction, OrderId};

use crate::error::CommerceError;
use crate::model::Order;
use crate::notify::NotificationSink;
use crate::store::{OrderFilter, OrderStore, TransitionMeta};

/// Order queries and status transitions.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl OrderService {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// [`CommerceError::OrderNotFound`] if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, CommerceError> {
        self.store
            .get(id)
            .await?
            .ok_or(CommerceError::OrderNotFound(id))
    }

    /// Fetch an order on behalf of the identity that placed it.
    ///
    /// # Errors
    ///
    /// [`CommerceError::OrderNotFound`] for both "does not exist" and "not
    /// yours": customers cannot probe other customers' order ids.
    pub async fn get_for(
        &self,
        id: OrderId,
        identity: &CartIdentity,
    ) -> Result<Order, CommerceError> {
        let order = self.get(id).await?;
        if order.placed_by != *identity {
            return Err(CommerceError::OrderNotFound(id));
        }
        Ok(order)
    }

    /// Orders matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, CommerceError> {
        Ok(self.store.list(filter).await?)
    }

    /// All orders placed by an identity, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn list_for(&self, identity: &CartIdentity) -> Result<Vec<Order>, CommerceError> {
        self.list(&OrderFilter {
            placed_by: Some(*identity),
            status: None,
        })
        .await
    }

    /// Apply a customer action (`CustomerCancel`, `RequestReturn`) to the
    /// caller's own order.
    ///
    /// # Errors
    ///
    /// [`CommerceError::Forbidden`] for admin-only actions or someone else's
    /// order; [`CommerceError::InvalidTransition`] when the stored status
    /// does not permit the action.
    pub async fn apply_as_customer(
        &self,
        id: OrderId,
        action: OrderAction,
        identity: &CartIdentity,
        reason: Option<String>,
    ) -> Result<Order, CommerceError> {
        if action.actor() != Actor::Customer {
            return Err(CommerceError::Forbidden);
        }
        let order = self.get_for(id, identity).await?;
        self.transition(order, action, reason).await
    }

    /// Apply an admin action (`Approve`, `Cancel`, `Ship`, `Deliver`,
    /// `ApproveReturn`).
    ///
    /// # Errors
    ///
    /// [`CommerceError::Forbidden`] for customer-only actions;
    /// [`CommerceError::InvalidTransition`] when the stored status does not
    /// permit the action.
    pub async fn apply_as_admin(
        &self,
        id: OrderId,
        action: OrderAction,
    ) -> Result<Order, CommerceError> {
        if action.actor() != Actor::Admin {
            return Err(CommerceError::Forbidden);
        }
        let order = self.get(id).await?;
        self.transition(order, action, None).await
    }

    async fn transition(
        &self,
        order: Order,
        action: OrderAction,
        reason: Option<String>,
    ) -> Result<Order, CommerceError> {
        let next = order.status.apply(action)?;

        let meta = TransitionMeta {
            return_reason: if action == OrderAction::RequestReturn {
                reason
            } else {
                None
            },
            refund_date: (action == OrderAction::ApproveReturn).then(Utc::now),
        };

        match self
            .store
            .transition(order.id, order.status, next, meta)
            .await?
        {
            Some(updated) => {
                if let Err(e) = self
                    .notifications
                    .order_status_changed(&updated, order.status)
                    .await
                {
                    tracing::warn!(order_id = %updated.id, error = %e, "status notification failed");
                }
                Ok(updated)
            }
            None => {
                // A concurrent transition committed first. No retry: the
                // caller re-fetches and decides against the fresh status.
                let current = self
                    .store
                    .get(order.id)
                    .await?
                    .ok_or(CommerceError::OrderNotFound(order.id))?;
                Err(InvalidTransition {
                    from: current.status,
                    action,
                }
                .into())
            }
        }
    }
}
