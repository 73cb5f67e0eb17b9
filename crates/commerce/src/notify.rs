//! Notification and alert sinks.
//!
//! Both are fire-and-forget from the commerce core's perspective: a sink
//! failure is logged and never rolls back a committed cart or order mutation.
//! The alert sink is separate from the notification sink because
//! reconciliation failures (money moved, no order) need operational paging,
//! not customer email.

use async_trait::async_trait;
use thiserror::Error;

use clementine_core::{AuthorizationHandle, CartIdentity, OrderStatus};

use crate::model::Order;
use crate::store::StoreError;

/// Notification delivery failure. Callers log it and move on.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Customer-facing notification sink (email, toast, webhook).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn order_created(&self, order: &Order) -> Result<(), NotifyError>;

    async fn order_status_changed(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> Result<(), NotifyError>;
}

/// Operational alerting sink for failures that need out-of-band remediation.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Payment captured but order creation failed.
    async fn reconciliation_failure(
        &self,
        handle: &AuthorizationHandle,
        identity: &CartIdentity,
        error: &StoreError,
    );
}

/// Notification sink that only logs. Default for local dev and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(order_id = %order.id, total = %order.totals.total, "order created");
        Ok(())
    }

    async fn order_status_changed(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %order.status,
            "order status changed"
        );
        Ok(())
    }
}

/// Alert sink that logs at error level. The storefront wraps this with
/// Sentry capture in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn reconciliation_failure(
        &self,
        handle: &AuthorizationHandle,
        identity: &CartIdentity,
        error: &StoreError,
    ) {
        tracing::error!(
            authorization = %handle,
            identity = %identity,
            error = %error,
            "reconciliation failure: payment captured but order creation failed"
        );
    }
}
