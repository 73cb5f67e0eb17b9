//! Checkout orchestration: shipping step, payment authorization, commit.
//!
//! Per attempt the flow is shipping -> awaiting payment -> completed; an
//! attempt that never completes simply expires out of the registry with no
//! order created and the cart untouched. The commit is idempotent per
//! payment authorization handle and always creates the order before clearing
//! the cart, so a crash between the two leaves "order exists, stale cart"
//! (recoverable) rather than "cart gone, no order" (lost purchase).

use std::sync::Arc;
use std::time::Duration;

use clementine_core::{AuthorizationHandle, CartIdentity};

use crate::catalog::Catalog;
use crate::error::CommerceError;
use crate::locks::KeyedLocks;
use crate::model::{NewOrder, Order, OrderLine, ShippingDetails, Totals};
use crate::notify::{AlertSink, NotificationSink};
use crate::payment::{PaymentProvider, PaymentStatus};
use crate::pricing::{self, PricingConfig};
use crate::store::{CartStore, OrderStore, StoreError};

/// Result of the shipping step: the handle the client confirms out-of-band,
/// plus the totals the authorization was scoped to.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub handle: AuthorizationHandle,
    pub totals: Totals,
}

/// An in-flight checkout attempt, registered between the shipping step and
/// the commit. Evicted by TTL if abandoned.
#[derive(Debug, Clone)]
struct CheckoutAttempt {
    identity: CartIdentity,
    shipping: ShippingDetails,
}

/// Two-phase checkout orchestrator.
pub struct CheckoutOrchestrator {
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    payments: Arc<dyn PaymentProvider>,
    notifications: Arc<dyn NotificationSink>,
    alerts: Arc<dyn AlertSink>,
    locks: KeyedLocks,
    attempts: moka::future::Cache<String, CheckoutAttempt>,
    pricing: PricingConfig,
}

impl CheckoutOrchestrator {
    /// `locks` must be the registry shared with the cart service: the commit
    /// holds the identity lock while it snapshots and clears the cart.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        payments: Arc<dyn PaymentProvider>,
        notifications: Arc<dyn NotificationSink>,
        alerts: Arc<dyn AlertSink>,
        locks: KeyedLocks,
        pricing: PricingConfig,
        attempt_ttl: Duration,
    ) -> Self {
        let attempts = moka::future::Cache::builder()
            .max_capacity(10_000)
            .time_to_live(attempt_ttl)
            .build();
        Self {
            carts,
            orders,
            catalog,
            payments,
            notifications,
            alerts,
            locks,
            attempts,
            pricing,
        }
    }

    /// Shipping step: validate fields, re-validate stock, price the cart,
    /// and request a payment authorization scoped to the total.
    ///
    /// Performs no cart or order mutation.
    ///
    /// # Errors
    ///
    /// - [`CommerceError::InvalidShipping`] with the failing field
    /// - [`CommerceError::EmptyCart`] when there is nothing to buy
    /// - [`CommerceError::InsufficientStock`] if stock dropped since the
    ///   lines were accepted
    /// - collaborator errors (catalog, payment provider), all retryable
    pub async fn begin(
        &self,
        identity: CartIdentity,
        name: &str,
        phone: &str,
        address: &str,
    ) -> Result<CheckoutStarted, CommerceError> {
        let shipping = ShippingDetails::parse(name, phone, address)?;

        let lines = self.carts.lines(&identity).await?;
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let order_lines = self.snapshot_with_stock_check(&lines).await?;
        let totals = pricing::compute_totals(&order_lines, &self.pricing)?;

        let handle = self.payments.create_authorization(totals.total).await?;
        self.attempts
            .insert(
                handle.as_str().to_owned(),
                CheckoutAttempt { identity, shipping },
            )
            .await;

        tracing::debug!(%identity, %handle, total = %totals.total, "checkout attempt started");
        Ok(CheckoutStarted { handle, totals })
    }

    /// Commit step: on provider-reported success for `handle`, snapshot the
    /// cart into an order (status `pending`), then clear the cart.
    ///
    /// Idempotent per handle: a retried commit returns the already-created
    /// order instead of creating a second one.
    ///
    /// # Errors
    ///
    /// - [`CommerceError::AttemptExpired`] if the attempt is unknown;
    ///   restart the shipping step
    /// - [`CommerceError::PaymentNotConfirmed`] until the provider reports
    ///   success
    /// - [`CommerceError::Reconciliation`] if order creation failed after a
    ///   confirmed capture; reported through the alert sink
    pub async fn commit(
        &self,
        identity: CartIdentity,
        handle: AuthorizationHandle,
    ) -> Result<Order, CommerceError> {
        // Dedup before anything else: a retried call returns the same order.
        if let Some(existing) = self.orders.find_by_handle(&handle).await? {
            return Ok(existing);
        }

        let Some(attempt) = self.attempts.get(handle.as_str()).await else {
            // A concurrent commit may have consumed the attempt just now;
            // its order is the answer.
            if let Some(existing) = self.orders.find_by_handle(&handle).await? {
                return Ok(existing);
            }
            return Err(CommerceError::AttemptExpired(handle));
        };
        if attempt.identity != identity {
            return Err(CommerceError::Forbidden);
        }

        match self.payments.status(&handle).await? {
            PaymentStatus::Succeeded => {}
            PaymentStatus::Pending | PaymentStatus::Failed => {
                return Err(CommerceError::PaymentNotConfirmed(handle));
            }
        }

        // From here on the identity lock excludes cart mutations and other
        // commits for this cart.
        let _guard = self.locks.acquire(&identity.storage_key()).await;

        // Re-check under the lock: a concurrent commit for the same handle
        // may have created the order (and cleared the cart) while this call
        // was waiting.
        if let Some(existing) = self.orders.find_by_handle(&handle).await? {
            return Ok(existing);
        }

        let lines = self.carts.lines(&identity).await?;
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = self.catalog.product(line.product_id).await?;
            order_lines.push(OrderLine {
                product_id: line.product_id,
                title: product.title,
                unit_price: product.price,
                quantity: line.quantity,
            });
        }
        let totals = pricing::compute_totals(&order_lines, &self.pricing)?;

        let order = match self
            .orders
            .insert(NewOrder {
                placed_by: identity,
                lines: order_lines,
                shipping: attempt.shipping,
                totals,
                payment_handle: handle.clone(),
            })
            .await
        {
            Ok(order) => order,
            Err(StoreError::Conflict(_)) => {
                // A concurrent commit for the same handle won the insert.
                return Ok(self
                    .orders
                    .find_by_handle(&handle)
                    .await?
                    .ok_or_else(|| CommerceError::Reconciliation(handle.clone()))?);
            }
            Err(e) => {
                // Money moved, no order: page operations, tell the user
                // something generic.
                self.alerts
                    .reconciliation_failure(&handle, &identity, &e)
                    .await;
                return Err(CommerceError::Reconciliation(handle));
            }
        };

        // Order exists; a failed clear only leaves a stale cart, and a
        // re-commit is deduped by the handle mapping above.
        if let Err(e) = self.carts.clear(&identity).await {
            tracing::warn!(order_id = %order.id, error = %e, "cart clear failed after order creation");
        }
        self.attempts.invalidate(handle.as_str()).await;

        if let Err(e) = self.notifications.order_created(&order).await {
            tracing::warn!(order_id = %order.id, error = %e, "order creation notification failed");
        }

        tracing::info!(order_id = %order.id, %handle, "checkout committed");
        Ok(order)
    }

    async fn snapshot_with_stock_check(
        &self,
        lines: &[crate::model::CartLine],
    ) -> Result<Vec<OrderLine>, CommerceError> {
        let mut order_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.catalog.product(line.product_id).await?;
            if line.quantity > product.stock {
                return Err(CommerceError::InsufficientStock {
                    available: product.stock,
                });
            }
            order_lines.push(OrderLine {
                product_id: line.product_id,
                title: product.title,
                unit_price: product.price,
                quantity: line.quantity,
            });
        }
        Ok(order_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProduct, InMemoryCatalog};
    use crate::notify::{TracingAlertSink, TracingNotifier};
    use crate::payment::FakePaymentProvider;
    use crate::store::memory::{MemoryCartStore, MemoryOrderStore};
    use chrono::Utc;
    use clementine_core::{CurrencyCode, GuestToken, OrderStatus, Price, ProductId, UserId};
    use rust_decimal::dec;

    struct Fixture {
        carts: Arc<MemoryCartStore>,
        orders: Arc<MemoryOrderStore>,
        catalog: Arc<InMemoryCatalog>,
        payments: Arc<FakePaymentProvider>,
        orchestrator: CheckoutOrchestrator,
    }

    fn fixture() -> Fixture {
        let carts = Arc::new(MemoryCartStore::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.put(CatalogProduct {
            id: ProductId::new(1),
            title: "Widget".to_owned(),
            price: Price::new(dec!(10.00), CurrencyCode::USD),
            stock: 5,
        });
        let payments = Arc::new(FakePaymentProvider::new());
        let orchestrator = CheckoutOrchestrator::new(
            Arc::clone(&carts) as Arc<dyn CartStore>,
            Arc::clone(&orders) as Arc<dyn OrderStore>,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::clone(&payments) as Arc<dyn PaymentProvider>,
            Arc::new(TracingNotifier),
            Arc::new(TracingAlertSink),
            KeyedLocks::new(),
            PricingConfig::default(),
            Duration::from_secs(900),
        );
        Fixture {
            carts,
            orders,
            catalog,
            payments,
            orchestrator,
        }
    }

    async fn seed_cart(carts: &MemoryCartStore, identity: &CartIdentity, quantity: u32) {
        carts
            .upsert_line(
                identity,
                crate::model::CartLine {
                    product_id: ProductId::new(1),
                    quantity,
                    unit_price: None,
                    added_at: Utc::now(),
                },
            )
            .await
            .expect("seed");
    }

    #[tokio::test]
    async fn test_begin_rejects_invalid_shipping() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let err = f
            .orchestrator
            .begin(identity, "A", "5550102030", "12 Analytical Way")
            .await
            .expect_err("short name");
        assert_eq!(err.code(), "INVALID_SHIPPING");
    }

    #[tokio::test]
    async fn test_begin_rejects_empty_cart() {
        let f = fixture();
        let err = f
            .orchestrator
            .begin(
                CartIdentity::Guest(GuestToken::generate()),
                "Ada Lovelace",
                "5550102030",
                "12 Analytical Way",
            )
            .await
            .expect_err("empty cart");
        assert!(matches!(err, CommerceError::EmptyCart));
    }

    #[tokio::test]
    async fn test_begin_revalidates_stock() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 4).await;
        f.catalog.set_stock(ProductId::new(1), 2);

        let err = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect_err("stock dropped");
        assert!(matches!(err, CommerceError::InsufficientStock { available: 2 }));
    }

    #[tokio::test]
    async fn test_commit_requires_provider_success() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let started = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect("begin");

        let err = f
            .orchestrator
            .commit(identity, started.handle.clone())
            .await
            .expect_err("payment still pending");
        assert!(matches!(err, CommerceError::PaymentNotConfirmed(_)));
        assert_eq!(f.carts.lines(&identity).await.expect("lines").len(), 1);
    }

    #[tokio::test]
    async fn test_commit_creates_pending_order_and_clears_cart() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let started = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect("begin");
        f.payments.report(&started.handle, PaymentStatus::Succeeded);

        let order = f
            .orchestrator
            .commit(identity, started.handle.clone())
            .await
            .expect("commit");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.totals.subtotal.amount, dec!(20.00));
        assert_eq!(order.payment_handle, started.handle);
        assert!(f.carts.lines(&identity).await.expect("lines").is_empty());
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_per_handle() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let started = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect("begin");
        f.payments.report(&started.handle, PaymentStatus::Succeeded);

        let first = f
            .orchestrator
            .commit(identity, started.handle.clone())
            .await
            .expect("first commit");
        let second = f
            .orchestrator
            .commit(identity, started.handle.clone())
            .await
            .expect("retried commit");

        assert_eq!(first.id, second.id, "same order, not a duplicate");
        let all = f
            .orders
            .list(&crate::store::OrderFilter::default())
            .await
            .expect("list");
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_cart_intact() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let started = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect("begin");
        f.payments.report(&started.handle, PaymentStatus::Succeeded);
        f.orders.set_fail_inserts(true);

        let err = f
            .orchestrator
            .commit(identity, started.handle.clone())
            .await
            .expect_err("order creation failed");
        assert!(matches!(err, CommerceError::Reconciliation(_)));
        assert_eq!(
            f.carts.lines(&identity).await.expect("lines").len(),
            1,
            "cart untouched when no order was created"
        );

        // Remediation done; the retried commit now succeeds.
        f.orders.set_fail_inserts(false);
        let order = f
            .orchestrator
            .commit(identity, started.handle)
            .await
            .expect("retry after remediation");
        assert!(f.carts.lines(&identity).await.expect("lines").is_empty());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_commit_for_wrong_identity_is_forbidden() {
        let f = fixture();
        let identity = CartIdentity::User(UserId::new(1));
        seed_cart(&f.carts, &identity, 2).await;

        let started = f
            .orchestrator
            .begin(identity, "Ada Lovelace", "5550102030", "12 Analytical Way")
            .await
            .expect("begin");
        f.payments.report(&started.handle, PaymentStatus::Succeeded);

        let err = f
            .orchestrator
            .commit(CartIdentity::User(UserId::new(2)), started.handle)
            .await
            .expect_err("different identity");
        assert!(matches!(err, CommerceError::Forbidden));
    }
}
