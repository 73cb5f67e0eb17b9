//! Integration tests for Clementine.
//!
//! The commerce services are exercised end-to-end against the in-memory
//! store backends and collaborator fakes, so these tests need no database
//! or external services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p clementine-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_policy` - Quantity ceiling and stock limits across entry points
//! - `cart_merge` - Guest -> user merge semantics
//! - `checkout` - Payment-handle idempotency and order/cart atomicity
//! - `order_transitions` - The full status transition grid
//! - `concurrency` - Interleaved mutations, merges, and transitions
//! - `end_to_end` - The whole purchase lifecycle in one scenario

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use clementine_commerce::catalog::{Catalog, CatalogProduct, InMemoryCatalog};
use clementine_commerce::locks::KeyedLocks;
use clementine_commerce::notify::{AlertSink, TracingNotifier};
use clementine_commerce::payment::{FakePaymentProvider, PaymentProvider};
use clementine_commerce::store::memory::{MemoryCartStore, MemoryOrderStore};
use clementine_commerce::store::{CartStore, OrderStore, StoreError};
use clementine_commerce::{
    CartIdentityResolver, CartService, CheckoutOrchestrator, OrderService, PricingConfig,
};
use clementine_core::{AuthorizationHandle, CartIdentity, CurrencyCode, Price, ProductId};

/// Alert sink that counts reconciliation failures for assertions.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    reconciliation_failures: AtomicUsize,
}

impl RecordingAlertSink {
    #[must_use]
    pub fn reconciliation_failures(&self) -> usize {
        self.reconciliation_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn reconciliation_failure(
        &self,
        _handle: &AuthorizationHandle,
        _identity: &CartIdentity,
        _error: &StoreError,
    ) {
        self.reconciliation_failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fully wired commerce stack over in-memory backends.
pub struct TestContext {
    pub cart_store: Arc<MemoryCartStore>,
    pub order_store: Arc<MemoryOrderStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub payments: Arc<FakePaymentProvider>,
    pub alerts: Arc<RecordingAlertSink>,
    pub carts: Arc<CartService>,
    pub resolver: Arc<CartIdentityResolver>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub orders: Arc<OrderService>,
}

impl TestContext {
    /// Stack with the default ceiling of 10 per product.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_per_product(10)
    }

    /// Stack with a custom per-product ceiling.
    #[must_use]
    pub fn with_max_per_product(max_per_product: u32) -> Self {
        let cart_store = Arc::new(MemoryCartStore::new());
        let order_store = Arc::new(MemoryOrderStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let payments = Arc::new(FakePaymentProvider::new());
        let alerts = Arc::new(RecordingAlertSink::default());
        let notifications = Arc::new(TracingNotifier);
        let locks = KeyedLocks::new();

        let carts = Arc::new(CartService::new(
            Arc::clone(&cart_store) as Arc<dyn CartStore>,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            locks.clone(),
            max_per_product,
        ));
        let resolver = Arc::new(CartIdentityResolver::new(
            Arc::clone(&cart_store) as Arc<dyn CartStore>,
            locks.clone(),
            max_per_product,
        ));
        let checkout = Arc::new(CheckoutOrchestrator::new(
            Arc::clone(&cart_store) as Arc<dyn CartStore>,
            Arc::clone(&order_store) as Arc<dyn OrderStore>,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::clone(&payments) as Arc<dyn PaymentProvider>,
            notifications.clone(),
            Arc::clone(&alerts) as Arc<dyn AlertSink>,
            locks,
            PricingConfig::default(),
            Duration::from_secs(900),
        ));
        let orders = Arc::new(OrderService::new(
            Arc::clone(&order_store) as Arc<dyn OrderStore>,
            notifications,
        ));

        Self {
            cart_store,
            order_store,
            catalog,
            payments,
            alerts,
            carts,
            resolver,
            checkout,
            orders,
        }
    }

    /// Seed a catalog product priced in whole dollars.
    pub fn add_product(&self, id: i32, title: &str, dollars: i64, stock: u32) {
        self.catalog.put(CatalogProduct {
            id: ProductId::new(id),
            title: title.to_owned(),
            price: Price::new(Decimal::new(dollars * 100, 2), CurrencyCode::USD),
            stock,
        });
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
