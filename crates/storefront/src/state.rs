//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use clementine_commerce::catalog::{CachedCatalog, Catalog, HttpCatalog};
use clementine_commerce::locks::KeyedLocks;
use clementine_commerce::notify::{AlertSink, NotificationSink, TracingNotifier};
use clementine_commerce::payment::{HttpPaymentProvider, PaymentProvider};
use clementine_commerce::store::postgres::{PgCartStore, PgOrderStore};
use clementine_commerce::store::{CartStore, OrderStore};
use clementine_commerce::{
    CartIdentityResolver, CartService, CheckoutOrchestrator, OrderService, PricingConfig,
};

use crate::config::StorefrontConfig;
use crate::services::alert::SentryAlertSink;

/// How many catalog entries the lookup cache may hold.
const CATALOG_CACHE_CAPACITY: u64 = 10_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the commerce services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    carts: CartService,
    resolver: CartIdentityResolver,
    checkout: CheckoutOrchestrator,
    orders: OrderService,
}

impl AppState {
    /// Wire the commerce services against `PostgreSQL` stores and the real
    /// catalog/payment collaborators.
    ///
    /// The single [`KeyedLocks`] registry is shared by the cart service, the
    /// identity resolver, and the checkout orchestrator: that sharing is
    /// what serializes merges, mutations, and commits per cart identity.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let locks = KeyedLocks::new();
        let http = reqwest::Client::new();

        let catalog: Arc<dyn Catalog> = Arc::new(CachedCatalog::new(
            Arc::new(HttpCatalog::new(
                http.clone(),
                config.catalog.base_url.clone(),
            )),
            config.catalog.cache_ttl,
            CATALOG_CACHE_CAPACITY,
        ));
        let payments: Arc<dyn PaymentProvider> = Arc::new(HttpPaymentProvider::new(
            http,
            config.payment.base_url.clone(),
            config.payment.api_key.clone(),
        ));
        let cart_store: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
        let order_store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
        let notifications: Arc<dyn NotificationSink> = Arc::new(TracingNotifier);
        let alerts: Arc<dyn AlertSink> = Arc::new(SentryAlertSink);

        let carts = CartService::new(
            Arc::clone(&cart_store),
            Arc::clone(&catalog),
            locks.clone(),
            config.commerce.max_per_product,
        );
        let resolver = CartIdentityResolver::new(
            Arc::clone(&cart_store),
            locks.clone(),
            config.commerce.max_per_product,
        );
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&cart_store),
            Arc::clone(&order_store),
            Arc::clone(&catalog),
            payments,
            Arc::clone(&notifications),
            alerts,
            locks,
            config.commerce.pricing.clone(),
            config.commerce.checkout_attempt_ttl,
        );
        let orders = OrderService::new(order_store, notifications);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                carts,
                resolver,
                checkout,
                orders,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    /// Get a reference to the cart identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &CartIdentityResolver {
        &self.inner.resolver
    }

    /// Get a reference to the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// The shared pricing rule inputs.
    #[must_use]
    pub fn pricing(&self) -> &PricingConfig {
        &self.inner.config.commerce.pricing
    }
}
