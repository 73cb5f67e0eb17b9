//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use clementine_commerce::OrderService;
use clementine_commerce::notify::{NotificationSink, TracingNotifier};
use clementine_commerce::store::OrderStore;
use clementine_commerce::store::postgres::PgOrderStore;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The admin binary only needs order access;
/// carts belong to the storefront.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    orders: OrderService,
}

impl AppState {
    /// Wire the order service against the `PostgreSQL` store.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let order_store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
        let notifications: Arc<dyn NotificationSink> = Arc::new(TracingNotifier);
        let orders = OrderService::new(order_store, notifications);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                orders,
            }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
