//! Catalog collaborator: stock, price, and title lookups.
//!
//! The catalog service is external; this side only consumes
//! `stock(product)` and `price(product)`. [`HttpCatalog`] talks to the real
//! service, [`CachedCatalog`] puts a short-TTL moka cache in front of it, and
//! [`InMemoryCatalog`] backs tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use clementine_core::{CurrencyCode, Price, ProductId};

/// A product as the catalog reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub stock: u32,
}

/// Catalog collaborator failure.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned status {0}")]
    Status(u16),

    #[error("catalog response invalid: {0}")]
    Decode(String),
}

/// Read access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Full product record: title, current price, current stock.
    async fn product(&self, id: ProductId) -> Result<CatalogProduct, CatalogError>;

    /// Current stock level.
    async fn stock(&self, id: ProductId) -> Result<u32, CatalogError> {
        Ok(self.product(id).await?.stock)
    }

    /// Current unit price.
    async fn price(&self, id: ProductId) -> Result<Price, CatalogError> {
        Ok(self.product(id).await?.price)
    }
}

// =============================================================================
// HTTP client
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProductResponse {
    id: i32,
    title: String,
    price: Decimal,
    currency: String,
    stock: u32,
}

/// JSON client for the catalog service.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCatalog {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn product(&self, id: ProductId) -> Result<CatalogProduct, CatalogError> {
        let url = self
            .base_url
            .join(&format!("products/{id}"))
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let body: ProductResponse = response.json().await?;
        let currency = body
            .currency
            .parse::<CurrencyCode>()
            .map_err(CatalogError::Decode)?;

        Ok(CatalogProduct {
            id: ProductId::new(body.id),
            title: body.title,
            price: Price::new(body.price, currency),
            stock: body.stock,
        })
    }
}

// =============================================================================
// Caching decorator
// =============================================================================

/// Short-TTL cache over another catalog, so quantity checks and cart
/// summaries don't hammer the catalog service. Errors are never cached.
pub struct CachedCatalog {
    inner: Arc<dyn Catalog>,
    cache: moka::future::Cache<ProductId, CatalogProduct>,
}

impl CachedCatalog {
    #[must_use]
    pub fn new(inner: Arc<dyn Catalog>, ttl: Duration, capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }
}

#[async_trait]
impl Catalog for CachedCatalog {
    async fn product(&self, id: ProductId) -> Result<CatalogProduct, CatalogError> {
        if let Some(hit) = self.cache.get(&id).await {
            return Ok(hit);
        }
        let product = self.inner.product(id).await?;
        self.cache.insert(id, product.clone()).await;
        Ok(product)
    }
}

// =============================================================================
// In-memory catalog (tests, local dev)
// =============================================================================

/// Mutable in-memory catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: std::sync::RwLock<HashMap<i32, CatalogProduct>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product.
    pub fn put(&self, product: CatalogProduct) {
        let mut products = self
            .products
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        products.insert(product.id.as_i32(), product);
    }

    /// Adjust the stock level of an existing product.
    pub fn set_stock(&self, id: ProductId, stock: u32) {
        let mut products = self
            .products
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(product) = products.get_mut(&id.as_i32()) {
            product.stock = stock;
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<CatalogProduct, CatalogError> {
        let products = self
            .products
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        products
            .get(&id.as_i32())
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn widget(id: i32, stock: u32) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            title: format!("Widget {id}"),
            price: Price::new(dec!(9.99), CurrencyCode::USD),
            stock,
        }
    }

    #[tokio::test]
    async fn test_in_memory_catalog_lookup() {
        let catalog = InMemoryCatalog::new();
        catalog.put(widget(1, 5));

        assert_eq!(catalog.stock(ProductId::new(1)).await.expect("stock"), 5);
        assert!(matches!(
            catalog.product(ProductId::new(2)).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_catalog_serves_from_cache() {
        let inner = Arc::new(InMemoryCatalog::new());
        inner.put(widget(1, 5));
        let cached = CachedCatalog::new(
            Arc::clone(&inner) as Arc<dyn Catalog>,
            Duration::from_secs(60),
            100,
        );

        assert_eq!(cached.stock(ProductId::new(1)).await.expect("stock"), 5);
        // A stock change behind the cache is invisible until the TTL expires.
        inner.set_stock(ProductId::new(1), 0);
        assert_eq!(cached.stock(ProductId::new(1)).await.expect("stock"), 5);
    }
}
