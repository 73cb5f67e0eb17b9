//! Cart service: every cart mutation entry point.
//!
//! "Add to cart", "set quantity", and "remove" all funnel through here, so
//! they observe identical policy limits. Each mutation holds the identity's
//! lock around its read-compute-write so two concurrent requests for the
//! same cart can never both pass the policy on stale state.

use std::sync::Arc;

use chrono::Utc;

use clementine_core::{CartIdentity, ProductId};

use crate::catalog::Catalog;
use crate::error::CommerceError;
use crate::locks::KeyedLocks;
use crate::model::{CartLine, OrderLine};
use crate::policy;
use crate::store::CartStore;

/// Cart read/mutate operations, keyed by resolved identity.
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
    locks: KeyedLocks,
    max_per_product: u32,
}

impl CartService {
    /// `locks` must be the same registry the checkout orchestrator uses, so
    /// a commit excludes cart mutations for the identity it is clearing.
    #[must_use]
    pub fn new(
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn Catalog>,
        locks: KeyedLocks,
        max_per_product: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            locks,
            max_per_product,
        }
    }

    /// All lines for an identity, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn lines(&self, identity: &CartIdentity) -> Result<Vec<CartLine>, CommerceError> {
        Ok(self.store.lines(identity).await?)
    }

    /// Total item count (sum of quantities), for the cart badge.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn item_count(&self, identity: &CartIdentity) -> Result<u32, CommerceError> {
        let lines = self.store.lines(identity).await?;
        Ok(lines.iter().map(|l| l.quantity).sum())
    }

    /// Cart lines priced from the live catalog, for summaries and checkout.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Catalog`] if a product lookup fails.
    pub async fn priced_lines(
        &self,
        identity: &CartIdentity,
    ) -> Result<Vec<OrderLine>, CommerceError> {
        let lines = self.store.lines(identity).await?;
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.catalog.product(line.product_id).await?;
            priced.push(OrderLine {
                product_id: line.product_id,
                title: product.title,
                unit_price: product.price,
                quantity: line.quantity,
            });
        }
        Ok(priced)
    }

    /// Add `quantity` units of a product to the cart.
    ///
    /// # Errors
    ///
    /// Rejects with the specific policy reason (`QUANTITY_CEILING`,
    /// `INSUFFICIENT_STOCK`, `INVALID_QUANTITY`) without mutating, or
    /// [`CommerceError::UnknownProduct`] if the catalog has no such product.
    pub async fn add_item(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, CommerceError> {
        self.mutate_quantity(identity, product_id, |_| i64::from(quantity))
            .await
    }

    /// Set a product's quantity to an absolute value.
    ///
    /// Quantity 0 is rejected as `INVALID_QUANTITY`; removal goes through
    /// [`CartService::remove_item`].
    ///
    /// # Errors
    ///
    /// Same rejection set as [`CartService::add_item`].
    pub async fn set_quantity(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, CommerceError> {
        self.mutate_quantity(identity, product_id, |current| {
            i64::from(quantity) - i64::from(current)
        })
        .await
    }

    /// Remove a product's line. Removing an absent line is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn remove_item(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
    ) -> Result<(), CommerceError> {
        let _guard = self.locks.acquire(&identity.storage_key()).await;
        Ok(self.store.remove_line(identity, product_id).await?)
    }

    /// Delete every line for an identity.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Store`] if the store is unavailable.
    pub async fn clear(&self, identity: &CartIdentity) -> Result<(), CommerceError> {
        let _guard = self.locks.acquire(&identity.storage_key()).await;
        Ok(self.store.clear(identity).await?)
    }

    /// Shared read-compute-write path for add and set. `delta_for` maps the
    /// current quantity to the requested change.
    async fn mutate_quantity(
        &self,
        identity: &CartIdentity,
        product_id: ProductId,
        delta_for: impl FnOnce(u32) -> i64 + Send,
    ) -> Result<CartLine, CommerceError> {
        let _guard = self.locks.acquire(&identity.storage_key()).await;

        let existing = self.store.find_line(identity, product_id).await?;
        let current = existing.as_ref().map_or(0, |l| l.quantity);

        let product = self.catalog.product(product_id).await.map_err(|e| {
            if matches!(e, crate::catalog::CatalogError::NotFound(_)) {
                CommerceError::UnknownProduct(product_id)
            } else {
                CommerceError::Catalog(e)
            }
        })?;

        let new_quantity = policy::validate(
            current,
            delta_for(current),
            product.stock,
            self.max_per_product,
        )?;

        let line = CartLine {
            product_id,
            quantity: new_quantity,
            unit_price: existing
                .as_ref()
                .and_then(|l| l.unit_price)
                .or(Some(product.price)),
            added_at: existing.map_or_else(Utc::now, |l| l.added_at),
        };
        self.store.upsert_line(identity, line.clone()).await?;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProduct, InMemoryCatalog};
    use crate::store::memory::MemoryCartStore;
    use clementine_core::{CurrencyCode, GuestToken, Price};
    use rust_decimal::dec;

    fn service(stock: u32, max: u32) -> (CartService, CartIdentity) {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.put(CatalogProduct {
            id: ProductId::new(1),
            title: "Widget".to_owned(),
            price: Price::new(dec!(9.99), CurrencyCode::USD),
            stock,
        });
        let service = CartService::new(
            Arc::new(MemoryCartStore::new()),
            catalog,
            KeyedLocks::new(),
            max,
        );
        (service, CartIdentity::Guest(GuestToken::generate()))
    }

    #[tokio::test]
    async fn test_add_accumulates_quantity() {
        let (service, identity) = service(10, 10);
        service
            .add_item(&identity, ProductId::new(1), 2)
            .await
            .expect("first add");
        let line = service
            .add_item(&identity, ProductId::new(1), 3)
            .await
            .expect("second add");
        assert_eq!(line.quantity, 5);
        assert_eq!(service.item_count(&identity).await.expect("count"), 5);
    }

    #[tokio::test]
    async fn test_add_rejects_over_ceiling_without_mutation() {
        let (service, identity) = service(100, 10);
        service
            .add_item(&identity, ProductId::new(1), 8)
            .await
            .expect("within ceiling");
        let err = service
            .add_item(&identity, ProductId::new(1), 3)
            .await
            .expect_err("8 + 3 > 10");
        assert!(matches!(err, CommerceError::QuantityCeiling { limit: 10 }));
        assert_eq!(service.item_count(&identity).await.expect("count"), 8);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_is_rejected() {
        let (service, identity) = service(10, 10);
        service
            .add_item(&identity, ProductId::new(1), 2)
            .await
            .expect("add");
        let err = service
            .set_quantity(&identity, ProductId::new(1), 0)
            .await
            .expect_err("zero is removal's job");
        assert!(matches!(err, CommerceError::InvalidQuantity));
        assert_eq!(service.item_count(&identity).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_set_quantity_down_and_up() {
        let (service, identity) = service(10, 10);
        service
            .add_item(&identity, ProductId::new(1), 5)
            .await
            .expect("add");
        let line = service
            .set_quantity(&identity, ProductId::new(1), 2)
            .await
            .expect("decrease");
        assert_eq!(line.quantity, 2);
        let line = service
            .set_quantity(&identity, ProductId::new(1), 9)
            .await
            .expect("increase");
        assert_eq!(line.quantity, 9);
    }

    #[tokio::test]
    async fn test_unknown_product_is_typed() {
        let (service, identity) = service(10, 10);
        let err = service
            .add_item(&identity, ProductId::new(999), 1)
            .await
            .expect_err("no such product");
        assert!(matches!(err, CommerceError::UnknownProduct(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (service, identity) = service(10, 10);
        service
            .remove_item(&identity, ProductId::new(1))
            .await
            .expect("absent remove succeeds");
        service
            .add_item(&identity, ProductId::new(1), 2)
            .await
            .expect("add");
        service
            .remove_item(&identity, ProductId::new(1))
            .await
            .expect("remove");
        assert!(service.lines(&identity).await.expect("lines").is_empty());
    }

    #[tokio::test]
    async fn test_unit_price_snapshot_taken_on_first_add() {
        let (service, identity) = service(10, 10);
        let line = service
            .add_item(&identity, ProductId::new(1), 1)
            .await
            .expect("add");
        assert_eq!(
            line.unit_price.map(|p| p.amount),
            Some(dec!(9.99)),
            "snapshot from catalog"
        );
    }
}
