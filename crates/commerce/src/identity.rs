//! Cart identity resolution and the guest -> user merge.
//!
//! Each request resolves its optional guest token and optional authenticated
//! user id to a single [`CartIdentity`] once, at the boundary. When both are
//! present (just logged in, still carrying the guest cookie) the guest cart
//! is merged into the user cart. The merge is idempotent by construction: a
//! processed line leaves the guest cart in the same atomic step that lands it
//! in the user cart, so re-running it is a no-op and it needs no
//! "already merged" flag anywhere.

use std::sync::Arc;

use clementine_core::{CartIdentity, GuestToken, UserId};

use crate::error::CommerceError;
use crate::locks::KeyedLocks;
use crate::model::CartLine;
use crate::policy;
use crate::store::CartStore;

/// Outcome of resolving a request to a cart identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The identity all cart operations for this request run against.
    pub identity: CartIdentity,
    /// Set when a guest cart was fully merged this request; the caller must
    /// drop the token from the session (revocation).
    pub merged: Option<GuestToken>,
}

/// Maps a request (guest token + optional authenticated user) to a cart
/// identity, merging the guest cart on login.
pub struct CartIdentityResolver {
    store: Arc<dyn CartStore>,
    locks: KeyedLocks,
    max_per_product: u32,
}

impl CartIdentityResolver {
    /// `locks` must be the registry shared with the cart service so a merge
    /// excludes ordinary mutations against both identities.
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, locks: KeyedLocks, max_per_product: u32) -> Self {
        Self {
            store,
            locks,
            max_per_product,
        }
    }

    /// Resolve a request to a cart identity.
    ///
    /// Returns `None` when the request carries neither a guest token nor an
    /// authenticated user: no cart exists yet, and none is created until the
    /// first mutation.
    ///
    /// A merge failure is not surfaced: the request proceeds under the user
    /// identity with the guest cart untouched, and the merge retries on the
    /// next qualifying request.
    ///
    /// # Errors
    ///
    /// Never fails today; the `Result` leaves room for resolution itself to
    /// consult the store.
    pub async fn resolve(
        &self,
        guest_token: Option<GuestToken>,
        user_id: Option<UserId>,
    ) -> Result<Option<Resolution>, CommerceError> {
        match (guest_token, user_id) {
            (None, None) => Ok(None),
            (Some(token), None) => Ok(Some(Resolution {
                identity: CartIdentity::Guest(token),
                merged: None,
            })),
            (None, Some(id)) => Ok(Some(Resolution {
                identity: CartIdentity::User(id),
                merged: None,
            })),
            (Some(token), Some(id)) => {
                let merged = match self.merge_guest_cart(token, id).await {
                    Ok(()) => Some(token),
                    Err(e) => {
                        tracing::warn!(
                            guest = %token,
                            user = %id,
                            error = %e,
                            "guest cart merge failed; retrying on next request"
                        );
                        None
                    }
                };
                Ok(Some(Resolution {
                    identity: CartIdentity::User(id),
                    merged,
                }))
            }
        }
    }

    /// Merge every guest line into the user cart, then drop the guest cart.
    ///
    /// Quantities are summed through the quantity policy; when the sum
    /// exceeds the per-product ceiling the line is clamped to the ceiling
    /// rather than dropped or aborted. Stock is not consulted here: it is
    /// re-validated at checkout.
    async fn merge_guest_cart(
        &self,
        token: GuestToken,
        user_id: UserId,
    ) -> Result<(), CommerceError> {
        let guest = CartIdentity::Guest(token);
        let user = CartIdentity::User(user_id);

        // Guest before user; see KeyedLocks::acquire for why this order is safe.
        let _guest_guard = self.locks.acquire(&guest.storage_key()).await;
        let _user_guard = self.locks.acquire(&user.storage_key()).await;

        let guest_lines = self.store.lines(&guest).await?;
        for line in guest_lines {
            let existing = self.store.find_line(&user, line.product_id).await?;
            let current = existing.as_ref().map_or(0, |l| l.quantity);

            let quantity = match policy::validate(
                current,
                i64::from(line.quantity),
                u32::MAX,
                self.max_per_product,
            ) {
                Ok(quantity) => quantity,
                Err(CommerceError::QuantityCeiling { limit }) => limit.max(current),
                Err(e) => return Err(e),
            };

            let merged = CartLine {
                product_id: line.product_id,
                quantity,
                unit_price: existing
                    .as_ref()
                    .and_then(|l| l.unit_price)
                    .or(line.unit_price),
                added_at: existing.map_or(line.added_at, |l| l.added_at),
            };
            // Atomic per line: once this returns, the line is gone from the
            // guest cart, so a retry after a crash never double-counts it.
            self.store.move_line(&guest, &user, merged).await?;
        }

        self.store.clear(&guest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCartStore;
    use chrono::Utc;
    use clementine_core::ProductId;

    fn line(product: i32, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            quantity,
            unit_price: None,
            added_at: Utc::now(),
        }
    }

    async fn seed(store: &MemoryCartStore, identity: &CartIdentity, lines: &[(i32, u32)]) {
        for (product, quantity) in lines {
            store
                .upsert_line(identity, line(*product, *quantity))
                .await
                .expect("seed");
        }
    }

    #[tokio::test]
    async fn test_guest_only_resolves_to_guest() {
        let store = Arc::new(MemoryCartStore::new());
        let resolver = CartIdentityResolver::new(store, KeyedLocks::new(), 10);
        let token = GuestToken::generate();

        let resolution = resolver
            .resolve(Some(token), None)
            .await
            .expect("resolve")
            .expect("identity");
        assert_eq!(resolution.identity, CartIdentity::Guest(token));
        assert_eq!(resolution.merged, None);
    }

    #[tokio::test]
    async fn test_anonymous_without_token_has_no_identity() {
        let store = Arc::new(MemoryCartStore::new());
        let resolver = CartIdentityResolver::new(store, KeyedLocks::new(), 10);
        assert!(resolver.resolve(None, None).await.expect("resolve").is_none());
    }

    #[tokio::test]
    async fn test_merge_combines_and_creates_lines() {
        let store = Arc::new(MemoryCartStore::new());
        let token = GuestToken::generate();
        let guest = CartIdentity::Guest(token);
        let user = CartIdentity::User(UserId::new(1));
        seed(&store, &guest, &[(1, 2), (2, 3)]).await;
        seed(&store, &user, &[(1, 1)]).await;

        let resolver = CartIdentityResolver::new(Arc::clone(&store) as Arc<dyn CartStore>, KeyedLocks::new(), 10);
        let resolution = resolver
            .resolve(Some(token), Some(UserId::new(1)))
            .await
            .expect("resolve")
            .expect("identity");

        assert_eq!(resolution.identity, user);
        assert_eq!(resolution.merged, Some(token));

        let mut quantities: Vec<(i32, u32)> = store
            .lines(&user)
            .await
            .expect("lines")
            .iter()
            .map(|l| (l.product_id.as_i32(), l.quantity))
            .collect();
        quantities.sort_unstable();
        assert_eq!(quantities, vec![(1, 3), (2, 3)]);
        assert!(store.lines(&guest).await.expect("lines").is_empty());
    }

    #[tokio::test]
    async fn test_merge_clamps_to_ceiling() {
        let store = Arc::new(MemoryCartStore::new());
        let token = GuestToken::generate();
        let guest = CartIdentity::Guest(token);
        let user = CartIdentity::User(UserId::new(1));
        seed(&store, &guest, &[(1, 8)]).await;
        seed(&store, &user, &[(1, 5)]).await;

        let resolver = CartIdentityResolver::new(Arc::clone(&store) as Arc<dyn CartStore>, KeyedLocks::new(), 10);
        resolver
            .resolve(Some(token), Some(UserId::new(1)))
            .await
            .expect("resolve");

        let lines = store.lines(&user).await.expect("lines");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().map(|l| l.quantity), Some(10), "clamped, not 13");
    }

    #[tokio::test]
    async fn test_merge_twice_is_noop() {
        let store = Arc::new(MemoryCartStore::new());
        let token = GuestToken::generate();
        let guest = CartIdentity::Guest(token);
        let user = CartIdentity::User(UserId::new(1));
        seed(&store, &guest, &[(1, 3)]).await;

        let resolver = CartIdentityResolver::new(Arc::clone(&store) as Arc<dyn CartStore>, KeyedLocks::new(), 10);
        resolver
            .resolve(Some(token), Some(UserId::new(1)))
            .await
            .expect("first merge");
        resolver
            .resolve(Some(token), Some(UserId::new(1)))
            .await
            .expect("second merge");

        let lines = store.lines(&user).await.expect("lines");
        assert_eq!(lines.first().map(|l| l.quantity), Some(3), "not doubled");
    }

    #[tokio::test]
    async fn test_merge_failure_leaves_guest_cart_and_degrades() {
        let store = Arc::new(MemoryCartStore::new());
        let token = GuestToken::generate();
        let guest = CartIdentity::Guest(token);
        seed(&store, &guest, &[(1, 3)]).await;
        store.set_fail_writes(true);

        let resolver = CartIdentityResolver::new(Arc::clone(&store) as Arc<dyn CartStore>, KeyedLocks::new(), 10);
        let resolution = resolver
            .resolve(Some(token), Some(UserId::new(1)))
            .await
            .expect("resolve degrades instead of failing")
            .expect("identity");

        assert_eq!(resolution.identity, CartIdentity::User(UserId::new(1)));
        assert_eq!(resolution.merged, None, "token kept for retry");

        store.set_fail_writes(false);
        assert_eq!(store.lines(&guest).await.expect("lines").len(), 1);
    }
}
