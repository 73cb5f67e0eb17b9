//! Per-key async mutual exclusion.
//!
//! Cart mutations and the login merge serialize per cart identity so that
//! read-compute-write sequences never interleave for the same cart. This is
//! the entirety of the locking model: no global lock, and order transitions
//! use store-level compare-and-swap instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of named async mutexes, one per key.
///
/// Cheap to clone; clones share the same underlying locks. Both the cart
/// service and the checkout orchestrator must hold a clone of the same
/// registry so a checkout commit excludes cart mutations for that identity.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    ///
    /// The guard releases on drop. When a caller needs two keys (the merge
    /// holds both the guest and the user identity), it must acquire the guest
    /// key first; single-key callers never hold one lock while waiting for
    /// another, so that fixed order is deadlock-free.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_owned()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = KeyedLocks::new();
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("cart:1").await;
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                // No other task entered the critical section meanwhile.
                assert_eq!(counter.load(Ordering::SeqCst), seen + 1);
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("cart:a").await;
        // Completes immediately despite `cart:a` being held.
        let _b = locks.acquire("cart:b").await;
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let locks = KeyedLocks::new();
        let clone = locks.clone();
        let guard = locks.acquire("cart:1").await;
        let attempt = tokio::time::timeout(Duration::from_millis(20), clone.acquire("cart:1"));
        assert!(attempt.await.is_err(), "clone must contend on the same lock");
        drop(guard);
        let _reacquired = clone.acquire("cart:1").await;
    }
}
