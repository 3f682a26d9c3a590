//! SKU -> product variant memoization.
//!
//! One `OnceCell` per key: concurrent callers for the same SKU share a single
//! remote lookup, while lookups for different SKUs never wait on each other.
//! The map lock is only held to fetch or insert a cell, never across `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use ogen_remote::RemoteOrderService;
use ogen_schemas::ProductInfo;
use tokio::sync::{Mutex, OnceCell};

type Slot = Arc<OnceCell<Option<ProductInfo>>>;

pub struct ProductCache {
    remote: Arc<dyn RemoteOrderService>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl std::fmt::Debug for ProductCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCache")
            .field("remote", &self.remote.name())
            .finish_non_exhaustive()
    }
}

impl ProductCache {
    pub fn new(remote: Arc<dyn RemoteOrderService>) -> Self {
        Self {
            remote,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, sku: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(sku.to_string()).or_default().clone()
    }

    /// Resolve a SKU, performing at most one remote lookup per key until the
    /// entry is cleared. Lookup errors are logged and cached as a miss.
    pub async fn resolve(&self, sku: &str) -> Option<ProductInfo> {
        let slot = self.slot(sku).await;
        slot.get_or_init(|| async {
            match self.remote.search_product_by_sku(sku).await {
                Ok(Some(p)) => {
                    tracing::debug!(sku, variant_id = %p.variant_id, "sku resolved");
                    Some(p)
                }
                Ok(None) => {
                    tracing::warn!(sku, "sku not found; using fallback line item");
                    None
                }
                Err(e) => {
                    tracing::warn!(sku, error = %e, "sku lookup failed; using fallback line item");
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Drop cached misses so the next run retries them. Hits and in-flight
    /// lookups are kept. Returns the number of entries removed.
    pub async fn clear_misses(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, slot| !matches!(slot.get(), Some(None)));
        before - slots.len()
    }

    /// Number of keys with a completed lookup (hit or miss).
    pub async fn resolved_len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|s| s.initialized())
            .count()
    }
}
