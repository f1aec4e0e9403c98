use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use smartstock_core::ProductId;

/// Async mutexes keyed by product: writers to the same product queue up, writers
/// to different products do not contend.
///
/// Entries nobody holds or waits on are dropped on the next `lock` call, so the map
/// stays bounded by the number of products in flight rather than the catalog size.
#[derive(Debug, Default)]
pub(crate) struct ProductLocks {
    inner: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProductLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let slot = {
            // Inserting a default entry cannot leave the map half-updated.
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Only the map holds an idle slot; holders and waiters keep a clone.
            map.retain(|_, slot| Arc::strong_count(slot) > 1);
            map.entry(product_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}
