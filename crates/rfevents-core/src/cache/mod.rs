// ── Subscription cache ──
//
// Answers "which subscriptions care about this event" without a store
// round-trip. The published `CacheIndex` is swapped atomically; readers
// never block writers. Store writes made by the reconciler are mirrored
// through the `upsert`/`remove` hooks, and `load` rebuilds from scratch.

pub mod index;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::model::{DeviceSubscription, Subscription};
use crate::store::{SubscriptionQuery, SubscriptionStore};

pub use index::{CacheIndex, HostKind};

pub struct SubscriptionCache {
    store: Arc<dyn SubscriptionStore>,
    index: ArcSwap<CacheIndex>,
}

impl SubscriptionCache {
    /// An empty cache; call [`load`](Self::load) before routing events.
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            index: ArcSwap::from_pointee(CacheIndex::default()),
        }
    }

    /// Rebuild every index from the store.
    pub async fn load(&self) -> Result<(), StoreError> {
        let subscriptions = self.store.read_subscriptions(&SubscriptionQuery::All).await?;
        let aggregates = self.store.read_aggregates().await?;
        let devices = self.store.read_device_subscriptions().await?;

        let index = CacheIndex::build(subscriptions, &aggregates, &devices);
        info!(
            subscriptions = index.len(),
            aggregates = aggregates.len(),
            devices = devices.len(),
            "subscription cache loaded"
        );
        self.index.store(Arc::new(index));
        Ok(())
    }

    /// Current index snapshot.
    pub fn snapshot(&self) -> Arc<CacheIndex> {
        self.index.load_full()
    }

    pub fn lookup(&self, origin_of_condition: &str, system_id: &str, host: &str) -> Vec<Subscription> {
        self.index.load().lookup(origin_of_condition, system_id, host)
    }

    pub fn resolve_host(&self, host: &str) -> Option<String> {
        self.index.load().resolve_host(host)
    }

    // ── Store write hooks ────────────────────────────────────────────

    pub fn upsert(&self, subscription: &Subscription) {
        debug!(id = %subscription.id, "cache upsert");
        self.index
            .rcu(|current| current.with_subscription(subscription.clone()));
    }

    pub fn remove(&self, id: &str) {
        debug!(id, "cache remove");
        self.index.rcu(|current| current.without_subscription(id));
    }

    pub fn upsert_device(&self, ds: &DeviceSubscription) {
        self.index.rcu(|current| current.with_device(ds));
    }

    // ── Background refresh ───────────────────────────────────────────

    /// Periodically rebuild from the store until `cancel` fires.
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = cache.load().await {
                            warn!(error = %e, "subscription cache refresh failed");
                        }
                    }
                }
            }
            debug!("subscription cache refresh stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn sub(id: &str, host: &str) -> Subscription {
        Subscription {
            id: id.into(),
            destination: format!("https://listener/{id}"),
            origin_resources: vec![format!("/redfish/v1/Systems/{id}:1")],
            hosts: vec![host.into()],
            ..Subscription::default()
        }
    }

    #[tokio::test]
    async fn load_then_hooks_track_store_writes() {
        let store = Arc::new(InMemoryStore::new());
        store.write_subscription(&sub("a", "10.0.0.1")).await.unwrap();
        let cache = SubscriptionCache::new(store.clone());
        cache.load().await.unwrap();
        assert_eq!(cache.lookup("/redfish/v1/Chassis/x", "", "10.0.0.1").len(), 1);

        cache.upsert(&sub("b", "10.0.0.1"));
        assert_eq!(cache.lookup("/redfish/v1/Chassis/x", "", "10.0.0.1").len(), 2);

        cache.remove("a");
        let found = cache.lookup("/redfish/v1/Chassis/x", "", "10.0.0.1");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_reloads_until_cancelled() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(SubscriptionCache::new(store.clone()));
        let cancel = CancellationToken::new();
        let handle = cache.spawn_refresh(Duration::from_secs(5), cancel.clone());

        store.write_subscription(&sub("a", "10.0.0.1")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.snapshot().len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
