// ── Event router ──
//
// Turns one inbound device event envelope into deliveries to every
// matching subscription. Deliveries and inventory side channels run on
// tracked background tasks and never affect each other.

mod delivery;
mod filter;
mod format;
mod test_event;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::config::{EventServiceConfig, UrlTranslation};
use crate::inventory::InventoryService;
use crate::model::collection::{CollectionKind, FABRICS_PREFIX, is_aggregate_uri};
use crate::model::{Event, MessageData, Subscription, resource_type};
use crate::reconciler::SubscriptionReconciler;
use crate::reconciler::validate::PROTOCOL;
use crate::store::SubscriptionQuery;

pub use delivery::Deliverer;
pub use filter::{filter_matches, resource_type_subscribed};
pub use format::{canonicalize_ids, storage_uri};
pub use test_event::{SEVERITIES, parse_test_event};

/// Fabric sub-resources whose creation is not a new fabric.
const FABRIC_SUB_RESOURCES: [&str; 3] = ["Zones", "Endpoints", "AddressPools"];

#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    reconciler: SubscriptionReconciler,
    inventory: Arc<dyn InventoryService>,
    deliverer: Arc<Deliverer>,
    translation: UrlTranslation,
    background: TaskTracker,
}

impl EventRouter {
    pub fn new(
        reconciler: SubscriptionReconciler,
        inventory: Arc<dyn InventoryService>,
        deliverer: Arc<Deliverer>,
        config: &EventServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                reconciler,
                inventory,
                deliverer,
                translation: config.url_translation.clone(),
                background: TaskTracker::new(),
            }),
        }
    }

    pub fn deliverer(&self) -> &Arc<Deliverer> {
        &self.inner.deliverer
    }

    /// Wait for every delivery and side-channel task spawned so far.
    pub async fn wait_idle(&self) {
        let background = &self.inner.background;
        background.close();
        background.wait().await;
        background.reopen();
    }

    // ── Publishing ───────────────────────────────────────────────

    /// Route an event envelope raised by the device at `host`.
    ///
    /// Returns `true` when at least one delivery or side channel was
    /// started. Malformed payloads, unknown sources, events without an
    /// `OriginOfCondition` and unsupported resource types yield `false`
    /// for the affected events.
    pub async fn publish_event(&self, host: &str, raw: &[u8]) -> bool {
        let payload = self.inner.translation.to_north(&String::from_utf8_lossy(raw));
        self.register_new_fabrics(&payload, host);

        let store = self.inner.reconciler.store();
        let ds = match store.read_device_subscription(host).await {
            Ok(Some(ds)) => ds,
            Ok(None) => {
                warn!(host, "event from a source without a device subscription");
                return false;
            }
            Err(e) => {
                warn!(host, error = %e, "failed to read device subscription");
                return false;
            }
        };
        let Some(first_origin) = ds.origin_resources.first() else {
            warn!(host, "device subscription has no origin resources");
            return false;
        };

        let (payload, uuid) = canonicalize_ids(&payload, first_origin, host);
        let message: MessageData = match serde_json::from_str(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(host, error = %e, "unparseable event payload");
                return false;
            }
        };

        let system_id = self
            .inner
            .reconciler
            .cache()
            .resolve_host(host)
            .unwrap_or_default();
        let mut outbound: BTreeMap<String, Vec<Event>> = BTreeMap::new();
        let mut started = false;

        for event in &message.events {
            if event.origin_of_condition.is_empty() {
                warn!(host, event_id = %event.event_id, "event dropped: OriginOfCondition is empty");
                continue;
            }
            let segments = event.origin_segments();
            let resource = segments
                .len()
                .checked_sub(2)
                .and_then(|i| segments.get(i))
                .copied()
                .unwrap_or_default();
            if !resource_type::segment_is_supported(resource) {
                warn!(
                    host,
                    origin = %event.origin_of_condition,
                    "event dropped: resource type not supported"
                );
                continue;
            }

            for sub in self.candidates(&event.origin_of_condition, &system_id, host).await {
                let origins = match_scope(&ds.origin_resources, &sub);
                if filter_matches(&sub, event, &origins) {
                    outbound
                        .entry(sub.destination.clone())
                        .or_default()
                        .push(event.clone());
                    started = true;
                } else {
                    debug!(subscription = %sub.id, "event filtered out");
                }
            }

            started |= self.trigger_side_channels(event, &uuid);
        }

        for (destination, events) in outbound {
            let envelope = MessageData {
                odata_type: message.odata_type.clone(),
                name: message.name.clone(),
                context: message.context.clone(),
                events,
            };
            match serde_json::to_vec(&envelope) {
                Ok(body) => self.spawn_delivery(destination, body),
                Err(e) => warn!(destination, error = %e, "failed to encode outbound event"),
            }
        }
        started
    }

    /// Deliverable subscriptions registered for `host` that may care about
    /// the event.
    ///
    /// Served from the cache; before the cache is loaded the store is
    /// queried by host instead. Either way a subscription must list the
    /// reporting host, so empty-origin and aggregate rows only apply to
    /// the devices they were registered against.
    async fn candidates(&self, origin: &str, system_id: &str, host: &str) -> Vec<Subscription> {
        let cache = self.inner.reconciler.cache();
        let subs = if cache.snapshot().is_empty() {
            self.inner
                .reconciler
                .store()
                .read_subscriptions(&SubscriptionQuery::ByHost(host.to_owned()))
                .await
                .unwrap_or_else(|e| {
                    warn!(host, error = %e, "failed to read subscriptions for host");
                    Vec::new()
                })
        } else {
            cache.lookup(origin, system_id, host)
        };
        subs.into_iter()
            .filter(|sub| sub.is_deliverable() && sub.has_host(host))
            .collect()
    }

    pub(crate) fn spawn_delivery(&self, destination: String, body: Vec<u8>) {
        let deliverer = Arc::clone(&self.inner.deliverer);
        self.inner.background.spawn(async move {
            deliverer.deliver(&destination, body).await;
        });
    }

    // ── Side channels ────────────────────────────────────────────

    fn trigger_side_channels(&self, event: &Event, uuid: &str) -> bool {
        let origin = &event.origin_of_condition;
        let message_id = &event.message_id;
        let mut triggered = false;

        if event.event_type.eq_ignore_ascii_case("Alert") {
            if message_id.contains("ServerPostDiscoveryComplete")
                || message_id.contains("ServerPostComplete")
            {
                self.spawn_rediscovery(uuid, origin.trim_end_matches('/'));
                triggered = true;
            }
            if message_id.contains("ServerPoweredOn") || message_id.contains("ServerPoweredOff") {
                let inventory = Arc::clone(&self.inner.inventory);
                let (uuid, origin, message_id) =
                    (uuid.to_owned(), origin.trim_end_matches('/').to_owned(), message_id.clone());
                self.inner.background.spawn(async move {
                    inventory
                        .update_system_power_state(&uuid, &origin, &message_id)
                        .await;
                });
                triggered = true;
            }
        } else if (event.event_type.eq_ignore_ascii_case("ResourceAdded")
            || event.event_type.eq_ignore_ascii_case("ResourceRemoved"))
            && origin.contains("Volumes")
        {
            if let Some(storage) = storage_uri(origin) {
                self.spawn_rediscovery(uuid, &storage);
                triggered = true;
            }
        }
        triggered
    }

    fn spawn_rediscovery(&self, uuid: &str, uri: &str) {
        let inventory = Arc::clone(&self.inner.inventory);
        let (uuid, uri) = (uuid.to_owned(), uri.to_owned());
        self.inner.background.spawn(async move {
            inventory.rediscover_system_inventory(&uuid, &uri).await;
        });
    }

    /// Register fabrics announced by `ResourceAdded` events and extend
    /// `Fabrics` subscriptions to them.
    fn register_new_fabrics(&self, payload: &str, host: &str) {
        if !(payload.contains(CollectionKind::Fabrics.origin()) && payload.contains("ResourceAdded")) {
            return;
        }
        let message: MessageData = match serde_json::from_str(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(host, error = %e, "unparseable fabric event payload");
                return;
            }
        };
        for event in message.events {
            let origin = event.origin_of_condition;
            if !event.event_type.eq_ignore_ascii_case("ResourceAdded")
                || !origin.starts_with(FABRICS_PREFIX)
                || FABRIC_SUB_RESOURCES.iter().any(|s| origin.contains(s))
            {
                continue;
            }
            let inventory = Arc::clone(&self.inner.inventory);
            let reconciler = self.inner.reconciler.clone();
            let host = host.to_owned();
            self.inner.background.spawn(async move {
                inventory.add_fabric(&origin, &host).await;
                reconciler.check_collection_subscription(&origin, PROTOCOL).await;
            });
        }
    }
}

/// Origins an event is tested against for one candidate subscription:
/// the device's registered origins plus the concrete resources the
/// subscription itself names.
fn match_scope(device_origins: &[String], sub: &Subscription) -> Vec<String> {
    let mut origins = device_origins.to_vec();
    for origin in &sub.origin_resources {
        let concrete = !is_aggregate_uri(origin) && CollectionKind::from_origin(origin).is_none();
        if concrete && !origins.contains(origin) {
            origins.push(origin.clone());
        }
    }
    origins
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn match_scope_skips_collections_and_aggregates() {
        let sub = Subscription {
            origin_resources: vec![
                "/redfish/v1/Systems".into(),
                "/redfish/v1/AggregationService/Aggregates/a1".into(),
                "/redfish/v1/Systems/6d4a:1".into(),
            ],
            ..Subscription::default()
        };
        let scope = match_scope(&["/redfish/v1/Chassis/6d4a:1".to_owned()], &sub);
        assert_eq!(
            scope,
            vec!["/redfish/v1/Chassis/6d4a:1", "/redfish/v1/Systems/6d4a:1"]
        );
    }
}
