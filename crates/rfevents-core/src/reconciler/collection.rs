// ── Collection and aggregate membership ──
//
// Hooks called by the aggregation service when devices join collections or
// aggregates, plus the default subscription made for every new device.

use tracing::{debug, info, warn};

use super::merge::EventFilters;
use super::southbound::{Scope, resolve_address};
use super::validate::{
    DEFAULT_CONTEXT, DEFAULT_DELIVERY_RETRY_POLICY, DEFAULT_EVENT_FORMAT_TYPE, PROTOCOL,
    SUBSCRIPTION_TYPE,
};
use super::{SubscriptionReconciler, failure_body};
use crate::error::CoreError;
use crate::model::collection::{AGGREGATES_PREFIX, CollectionKind, SYSTEMS_PREFIX};
use crate::model::subscription::Link;
use crate::model::{EventDestination, Subscription};
use crate::response::{ApiResponse, StatusMessage};
use crate::store::{SubscriptionQuery, Table};

pub const DEFAULT_SUBSCRIPTION_CONTEXT: &str = "Creating the Default Event Subscription";

impl SubscriptionReconciler {
    // ── Collection joins ─────────────────────────────────────────

    /// Give a device that just joined a collection the merged filters of
    /// every subscription on that collection.
    ///
    /// Fabric origins consult `Fabrics` subscriptions; anything else the
    /// union of `Systems`, `Chassis` and `Managers` subscriptions.
    pub async fn check_collection_subscription(&self, origin: &str, protocol: &str) {
        if let Err(e) = self.try_check_collection(origin, protocol).await {
            warn!(origin, error = %e, "collection subscription for new member failed");
        }
    }

    async fn try_check_collection(&self, origin: &str, protocol: &str) -> Result<(), CoreError> {
        let fabric = origin.contains("Fabrics");
        let kinds: &[CollectionKind] = if fabric {
            &[CollectionKind::Fabrics]
        } else {
            &[
                CollectionKind::Systems,
                CollectionKind::Chassis,
                CollectionKind::Managers,
            ]
        };

        let mut contributors: Vec<Subscription> = Vec::new();
        for kind in kinds {
            let subs = self
                .inner
                .store
                .read_subscriptions(&SubscriptionQuery::ByOriginResource(kind.origin().to_owned()))
                .await?;
            for sub in subs {
                if !contributors.iter().any(|s| s.id == sub.id) {
                    contributors.push(sub);
                }
            }
        }
        if contributors.is_empty() {
            debug!(origin, "no collection subscriptions to extend");
            return Ok(());
        }

        let mut post = EventDestination {
            destination: contributors
                .last()
                .map(|s| s.destination.clone())
                .unwrap_or_default(),
            protocol: protocol.to_owned(),
            subordinate_resources: fabric,
            origin_resources: vec![Link::new(origin)],
            ..EventDestination::default()
        };
        EventFilters::default()
            .merge(&contributors)
            .apply_to(&mut post);

        let outcome = self.subscribe_origin(&post, origin, None).await?;
        let host = outcome.host;

        if !fabric {
            self.record_member_resources(&host, origin).await?;
        }
        for mut sub in contributors {
            if sub.has_host(&host) {
                continue;
            }
            sub.hosts.push(host.clone());
            self.replace_subscription(&sub).await?;
        }
        info!(origin, host, "new collection member subscribed");
        Ok(())
    }

    /// Add the system's chassis and managers to its device subscription.
    async fn record_member_resources(&self, host: &str, origin: &str) -> Result<(), CoreError> {
        let Some(system) = origin.split_once(SYSTEMS_PREFIX).map(|(_, id)| id) else {
            return Ok(());
        };
        let store = &self.inner.store;
        let Some(mut ds) = store.read_device_subscription(host).await? else {
            return Ok(());
        };
        for table in [Table::Chassis, Table::Managers] {
            let related = store
                .list_keys(table)
                .await?
                .into_iter()
                .filter(|key| key.contains(system));
            ds.merge_origins(related);
        }
        store.update_device_subscription(&ds).await?;
        self.inner.cache.upsert_device(&ds);
        Ok(())
    }

    // ── Aggregates ───────────────────────────────────────────────

    /// Whether any subscription is backed by the aggregate.
    pub async fn is_aggregate_have_subscription(&self, aggregate_id: &str) -> bool {
        self.inner
            .store
            .read_subscriptions(&SubscriptionQuery::ByHost(aggregate_id.to_owned()))
            .await
            .is_ok_and(|subs| !subs.is_empty())
    }

    /// Detach a deleted aggregate from every subscription on it.
    ///
    /// Subscriptions left with no origin resources are deleted.
    pub async fn delete_aggregate_subscriptions(&self, aggregate_id: &str) -> Result<(), CoreError> {
        let subs = self
            .inner
            .store
            .read_subscriptions(&SubscriptionQuery::ByHost(aggregate_id.to_owned()))
            .await?;
        if subs.is_empty() {
            return Err(CoreError::not_found("Aggregate subscription", aggregate_id));
        }
        let uri = format!("{AGGREGATES_PREFIX}{aggregate_id}");
        for mut sub in subs {
            sub.hosts.retain(|h| h != aggregate_id);
            sub.origin_resources.retain(|o| *o != uri);
            if sub.origin_resources.is_empty() {
                self.remove_subscription(&sub.id).await?;
            } else {
                self.replace_subscription(&sub).await?;
            }
        }
        info!(aggregate = aggregate_id, "aggregate detached from subscriptions");
        Ok(())
    }

    /// Subscribe a system that joined an aggregate with the aggregate's
    /// merged filters.
    pub async fn update_aggregate_subscriptions(
        &self,
        system_id: &str,
        aggregate_id: &str,
    ) -> Result<(), CoreError> {
        let target = self.target_for(system_id).await?;
        let plugin = self.plugin(&target.plugin_id).await?;
        let host = resolve_address(&target.manager_address).await?;

        let mut post = EventDestination {
            origin_resources: vec![Link::new(system_id)],
            subordinate_resources: true,
            protocol: PROTOCOL.into(),
            subscription_type: SUBSCRIPTION_TYPE.into(),
            context: DEFAULT_CONTEXT.into(),
            delivery_retry_policy: DEFAULT_DELIVERY_RETRY_POLICY.into(),
            event_format_type: DEFAULT_EVENT_FORMAT_TYPE.into(),
            ..EventDestination::default()
        };
        let scope = Scope::Device {
            host: &host,
            target: &target,
            plugin: &plugin,
        };
        self.fold_existing(&mut post, &scope, Some(aggregate_id))
            .await?;
        self.subscribe_device(system_id, &host, &target, &plugin, &post)
            .await?;

        // Membership lives in the aggregate record, which the cache only
        // picks up on a rebuild.
        if let Err(e) = self.inner.cache.load().await {
            warn!(aggregate = aggregate_id, error = %e, "cache rebuild after aggregate join failed");
        }
        info!(system = system_id, aggregate = aggregate_id, "aggregate member subscribed");
        Ok(())
    }

    // ── Default subscription ─────────────────────────────────────

    /// Subscribe a newly added device with an empty-destination default
    /// subscription, then extend collection subscriptions to it.
    ///
    /// Always answers 201; the per-device outcome is only logged.
    pub async fn create_default_event_subscription(
        &self,
        origin_resources: &[String],
        event_types: Vec<String>,
        message_ids: Vec<String>,
        resource_types: Vec<String>,
        protocol: &str,
    ) -> ApiResponse {
        let Some(origin) = origin_resources.first() else {
            return ApiResponse::from(&CoreError::validation(
                StatusMessage::PropertyMissing,
                ["OriginResources"],
                "default subscription needs an origin resource",
            ));
        };
        let protocol = if protocol.is_empty() { PROTOCOL } else { protocol };
        info!(origins = %origin_resources.join("::"), "creating default event subscription");

        let post = EventDestination {
            event_types,
            message_ids,
            resource_types,
            context: DEFAULT_SUBSCRIPTION_CONTEXT.into(),
            protocol: protocol.to_owned(),
            subscription_type: SUBSCRIPTION_TYPE.into(),
            subordinate_resources: true,
            ..EventDestination::default()
        };
        let body = match self.subscribe_origin(&post, origin, None).await {
            Ok(outcome) => outcome.body,
            Err(e) => {
                warn!(origin, error = %e, "default event subscription failed");
                failure_body(&e)
            }
        };
        self.check_collection_subscription(origin, protocol).await;

        ApiResponse {
            status: 201,
            status_message: StatusMessage::Created,
            location: None,
            body,
        }
    }
}
