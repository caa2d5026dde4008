// ── Cache indices ──
//
// Immutable lookup tables derived from store contents. A new index is
// built for every change and swapped in whole; nothing mutates a
// published index.

use std::collections::{BTreeSet, HashMap};

use crate::model::collection::{self, CollectionKind, SYSTEMS_PREFIX};
use crate::model::{Aggregate, DEFAULT_SUBSCRIPTION_ID, DeviceSubscription, Subscription};

type IdSet = BTreeSet<String>;

#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    subscriptions: HashMap<String, Subscription>,
    by_system: HashMap<String, IdSet>,
    by_aggregate: HashMap<String, IdSet>,
    by_collection: HashMap<String, IdSet>,
    empty_origin: IdSet,
    system_to_aggregates: HashMap<String, IdSet>,
    host_to_system: HashMap<String, String>,
}

/// How a subscription host string is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Collection,
    Aggregate,
    System,
}

impl HostKind {
    pub fn classify(host: &str) -> Self {
        if collection::is_collection_host(host) {
            Self::Collection
        } else if uuid::Uuid::parse_str(host).is_ok() {
            Self::Aggregate
        } else {
            Self::System
        }
    }
}

impl CacheIndex {
    pub fn build(
        subscriptions: Vec<Subscription>,
        aggregates: &[(String, Aggregate)],
        device_subscriptions: &[DeviceSubscription],
    ) -> Self {
        let mut index = Self {
            subscriptions: subscriptions
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect(),
            ..Self::default()
        };
        index.index_subscriptions();
        index.index_aggregates(aggregates);
        index.index_devices(device_subscriptions);
        index
    }

    // ── Copy-on-write updates ────────────────────────────────────────

    /// A copy of this index with `subscription` inserted or replaced.
    #[must_use]
    pub fn with_subscription(&self, subscription: Subscription) -> Self {
        let mut next = self.clone();
        next.subscriptions
            .insert(subscription.id.clone(), subscription);
        next.index_subscriptions();
        next
    }

    /// A copy of this index without subscription `id`.
    #[must_use]
    pub fn without_subscription(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.subscriptions.remove(id);
        next.index_subscriptions();
        next
    }

    /// A copy of this index with the host→system entry for `ds` refreshed.
    #[must_use]
    pub fn with_device(&self, ds: &DeviceSubscription) -> Self {
        let mut next = self.clone();
        next.index_devices(std::slice::from_ref(ds));
        next
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    /// System ID for an event source; collection markers map to themselves.
    pub fn resolve_host(&self, host: &str) -> Option<String> {
        match self.host_to_system.get(host) {
            Some(system) => Some(system.clone()),
            None if collection::is_collection_host(host) => Some(host.to_owned()),
            None => None,
        }
    }

    /// Every subscription that may care about an event from `host`.
    ///
    /// Unions the host's own subscriptions, those of aggregates containing
    /// `system_id`, the empty-origin subscriptions and the collection
    /// bucket implied by `origin_of_condition`. Aggregate matches get
    /// `/redfish/v1/Systems/{system_id}` added to their origins.
    pub fn lookup(&self, origin_of_condition: &str, system_id: &str, host: &str) -> Vec<Subscription> {
        let mut found: Vec<Subscription> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut push = |sub: Subscription, found: &mut Vec<Subscription>| {
            if let Some(&at) = position.get(&sub.id) {
                for origin in sub.origin_resources {
                    if !found[at].origin_resources.contains(&origin) {
                        found[at].origin_resources.push(origin);
                    }
                }
            } else {
                position.insert(sub.id.clone(), found.len());
                found.push(sub);
            }
        };

        for id in self.by_system.get(host).into_iter().flatten() {
            if let Some(sub) = self.subscriptions.get(id) {
                push(sub.clone(), &mut found);
            }
        }

        let system_uri = format!("{SYSTEMS_PREFIX}{system_id}");
        for aggregate in self.system_to_aggregates.get(system_id).into_iter().flatten() {
            for id in self.by_aggregate.get(aggregate).into_iter().flatten() {
                if let Some(sub) = self.subscriptions.get(id) {
                    let mut copy = sub.clone();
                    copy.origin_resources.push(system_uri.clone());
                    push(copy, &mut found);
                }
            }
        }

        for id in &self.empty_origin {
            if let Some(sub) = self.subscriptions.get(id) {
                push(sub.clone(), &mut found);
            }
        }

        if let Some(kind) = CollectionKind::for_event(origin_of_condition, host) {
            for id in self.by_collection.get(&kind.to_string()).into_iter().flatten() {
                if let Some(sub) = self.subscriptions.get(id) {
                    push(sub.clone(), &mut found);
                }
            }
        }

        found
    }

    // ── Index construction ───────────────────────────────────────────

    fn index_subscriptions(&mut self) {
        self.by_system.clear();
        self.by_aggregate.clear();
        self.by_collection.clear();
        self.empty_origin.clear();

        for sub in self.subscriptions.values() {
            if sub.origin_resources.is_empty() && sub.id != DEFAULT_SUBSCRIPTION_ID {
                self.empty_origin.insert(sub.id.clone());
                continue;
            }
            for host in &sub.hosts {
                let bucket = match HostKind::classify(host) {
                    HostKind::Collection => &mut self.by_collection,
                    HostKind::Aggregate => &mut self.by_aggregate,
                    HostKind::System => &mut self.by_system,
                };
                bucket
                    .entry(host.clone())
                    .or_default()
                    .insert(sub.id.clone());
            }
        }
    }

    fn index_aggregates(&mut self, aggregates: &[(String, Aggregate)]) {
        self.system_to_aggregates.clear();
        for (uri, aggregate) in aggregates {
            let aggregate_id = collection::last_segment(uri).to_owned();
            for member in aggregate.member_uris() {
                self.system_to_aggregates
                    .entry(collection::last_segment(member).to_owned())
                    .or_default()
                    .insert(aggregate_id.clone());
            }
        }
    }

    fn index_devices(&mut self, device_subscriptions: &[DeviceSubscription]) {
        for ds in device_subscriptions {
            if let Some(first) = ds.origin_resources.first() {
                let system = first.rsplit('/').next().unwrap_or(first);
                self.host_to_system
                    .insert(ds.event_host_ip.clone(), system.to_owned());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Link;
    use pretty_assertions::assert_eq;

    const AGGREGATE_ID: &str = "2ebd8b4e-7a3a-4a0f-9d0d-6a1c0e6b0a11";

    fn sub(id: &str, origins: &[&str], hosts: &[&str]) -> Subscription {
        Subscription {
            id: id.into(),
            destination: format!("https://listener/{id}"),
            origin_resources: origins.iter().map(|o| (*o).to_owned()).collect(),
            hosts: hosts.iter().map(|h| (*h).to_owned()).collect(),
            ..Subscription::default()
        }
    }

    fn ids(subs: &[Subscription]) -> Vec<&str> {
        let mut ids: Vec<&str> = subs.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    fn index() -> CacheIndex {
        let subs = vec![
            sub("direct", &["/redfish/v1/Systems/u1:1"], &["10.0.0.1"]),
            sub("coll", &["/redfish/v1/Systems"], &["SystemsCollection"]),
            sub("agg", &["/redfish/v1/AggregationService/Aggregates/a"], &[AGGREGATE_ID]),
            sub("everything", &[], &[]),
            sub(DEFAULT_SUBSCRIPTION_ID, &[], &["10.0.0.9"]),
        ];
        let aggregates = vec![(
            format!("/redfish/v1/AggregationService/Aggregates/{AGGREGATE_ID}"),
            Aggregate {
                elements: vec![Link::new("/redfish/v1/Systems/u1:1")],
            },
        )];
        let devices = vec![DeviceSubscription {
            event_host_ip: "10.0.0.1".into(),
            location: "https://10.0.0.1/sub".into(),
            origin_resources: vec!["/redfish/v1/Systems/u1:1".into()],
        }];
        CacheIndex::build(subs, &aggregates, &devices)
    }

    #[test]
    fn classifies_hosts_by_shape() {
        assert_eq!(HostKind::classify("ChassisCollection"), HostKind::Collection);
        assert_eq!(HostKind::classify(AGGREGATE_ID), HostKind::Aggregate);
        assert_eq!(HostKind::classify("10.0.0.1"), HostKind::System);
    }

    #[test]
    fn lookup_unions_all_buckets() {
        let index = index();
        let found = index.lookup("/redfish/v1/Systems/u1:1", "u1:1", "10.0.0.1");
        assert_eq!(ids(&found), vec!["agg", "coll", "direct", "everything"]);

        let agg = found.iter().find(|s| s.id == "agg").unwrap();
        assert!(agg.has_origin("/redfish/v1/Systems/u1:1"));
        assert!(!index.subscription("agg").unwrap().has_origin("/redfish/v1/Systems/u1:1"));
    }

    #[test]
    fn systems_collection_reaches_hosts_without_direct_subscription() {
        let found = index().lookup("/redfish/v1/Systems/u7:1/Processors/1", "u7:1", "10.0.0.7");
        assert_eq!(ids(&found), vec!["coll", "everything"]);
    }

    #[test]
    fn default_subscription_is_not_always_matching() {
        let index = index();
        assert!(!index.empty_origin.contains(DEFAULT_SUBSCRIPTION_ID));
        let found = index.lookup("/redfish/v1/Chassis/u9:1", "u9:1", "10.0.0.9");
        assert_eq!(ids(&found), vec![DEFAULT_SUBSCRIPTION_ID, "everything"]);
    }

    #[test]
    fn resolve_host_maps_devices_and_markers() {
        let index = index();
        assert_eq!(index.resolve_host("10.0.0.1").as_deref(), Some("u1:1"));
        assert_eq!(
            index.resolve_host("FabricsCollection").as_deref(),
            Some("FabricsCollection")
        );
        assert_eq!(index.resolve_host("10.0.0.99"), None);
    }

    #[test]
    fn copy_on_write_updates_leave_original_untouched() {
        let original = index();
        let added = original.with_subscription(sub("late", &["/redfish/v1/Chassis/u1:1"], &["10.0.0.1"]));
        let removed = added.without_subscription("direct");

        assert_eq!(original.len(), 5);
        assert_eq!(added.len(), 6);
        let found = removed.lookup("/redfish/v1/Chassis/u1:1", "u1:1", "10.0.0.1");
        assert!(found.iter().any(|s| s.id == "late"));
        assert!(found.iter().all(|s| s.id != "direct"));
    }
}
