// ── In-memory store ──
//
// DashMap-backed `SubscriptionStore`. Device subscriptions are kept in
// their encoded row form so reads exercise the same decoding path as the
// durable store. A `StoreSnapshot` loads and saves the whole store as JSON.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use rfevents_api::Plugin;

use super::encoding::{decode_device_subscription, encode_device_subscription};
use super::{SubscriptionQuery, SubscriptionStore, Table};
use crate::error::StoreError;
use crate::model::{Aggregate, DeviceSubscription, Fabric, Subscription, Target};

/// Serializable image of every table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StoreSnapshot {
    pub subscriptions: Vec<Subscription>,
    pub device_subscriptions: Vec<DeviceSubscription>,
    pub targets: Vec<Target>,
    pub plugins: Vec<Plugin>,
    pub fabrics: Vec<Fabric>,
    pub aggregates: BTreeMap<String, Aggregate>,
    pub systems: Vec<String>,
    pub chassis: Vec<String>,
    pub managers: Vec<String>,
}

#[derive(Default)]
pub struct InMemoryStore {
    subscriptions: DashMap<String, Subscription>,
    device_rows: DashMap<String, String>,
    targets: DashMap<String, Target>,
    plugins: DashMap<String, Plugin>,
    fabrics: DashMap<String, Fabric>,
    aggregates: DashMap<String, Aggregate>,
    keys: DashMap<Table, Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for sub in snapshot.subscriptions {
            store.subscriptions.insert(sub.id.clone(), sub);
        }
        for ds in snapshot.device_subscriptions {
            store
                .device_rows
                .insert(ds.event_host_ip.clone(), encode_device_subscription(&ds));
        }
        for target in snapshot.targets {
            store.insert_target(target);
        }
        for plugin in snapshot.plugins {
            store.insert_plugin(plugin);
        }
        for fabric in snapshot.fabrics {
            store.insert_fabric(fabric);
        }
        for (uri, aggregate) in snapshot.aggregates {
            store.insert_aggregate(uri, aggregate);
        }
        store.set_keys(Table::ComputerSystem, snapshot.systems);
        store.set_keys(Table::Chassis, snapshot.chassis);
        store.set_keys(Table::Managers, snapshot.managers);
        store
    }

    /// Copy every table out, sorted by key.
    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let mut subscriptions: Vec<Subscription> =
            self.subscriptions.iter().map(|e| e.value().clone()).collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));

        let mut device_subscriptions = self
            .device_rows
            .iter()
            .map(|e| decode_device_subscription(e.value()))
            .collect::<Result<Vec<_>, _>>()?;
        device_subscriptions.sort_by(|a, b| a.event_host_ip.cmp(&b.event_host_ip));

        let mut targets: Vec<Target> = self.targets.iter().map(|e| e.value().clone()).collect();
        targets.sort_by(|a, b| a.device_uuid.cmp(&b.device_uuid));

        let mut plugins: Vec<Plugin> = self.plugins.iter().map(|e| e.value().clone()).collect();
        plugins.sort_by(|a, b| a.id.cmp(&b.id));

        let mut fabrics: Vec<Fabric> = self.fabrics.iter().map(|e| e.value().clone()).collect();
        fabrics.sort_by(|a, b| a.fabric_uuid.cmp(&b.fabric_uuid));

        Ok(StoreSnapshot {
            subscriptions,
            device_subscriptions,
            targets,
            plugins,
            fabrics,
            aggregates: self
                .aggregates
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            systems: self.keys_of(Table::ComputerSystem),
            chassis: self.keys_of(Table::Chassis),
            managers: self.keys_of(Table::Managers),
        })
    }

    // ── Inventory setup ──────────────────────────────────────────────

    pub fn insert_target(&self, target: Target) {
        self.targets.insert(target.device_uuid.clone(), target);
    }

    pub fn insert_plugin(&self, plugin: Plugin) {
        self.plugins.insert(plugin.id.clone(), plugin);
    }

    pub fn insert_fabric(&self, fabric: Fabric) {
        self.fabrics.insert(fabric.fabric_uuid.clone(), fabric);
    }

    pub fn insert_aggregate(&self, uri: impl Into<String>, aggregate: Aggregate) {
        self.aggregates.insert(uri.into(), aggregate);
    }

    pub fn set_keys(&self, table: Table, keys: Vec<String>) {
        self.keys.insert(table, keys);
    }

    fn keys_of(&self, table: Table) -> Vec<String> {
        match table {
            Table::Fabric => {
                let mut ids: Vec<String> = self.fabrics.iter().map(|e| e.key().clone()).collect();
                ids.sort();
                ids
            }
            _ => self.keys.get(&table).map(|k| k.clone()).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn read_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Vec<Subscription>, StoreError> {
        if let SubscriptionQuery::ById(id) = query {
            return Ok(self.subscriptions.get(id).map(|s| s.clone()).into_iter().collect());
        }
        let mut found: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn write_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        if self.subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::Duplicate {
                table: "Subscription",
                key: subscription.id.clone(),
            });
        }
        self.subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        match self.subscriptions.get_mut(&subscription.id) {
            Some(mut entry) => {
                *entry = subscription.clone();
                Ok(())
            }
            None => Err(StoreError::Missing {
                table: "Subscription",
                key: subscription.id.clone(),
            }),
        }
    }

    async fn delete_subscription(&self, id: &str) -> Result<(), StoreError> {
        self.subscriptions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing {
                table: "Subscription",
                key: id.to_owned(),
            })
    }

    async fn read_device_subscription(
        &self,
        host: &str,
    ) -> Result<Option<DeviceSubscription>, StoreError> {
        self.device_rows
            .get(host)
            .map(|row| decode_device_subscription(row.value()))
            .transpose()
    }

    async fn read_device_subscriptions(&self) -> Result<Vec<DeviceSubscription>, StoreError> {
        self.device_rows
            .iter()
            .map(|e| decode_device_subscription(e.value()))
            .collect()
    }

    async fn save_device_subscription(&self, ds: &DeviceSubscription) -> Result<(), StoreError> {
        if self.device_rows.contains_key(&ds.event_host_ip) {
            return Err(StoreError::Duplicate {
                table: "DeviceSubscription",
                key: ds.event_host_ip.clone(),
            });
        }
        self.device_rows
            .insert(ds.event_host_ip.clone(), encode_device_subscription(ds));
        Ok(())
    }

    async fn update_device_subscription(
        &self,
        ds: &DeviceSubscription,
    ) -> Result<(), StoreError> {
        match self.device_rows.get_mut(&ds.event_host_ip) {
            Some(mut row) => {
                *row = encode_device_subscription(ds);
                Ok(())
            }
            None => Err(StoreError::Missing {
                table: "DeviceSubscription",
                key: ds.event_host_ip.clone(),
            }),
        }
    }

    async fn delete_device_subscription(&self, host: &str) -> Result<(), StoreError> {
        self.device_rows
            .remove(host)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing {
                table: "DeviceSubscription",
                key: host.to_owned(),
            })
    }

    async fn read_target(&self, device_uuid: &str) -> Result<Option<Target>, StoreError> {
        Ok(self.targets.get(device_uuid).map(|t| t.clone()))
    }

    async fn read_targets(&self) -> Result<Vec<Target>, StoreError> {
        let mut targets: Vec<Target> = self.targets.iter().map(|e| e.value().clone()).collect();
        targets.sort_by(|a, b| a.device_uuid.cmp(&b.device_uuid));
        Ok(targets)
    }

    async fn read_plugin(&self, plugin_id: &str) -> Result<Option<Plugin>, StoreError> {
        Ok(self.plugins.get(plugin_id).map(|p| p.clone()))
    }

    async fn read_plugins(&self) -> Result<Vec<Plugin>, StoreError> {
        let mut plugins: Vec<Plugin> = self.plugins.iter().map(|e| e.value().clone()).collect();
        plugins.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(plugins)
    }

    async fn read_fabric(&self, fabric_id: &str) -> Result<Option<Fabric>, StoreError> {
        Ok(self.fabrics.get(fabric_id).map(|f| f.clone()))
    }

    async fn read_aggregate(&self, uri: &str) -> Result<Option<Aggregate>, StoreError> {
        Ok(self.aggregates.get(uri).map(|a| a.clone()))
    }

    async fn read_aggregates(&self) -> Result<Vec<(String, Aggregate)>, StoreError> {
        let mut all: Vec<(String, Aggregate)> = self
            .aggregates
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }

    async fn list_keys(&self, table: Table) -> Result<Vec<String>, StoreError> {
        Ok(self.keys_of(table))
    }
}
