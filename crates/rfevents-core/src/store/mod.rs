// ── Subscription store contract ──
//
// The durable key-value store is an external collaborator. The reconciler,
// cache and router only see this trait; `InMemoryStore` backs the CLI and
// the tests.

pub mod encoding;
pub mod memory;

use async_trait::async_trait;

use rfevents_api::Plugin;

use crate::error::StoreError;
use crate::model::{Aggregate, DeviceSubscription, Fabric, Subscription, Target};

pub use memory::{InMemoryStore, StoreSnapshot};

/// Inventory tables whose keys the reconciler enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Table {
    /// Keys are full system URIs (`/redfish/v1/Systems/{uuid}:{n}`).
    ComputerSystem,
    /// Keys are full chassis URIs.
    Chassis,
    /// Keys are full manager URIs.
    Managers,
    /// Keys are bare fabric IDs.
    Fabric,
}

/// Typed selector for subscription reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionQuery {
    All,
    ById(String),
    ByDestination(String),
    /// Subscriptions whose `Hosts` contain this entry.
    ByHost(String),
    /// Subscriptions whose `OriginResources` contain this entry.
    ByOriginResource(String),
    ByUser(String),
}

impl SubscriptionQuery {
    pub fn matches(&self, sub: &Subscription) -> bool {
        match self {
            Self::All => true,
            Self::ById(id) => sub.id == *id,
            Self::ByDestination(dest) => sub.destination == *dest,
            Self::ByHost(host) => sub.has_host(host),
            Self::ByOriginResource(origin) => sub.has_origin(origin),
            Self::ByUser(user) => sub.user_name == *user,
        }
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    // ── Subscriptions ────────────────────────────────────────────────

    async fn read_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Vec<Subscription>, StoreError>;

    /// Insert a new subscription; fails with `Duplicate` on an existing ID.
    async fn write_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// Replace an existing subscription; fails with `Missing` otherwise.
    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    async fn delete_subscription(&self, id: &str) -> Result<(), StoreError>;

    // ── Device subscriptions ─────────────────────────────────────────

    async fn read_device_subscription(
        &self,
        host: &str,
    ) -> Result<Option<DeviceSubscription>, StoreError>;

    async fn read_device_subscriptions(&self) -> Result<Vec<DeviceSubscription>, StoreError>;

    /// Insert a device subscription; fails with `Duplicate` if the host has one.
    async fn save_device_subscription(&self, ds: &DeviceSubscription) -> Result<(), StoreError>;

    /// Replace the location and origins of an existing device subscription.
    async fn update_device_subscription(&self, ds: &DeviceSubscription)
    -> Result<(), StoreError>;

    async fn delete_device_subscription(&self, host: &str) -> Result<(), StoreError>;

    // ── Read-only inventory ──────────────────────────────────────────

    async fn read_target(&self, device_uuid: &str) -> Result<Option<Target>, StoreError>;

    async fn read_targets(&self) -> Result<Vec<Target>, StoreError>;

    async fn read_plugin(&self, plugin_id: &str) -> Result<Option<Plugin>, StoreError>;

    async fn read_plugins(&self) -> Result<Vec<Plugin>, StoreError>;

    async fn read_fabric(&self, fabric_id: &str) -> Result<Option<Fabric>, StoreError>;

    async fn read_aggregate(&self, uri: &str) -> Result<Option<Aggregate>, StoreError>;

    /// Every aggregate keyed by its URI.
    async fn read_aggregates(&self) -> Result<Vec<(String, Aggregate)>, StoreError>;

    async fn list_keys(&self, table: Table) -> Result<Vec<String>, StoreError>;
}
