// ── Inventory side channel ──
//
// Calls into the aggregation subsystem triggered by specific inbound
// events. All best-effort: failures are logged by the implementation and
// never affect event delivery.

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Re-read the inventory rooted at `uri` for the system `system_id`.
    async fn rediscover_system_inventory(&self, system_id: &str, uri: &str);

    /// Record a power state change reported by `message_id`.
    async fn update_system_power_state(&self, system_id: &str, uri: &str, message_id: &str);

    /// Register a fabric resource announced by the plugin at `host`.
    async fn add_fabric(&self, origin: &str, host: &str);
}

/// Logs and drops every call.
#[derive(Debug, Default)]
pub struct NoopInventory;

#[async_trait]
impl InventoryService for NoopInventory {
    async fn rediscover_system_inventory(&self, system_id: &str, uri: &str) {
        debug!(system = system_id, uri, "inventory rediscovery requested");
    }

    async fn update_system_power_state(&self, system_id: &str, uri: &str, message_id: &str) {
        debug!(system = system_id, uri, message_id, "power state update requested");
    }

    async fn add_fabric(&self, origin: &str, host: &str) {
        debug!(origin, host, "fabric registration requested");
    }
}
