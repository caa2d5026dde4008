// ── Subscription reconciler ──
//
// Keeps per-device southbound subscriptions consistent with the union of
// client-level interests targeting each device. Operations are split by
// concern across the submodules; this file owns the shared handle and the
// store helpers every operation uses.

mod collection;
mod create;
mod delete;
pub mod merge;
mod query;
mod southbound;
pub mod validate;

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use rfevents_api::{Plugin, PluginGateway};

use crate::cache::SubscriptionCache;
use crate::config::{EventServiceConfig, UrlTranslation};
use crate::error::CoreError;
use crate::model::collection::device_uuid;
use crate::model::{DeviceSubscription, EventDestination, Subscription, Target};
use crate::response::{ApiResponse, StatusMessage};
use crate::store::SubscriptionStore;
use crate::task::TaskReporter;

pub use collection::DEFAULT_SUBSCRIPTION_CONTEXT;
pub use query::{SubscriptionCollection, SubscriptionView};
pub use southbound::resolve_address;

/// Public URI of the subscription collection.
pub const SUBSCRIPTIONS_URI: &str = "/redfish/v1/EventService/Subscriptions";

pub const EVENT_DESTINATION_TYPE: &str = "#EventDestination.v1_12_0.EventDestination";

// ── Per-origin outcome ───────────────────────────────────────────

/// What one origin resource's subscribe attempt produced.
#[derive(Debug, Clone)]
pub(crate) struct OriginOutcome {
    /// Device IP, collection marker or aggregate ID backing the origin.
    pub host: String,
    pub status: u16,
    pub body: Value,
}

impl OriginOutcome {
    pub(crate) fn created(host: impl Into<String>, body: Value) -> Self {
        Self {
            host: host.into(),
            status: 201,
            body,
        }
    }

    pub(crate) fn failed(err: &CoreError) -> Self {
        Self {
            host: String::new(),
            status: err.status_code(),
            body: failure_body(err),
        }
    }

    pub(crate) fn is_created(&self) -> bool {
        self.status == 201
    }
}

/// Error body for a failed operation.
///
/// A plugin rejection whose body is a JSON object is passed through as-is.
pub(crate) fn failure_body(err: &CoreError) -> Value {
    if let CoreError::Plugin { message, .. } = err {
        if let Ok(body @ Value::Object(_)) = serde_json::from_str::<Value>(message) {
            return body;
        }
    }
    ApiResponse::from(err).body
}

/// Body announcing a created resource.
pub(crate) fn created_body() -> Value {
    let id = StatusMessage::Created.message_id();
    json!({
        "code": id,
        "message": "See @Message.ExtendedInfo for more information.",
        "@Message.ExtendedInfo": [{ "MessageId": id }],
    })
}

// ── SubscriptionReconciler ───────────────────────────────────────

/// Create, delete and resubscribe protocol over the store and plugins.
///
/// Cheaply cloneable via `Arc<ReconcilerInner>`; clones share the store,
/// gateway, cache and task reporter.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<PluginGateway>,
    cache: Arc<SubscriptionCache>,
    tasks: Arc<dyn TaskReporter>,
    translation: UrlTranslation,
    max_concurrent_origins: usize,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<PluginGateway>,
        cache: Arc<SubscriptionCache>,
        tasks: Arc<dyn TaskReporter>,
        config: &EventServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                store,
                gateway,
                cache,
                tasks,
                translation: config.url_translation.clone(),
                max_concurrent_origins: config.subscription.max_concurrent_origins.max(1),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.inner.store
    }

    pub fn gateway(&self) -> &Arc<PluginGateway> {
        &self.inner.gateway
    }

    pub fn cache(&self) -> &Arc<SubscriptionCache> {
        &self.inner.cache
    }

    // ── Inventory lookups ────────────────────────────────────────

    /// Managed device owning `origin` (`/redfish/v1/Systems/{uuid}:{n}`).
    pub(crate) async fn target_for(&self, origin: &str) -> Result<Target, CoreError> {
        let uuid = device_uuid(origin).ok_or_else(|| CoreError::not_found("System", origin))?;
        self.inner
            .store
            .read_target(uuid)
            .await?
            .ok_or_else(|| CoreError::not_found("Systems", origin))
    }

    pub(crate) async fn plugin(&self, plugin_id: &str) -> Result<Plugin, CoreError> {
        self.inner
            .store
            .read_plugin(plugin_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Plugin", plugin_id))
    }

    // ── Store writes mirrored into the cache ─────────────────────

    pub(crate) async fn insert_subscription(&self, sub: &Subscription) -> Result<(), CoreError> {
        self.inner.store.write_subscription(sub).await?;
        self.inner.cache.upsert(sub);
        Ok(())
    }

    pub(crate) async fn replace_subscription(&self, sub: &Subscription) -> Result<(), CoreError> {
        self.inner.store.update_subscription(sub).await?;
        self.inner.cache.upsert(sub);
        Ok(())
    }

    pub(crate) async fn remove_subscription(&self, id: &str) -> Result<(), CoreError> {
        self.inner.store.delete_subscription(id).await?;
        self.inner.cache.remove(id);
        Ok(())
    }

    /// Record that `host` now backs `origin` via the southbound `location`.
    ///
    /// An existing row keeps its origins, gains `origin` and takes the new
    /// location; otherwise a fresh row is inserted.
    pub(crate) async fn record_device_subscription(
        &self,
        host: &str,
        location: &str,
        origin: &str,
    ) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let mut ds = DeviceSubscription {
            event_host_ip: host.to_owned(),
            location: location.to_owned(),
            origin_resources: vec![origin.to_owned()],
        };
        match store.read_device_subscription(host).await? {
            Some(existing) => {
                ds.merge_origins(existing.origin_resources);
                store.update_device_subscription(&ds).await?;
            }
            None => store.save_device_subscription(&ds).await?,
        }
        debug!(host, origins = ds.origin_resources.len(), "device subscription recorded");
        self.inner.cache.upsert_device(&ds);
        Ok(())
    }

    // ── Payload translation ──────────────────────────────────────

    /// `dest` as JSON with northbound paths rewritten for the plugin.
    pub(crate) fn southbound_body(&self, dest: &EventDestination) -> Result<Value, CoreError> {
        let raw = serde_json::to_string(dest).map_err(|e| CoreError::Internal(e.to_string()))?;
        let translated = self.inner.translation.to_south(&raw);
        serde_json::from_str(&translated).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plugin_json_rejection_is_passed_through() {
        let err = CoreError::Plugin {
            message: r#"{"error":{"code":"Base.1.13.0.GeneralError"}}"#.into(),
            status: Some(400),
        };
        assert_eq!(failure_body(&err)["error"]["code"], "Base.1.13.0.GeneralError");
        assert_eq!(OriginOutcome::failed(&err).status, 400);
    }

    #[test]
    fn other_failures_get_a_redfish_envelope() {
        let err = CoreError::not_found("System", "/redfish/v1/Systems/x:1");
        let body = failure_body(&err);
        assert_eq!(
            body["error"]["@Message.ExtendedInfo"][0]["MessageId"],
            "Base.1.13.0.ResourceNotFound"
        );
    }
}
