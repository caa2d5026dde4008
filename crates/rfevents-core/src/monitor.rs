// ── Plugin status monitor ──
//
// Periodically probes every registered plugin. Live plugins report the
// message-bus queues they publish on; those are handed to the gateway's
// topic registry. When a plugin comes up (first probe after start, or
// after a failed probe) its managed devices are pushed to the plugin's
// start-up endpoint in batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use secrecy::SecretString;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rfevents_api::models::serialize_secret;
use rfevents_api::{Plugin, PluginGateway, PluginRequest, ProbePolicy, STARTUP_PATH};

use crate::config::PluginStatusPolling;
use crate::error::CoreError;
use crate::model::Target;
use crate::store::{SubscriptionQuery, SubscriptionStore};

// ── Start-up payload ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartupRequest<'a> {
    request_type: &'static str,
    resync_evt_subscription: bool,
    devices: BTreeMap<&'a str, DeviceData<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceData<'a> {
    user_name: &'a str,
    #[serde(serialize_with = "serialize_secret")]
    password: SecretString,
    address: &'a str,
    operation: &'static str,
    event_subscription_info: EventSubscriptionInfo,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EventSubscriptionInfo {
    event_types: Vec<String>,
    location: String,
}

/// Result of probing one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginHealth {
    pub plugin_id: String,
    pub alive: bool,
    /// Queue names first seen in this probe.
    pub new_topics: Vec<String>,
    /// Devices included in start-up requests sent after this probe.
    pub devices_shared: usize,
}

// ── Monitor ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PluginMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<PluginGateway>,
    policy: ProbePolicy,
    polling: PluginStatusPolling,
    /// Last probe result per plugin ID.
    last_alive: DashMap<String, bool>,
}

impl PluginMonitor {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<PluginGateway>,
        polling: &PluginStatusPolling,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                gateway,
                policy: polling.probe_policy(),
                polling: polling.clone(),
                last_alive: DashMap::new(),
            }),
        }
    }

    /// Probe every plugin once.
    pub async fn sweep(&self) -> Result<Vec<PluginHealth>, CoreError> {
        let plugins = self.inner.store.read_plugins().await?;
        let mut results = Vec::with_capacity(plugins.len());
        for plugin in &plugins {
            results.push(self.check_plugin(plugin).await);
        }
        Ok(results)
    }

    /// Probe one plugin, register its queues and share inventory if it
    /// just came up.
    pub async fn check_plugin(&self, plugin: &Plugin) -> PluginHealth {
        let policy = &self.inner.policy;
        let report = self
            .inner
            .gateway
            .check_status(
                plugin,
                policy.max_attempts,
                policy.response_timeout,
                policy.retry_interval,
            )
            .await;

        let previous = self
            .inner
            .last_alive
            .insert(plugin.id.clone(), report.alive);
        let mut health = PluginHealth {
            plugin_id: plugin.id.clone(),
            alive: report.alive,
            ..PluginHealth::default()
        };

        if !report.alive {
            warn!(
                plugin = %plugin.id,
                error = report.error.as_deref().unwrap_or_default(),
                "plugin is not reachable"
            );
            return health;
        }

        health.new_topics = self
            .inner
            .gateway
            .topics()
            .consume_all(report.queues.iter().map(String::as_str));

        if previous != Some(true) {
            let resync = previous == Some(false);
            match self.share_inventory(plugin, resync).await {
                Ok(count) => health.devices_shared = count,
                Err(e) => warn!(plugin = %plugin.id, error = %e, "start-up data not shared"),
            }
        }
        health
    }

    /// Send the plugin's managed devices to its start-up endpoint.
    ///
    /// Returns the number of devices included in batches the plugin
    /// accepted.
    pub async fn share_inventory(&self, plugin: &Plugin, resync: bool) -> Result<usize, CoreError> {
        let targets: Vec<Target> = self
            .inner
            .store
            .read_targets()
            .await?
            .into_iter()
            .filter(|t| t.plugin_id == plugin.id)
            .collect();
        if targets.is_empty() {
            info!(plugin = %plugin.id, "plugin is not managing any server");
            return Ok(0);
        }

        let batch_size = self.inner.polling.start_up_resource_batch_size.max(1);
        let mut shared = 0;
        let mut failure = None;
        for batch in targets.chunks(batch_size) {
            match self.send_batch(plugin, batch, resync).await {
                Ok(()) => shared += batch.len(),
                Err(e) => {
                    warn!(plugin = %plugin.id, error = %e, "start-up batch rejected");
                    failure = Some(e);
                }
            }
        }
        match failure {
            Some(e) if shared == 0 => Err(e),
            _ => Ok(shared),
        }
    }

    async fn send_batch(&self, plugin: &Plugin, batch: &[Target], resync: bool) -> Result<(), CoreError> {
        let mut devices = BTreeMap::new();
        for target in batch {
            let info = self.subscription_info(target).await;
            devices.insert(
                target.device_uuid.as_str(),
                DeviceData {
                    user_name: &target.user_name,
                    password: target.password.clone(),
                    address: &target.manager_address,
                    operation: "add",
                    event_subscription_info: info,
                },
            );
        }
        let body = serde_json::to_value(StartupRequest {
            request_type: "full",
            resync_evt_subscription: resync,
            devices,
        })
        .map_err(|e| CoreError::Internal(e.to_string()))?;

        let response = self
            .inner
            .gateway
            .call(plugin, &PluginRequest::post(STARTUP_PATH, body))
            .await?;
        if response.status != reqwest::StatusCode::OK {
            return Err(CoreError::Plugin {
                message: format!("start-up request returned {}", response.status),
                status: Some(response.status.as_u16()),
            });
        }
        info!(plugin = %plugin.id, devices = batch.len(), "start-up data sent");

        match serde_json::from_str::<BTreeMap<String, String>>(&response.body) {
            Ok(locations) => self.apply_locations(&locations).await,
            Err(e) => debug!(plugin = %plugin.id, error = %e, "start-up response carried no locations"),
        }
        Ok(())
    }

    /// Event types and southbound location recorded for a device.
    async fn subscription_info(&self, target: &Target) -> EventSubscriptionInfo {
        let host = target.host();
        let store = &self.inner.store;
        let mut info = EventSubscriptionInfo::default();

        match store.read_device_subscription(host).await {
            Ok(Some(ds)) => info.location = ds.location,
            Ok(None) => debug!(host, "no device subscription for managed server"),
            Err(e) => warn!(host, error = %e, "failed to read device subscription"),
        }
        match store
            .read_subscriptions(&SubscriptionQuery::ByHost(host.to_owned()))
            .await
        {
            Ok(subs) => {
                for event_type in subs.into_iter().flat_map(|s| s.event_types) {
                    if !info.event_types.contains(&event_type) {
                        info.event_types.push(event_type);
                    }
                }
            }
            Err(e) => warn!(host, error = %e, "failed to read subscriptions for host"),
        }
        info
    }

    /// Store the southbound locations a plugin reports after re-subscribing.
    async fn apply_locations(&self, locations: &BTreeMap<String, String>) {
        let store = &self.inner.store;
        for (host, location) in locations {
            let mut ds = match store.read_device_subscription(host).await {
                Ok(Some(ds)) => ds,
                Ok(None) => continue,
                Err(e) => {
                    warn!(host, error = %e, "failed to read device subscription");
                    continue;
                }
            };
            ds.location.clone_from(location);
            if let Err(e) = store.update_device_subscription(&ds).await {
                warn!(host, error = %e, "failed to update device subscription location");
            }
        }
    }

    // ── Background loop ──────────────────────────────────────────────

    /// Sweep on the configured polling interval until `cancel` fires.
    ///
    /// Returns `None` when polling is disabled.
    pub fn spawn(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.inner.polling.polling_interval();
        if period.is_zero() {
            info!("plugin status polling disabled");
            return None;
        }
        let monitor = self.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = monitor.sweep().await {
                            warn!(error = %e, "plugin status sweep failed");
                        }
                    }
                }
            }
            debug!("plugin status monitor stopped");
        }))
    }
}
