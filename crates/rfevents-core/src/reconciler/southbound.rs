// ── Southbound registrations ──
//
// Plugin-side subscribe and unsubscribe for devices and fabrics, and the
// pre-subscribe fold that keeps one registration per device carrying the
// union of every co-located subscription's filters.

use std::net::IpAddr;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use rfevents_api::{Plugin, PluginRequest, PluginResponse, SUBSCRIPTIONS_PATH};

use super::merge::{EventFilters, same_set};
use super::{OriginOutcome, SubscriptionReconciler, created_body};
use crate::error::CoreError;
use crate::model::collection::{AGGREGATE_COLLECTIONS, fabric_id, is_fabric_uri};
use crate::model::subscription::Link;
use crate::model::{EventDestination, Target};
use crate::response::StatusMessage;
use crate::store::SubscriptionQuery;

/// Where the pre-subscribe fold looks for co-located subscriptions, and
/// what it tears down before the new registration is made.
pub(crate) enum Scope<'a> {
    Device {
        host: &'a str,
        target: &'a Target,
        plugin: &'a Plugin,
    },
    Fabric {
        host: &'a str,
        plugin: &'a Plugin,
    },
    /// Collection markers have no southbound registration.
    Collection(&'a str),
}

impl Scope<'_> {
    fn host(&self) -> &str {
        match self {
            Self::Device { host, .. } | Self::Fabric { host, .. } | Self::Collection(host) => host,
        }
    }
}

/// `/ODIM/v1/Subscriptions` body addressing a managed device.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceRequest<'a> {
    manager_address: &'a str,
    user_name: &'a str,
    password: &'a str,
    #[serde(rename = "PluginID")]
    plugin_id: &'a str,
    #[serde(rename = "DeviceUUID")]
    device_uuid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

impl<'a> DeviceRequest<'a> {
    fn new(target: &'a Target) -> Self {
        Self {
            manager_address: &target.manager_address,
            user_name: &target.user_name,
            password: target.password.expose_secret(),
            plugin_id: &target.plugin_id,
            device_uuid: &target.device_uuid,
            post_body: None,
            location: None,
        }
    }

    fn into_value(self) -> Result<Value, CoreError> {
        serde_json::to_value(self).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

// ── Address resolution ───────────────────────────────────────────

/// IP address of a device or plugin address, with any `:port` dropped.
///
/// IP literals are returned as-is; names go through the system resolver.
pub async fn resolve_address(address: &str) -> Result<String, CoreError> {
    let host = strip_port(address);
    if host.parse::<IpAddr>().is_ok() {
        return Ok(host.to_owned());
    }
    let mut addrs = tokio::net::lookup_host((host, 0)).await.map_err(|e| {
        debug!(address, error = %e, "address lookup failed");
        CoreError::not_found("ManagerAddress", address)
    })?;
    addrs
        .next()
        .map(|addr| addr.ip().to_string())
        .ok_or_else(|| CoreError::not_found("ManagerAddress", address))
}

fn strip_port(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => address,
    }
}

fn rejection(response: &PluginResponse) -> CoreError {
    CoreError::Plugin {
        message: response.body.clone(),
        status: Some(response.status.as_u16()),
    }
}

impl SubscriptionReconciler {
    async fn send(&self, plugin: &Plugin, request: PluginRequest) -> Result<PluginResponse, CoreError> {
        Ok(self.inner.gateway.call_with_reauth(plugin, &request).await?)
    }

    // ── Per-origin dispatch ──────────────────────────────────────

    /// Subscribe one origin resource with `request`'s filters.
    ///
    /// `marker` is set when the origin names a collection: those only fold
    /// the collection's existing filters and record a marker row.
    pub(crate) async fn subscribe_origin(
        &self,
        request: &EventDestination,
        origin: &str,
        marker: Option<&str>,
    ) -> Result<OriginOutcome, CoreError> {
        let mut post = EventDestination {
            origin_resources: Vec::new(),
            ..request.clone()
        };

        if let Some(marker) = marker {
            self.fold_existing(&mut post, &Scope::Collection(marker), None)
                .await?;
            if marker != AGGREGATE_COLLECTIONS {
                self.record_device_subscription(marker, "", origin).await?;
            }
            return Ok(OriginOutcome::created(marker, created_body()));
        }

        if is_fabric_uri(origin) {
            return self.subscribe_fabric(origin, &post).await;
        }

        let target = self.target_for(origin).await?;
        let plugin = self.plugin(&target.plugin_id).await?;
        let host = resolve_address(&target.manager_address).await?;
        let scope = Scope::Device {
            host: &host,
            target: &target,
            plugin: &plugin,
        };
        self.fold_existing(&mut post, &scope, None).await?;
        self.subscribe_device(origin, &host, &target, &plugin, &post)
            .await
    }

    /// Fold the filters of every subscription already backed by the scope's
    /// host into `post`, removing the current southbound registration.
    ///
    /// Fails with `Conflict` when one of them has the same destination and
    /// the same event types; nothing is torn down in that case.
    pub(crate) async fn fold_existing(
        &self,
        post: &mut EventDestination,
        scope: &Scope<'_>,
        aggregate_id: Option<&str>,
    ) -> Result<(), CoreError> {
        let host = scope.host();
        let store = &self.inner.store;
        let mut existing = store
            .read_subscriptions(&SubscriptionQuery::ByHost(host.to_owned()))
            .await?;
        if let Some(aggregate_id) = aggregate_id {
            for sub in store
                .read_subscriptions(&SubscriptionQuery::ByHost(aggregate_id.to_owned()))
                .await?
            {
                if !existing.iter().any(|s| s.id == sub.id) {
                    existing.push(sub);
                }
            }
        }
        if existing.is_empty() {
            return Ok(());
        }

        if let Some(dup) = existing.iter().find(|s| {
            s.destination == post.destination && same_set(&s.event_types, &post.event_types)
        }) {
            info!(host, destination = %dup.destination, "destination already subscribed on host");
            return Err(CoreError::Conflict {
                destination: dup.destination.clone(),
            });
        }

        let merged = EventFilters::of_destination(post).merge(&existing);
        match scope {
            Scope::Device {
                host,
                target,
                plugin,
            } => self.delete_device_registration(host, target, plugin).await?,
            Scope::Fabric { plugin, .. } => self.delete_fabric_registration(plugin).await?,
            Scope::Collection(_) => {}
        }
        debug!(host, folded = existing.len(), "merged co-located subscription filters");
        merged.apply_to(post);
        Ok(())
    }

    // ── Devices ──────────────────────────────────────────────────

    /// Register `post` on the device's plugin and record the returned
    /// `Location` against `host`.
    pub(crate) async fn subscribe_device(
        &self,
        origin: &str,
        host: &str,
        target: &Target,
        plugin: &Plugin,
        post: &EventDestination,
    ) -> Result<OriginOutcome, CoreError> {
        let mut post = post.clone();
        post.origin_resources = vec![Link::new(origin)];

        let mut body = DeviceRequest::new(target);
        body.post_body = Some(self.southbound_body(&post)?);
        let response = self
            .send(plugin, PluginRequest::post(SUBSCRIPTIONS_PATH, body.into_value()?))
            .await?;
        if response.status.as_u16() != 201 {
            warn!(
                plugin = %plugin.id,
                status = response.status.as_u16(),
                origin,
                "plugin rejected event subscription"
            );
            return Err(rejection(&response));
        }

        let location = response
            .location
            .clone()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                CoreError::Internal("Subscription Location is missing in the response header".into())
            })?;
        let location = if location.contains(strip_port(&target.manager_address)) {
            location
        } else {
            format!("https://{}{location}", target.manager_address)
        };
        self.record_device_subscription(host, &location, origin)
            .await?;

        let body = response
            .json()
            .ok()
            .filter(|b| !b.is_null())
            .unwrap_or_else(created_body);
        Ok(OriginOutcome::created(host, body))
    }

    /// Remove the device's southbound registration, if it has one.
    pub(crate) async fn delete_device_registration(
        &self,
        host: &str,
        target: &Target,
        plugin: &Plugin,
    ) -> Result<(), CoreError> {
        let Some(ds) = self.inner.store.read_device_subscription(host).await? else {
            return Ok(());
        };
        let mut body = DeviceRequest::new(target);
        body.location = Some(&ds.location);
        let request = PluginRequest::delete(SUBSCRIPTIONS_PATH).with_body(body.into_value()?);
        let response = self.send(plugin, request).await?;
        if !response.status.is_success() {
            warn!(
                plugin = %plugin.id,
                host,
                status = response.status.as_u16(),
                "southbound subscription delete not acknowledged"
            );
        }
        Ok(())
    }

    // ── Fabrics ──────────────────────────────────────────────────

    async fn subscribe_fabric(
        &self,
        origin: &str,
        request: &EventDestination,
    ) -> Result<OriginOutcome, CoreError> {
        let fabric_id = fabric_id(origin).ok_or_else(|| CoreError::not_found("Fabrics", origin))?;
        let fabric = self
            .inner
            .store
            .read_fabric(fabric_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Fabrics", fabric_id))?;
        let plugin = self.plugin(&fabric.plugin_id).await?;
        let host = resolve_address(&plugin.ip).await.map_err(|_| {
            CoreError::validation(
                StatusMessage::ResourceNotFound,
                ["ManagerAddress", plugin.ip.as_str()],
                format!("unable to resolve plugin address {}", plugin.ip),
            )
        })?;

        let mut post = request.clone();
        post.origin_resources = vec![Link::new(origin)];
        let scope = Scope::Fabric {
            host: &host,
            plugin: &plugin,
        };
        self.fold_existing(&mut post, &scope, None).await?;
        self.register_fabric(origin, &host, &plugin, &post).await?;
        Ok(OriginOutcome::created(host, created_body()))
    }

    /// `POST` a fabric subscription and record its `Location`.
    pub(crate) async fn register_fabric(
        &self,
        origin: &str,
        host: &str,
        plugin: &Plugin,
        post: &EventDestination,
    ) -> Result<(), CoreError> {
        let body = self.southbound_body(post)?;
        let response = self
            .send(plugin, PluginRequest::post(SUBSCRIPTIONS_PATH, body))
            .await?;
        if response.status.as_u16() != 201 {
            warn!(
                plugin = %plugin.id,
                status = response.status.as_u16(),
                origin,
                "plugin rejected fabric subscription"
            );
            return Err(rejection(&response));
        }
        let location = response.location.clone().unwrap_or_default();
        self.record_device_subscription(host, &location, origin)
            .await
    }

    /// Remove the fabric plugin's registration through its stored `Location`.
    ///
    /// `NotFound` when there is nothing to remove, either locally or on the
    /// plugin.
    pub(crate) async fn delete_fabric_registration(&self, plugin: &Plugin) -> Result<(), CoreError> {
        let host = resolve_address(&plugin.ip).await?;
        let store = &self.inner.store;
        let ds = match store.read_device_subscription(&host).await? {
            Some(ds) => ds,
            None => store
                .read_device_subscription(&plugin.ip)
                .await?
                .ok_or_else(|| CoreError::not_found("DeviceSubscription", host.as_str()))?,
        };
        let response = self
            .send(plugin, PluginRequest::delete(ds.location.as_str()))
            .await?;
        if response.status == reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::not_found("Subscription", ds.location));
        }
        if !response.status.is_success() {
            warn!(
                plugin = %plugin.id,
                status = response.status.as_u16(),
                "fabric subscription delete not acknowledged"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strip_port_handles_ipv4_ipv6_and_names() {
        assert_eq!(strip_port("10.0.0.1:443"), "10.0.0.1");
        assert_eq!(strip_port("10.0.0.1"), "10.0.0.1");
        assert_eq!(strip_port("[fe80::1]:443"), "fe80::1");
        assert_eq!(strip_port("fe80::1"), "fe80::1");
        assert_eq!(strip_port("bmc.local:8443"), "bmc.local");
    }

    #[tokio::test]
    async fn ip_literals_resolve_without_lookup() {
        assert_eq!(resolve_address("10.0.0.7:443").await.unwrap(), "10.0.0.7");
        assert_eq!(resolve_address("::1").await.unwrap(), "::1");
    }

    #[test]
    fn device_request_omits_unset_fields() {
        let target: Target = serde_json::from_value(serde_json::json!({
            "ManagerAddress": "10.0.0.1",
            "Password": "secret",
            "UserName": "admin",
            "PluginID": "GRF",
            "DeviceUUID": "uuid"
        }))
        .unwrap();
        let mut request = DeviceRequest::new(&target);
        request.location = Some("https://10.0.0.1/redfish/v1/EventService/Subscriptions/1");
        let body = request.into_value().unwrap();
        assert_eq!(body["Password"], "secret");
        assert!(body.get("PostBody").is_none());
        assert_eq!(
            body["Location"],
            "https://10.0.0.1/redfish/v1/EventService/Subscriptions/1"
        );
    }
}
