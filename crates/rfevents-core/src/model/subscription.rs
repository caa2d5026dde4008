// ── Subscription records ──

use serde::{Deserialize, Serialize};

/// ID of the always-on default subscription created for every device.
pub const DEFAULT_SUBSCRIPTION_ID: &str = "0";

/// A Redfish resource link, e.g. `{"@odata.id": "/redfish/v1/Systems/x"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "@odata.id")]
    pub oid: String,
}

impl Link {
    pub fn new(oid: impl Into<String>) -> Self {
        Self { oid: oid.into() }
    }
}

/// Client-facing subscription as persisted in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Subscription {
    #[serde(rename = "SubscriptionID")]
    pub id: String,
    pub user_name: String,
    pub name: String,
    pub destination: String,
    pub context: String,
    pub event_types: Vec<String>,
    pub message_ids: Vec<String>,
    pub resource_types: Vec<String>,
    pub protocol: String,
    pub subscription_type: String,
    pub event_format_type: String,
    pub subordinate_resources: bool,
    pub delivery_retry_policy: String,
    /// URIs or collection/aggregate identifiers actually subscribed.
    pub origin_resources: Vec<String>,
    /// Device IPs, collection names or aggregate IDs backing this subscription.
    pub hosts: Vec<String>,
}

impl Subscription {
    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }

    pub fn has_origin(&self, origin: &str) -> bool {
        self.origin_resources.iter().any(|o| o == origin)
    }

    /// Default subscriptions carry no destination and are never delivered to.
    pub fn is_deliverable(&self) -> bool {
        !self.destination.is_empty()
    }

    /// The wire body describing this subscription's filters.
    pub fn to_destination(&self) -> EventDestination {
        EventDestination {
            name: self.name.clone(),
            destination: self.destination.clone(),
            event_types: self.event_types.clone(),
            message_ids: self.message_ids.clone(),
            resource_types: self.resource_types.clone(),
            context: self.context.clone(),
            event_format_type: self.event_format_type.clone(),
            protocol: self.protocol.clone(),
            subscription_type: self.subscription_type.clone(),
            subordinate_resources: self.subordinate_resources,
            origin_resources: self.origin_resources.iter().map(Link::new).collect(),
            delivery_retry_policy: self.delivery_retry_policy.clone(),
        }
    }
}

/// `EventDestination` request body: what a client posts and what the
/// plugin receives as `PostBody`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventDestination {
    pub name: String,
    pub destination: String,
    pub event_types: Vec<String>,
    pub message_ids: Vec<String>,
    pub resource_types: Vec<String>,
    pub context: String,
    pub event_format_type: String,
    pub protocol: String,
    pub subscription_type: String,
    pub subordinate_resources: bool,
    pub origin_resources: Vec<Link>,
    pub delivery_retry_policy: String,
}

impl EventDestination {
    pub fn origin_uris(&self) -> Vec<String> {
        self.origin_resources.iter().map(|l| l.oid.clone()).collect()
    }
}

/// One southbound registration per device (or per collection marker).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceSubscription {
    #[serde(rename = "EventHostIP")]
    pub event_host_ip: String,
    /// Southbound subscription URL; empty for collection markers.
    pub location: String,
    pub origin_resources: Vec<String>,
}

impl DeviceSubscription {
    /// Union `origins` into this record, keeping first-seen order.
    pub fn merge_origins<I, S>(&mut self, origins: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for origin in origins {
            let origin = origin.into();
            if !self.origin_resources.contains(&origin) {
                self.origin_resources.push(origin);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn subscription_uses_store_field_names() {
        let sub: Subscription = serde_json::from_value(serde_json::json!({
            "SubscriptionID": "abc",
            "Destination": "https://listener/events",
            "EventTypes": ["Alert"],
            "MessageIds": [],
            "Hosts": ["10.0.0.1"],
            "OriginResources": ["/redfish/v1/Systems/uuid:1"]
        }))
        .unwrap();
        assert_eq!(sub.id, "abc");
        assert!(sub.has_host("10.0.0.1"));
        assert!(sub.is_deliverable());
        assert!(!sub.subordinate_resources);
    }

    #[test]
    fn to_destination_wraps_origins_in_links() {
        let sub = Subscription {
            origin_resources: vec!["/redfish/v1/Systems/uuid:1".into()],
            ..Subscription::default()
        };
        let body = serde_json::to_value(sub.to_destination()).unwrap();
        assert_eq!(
            body["OriginResources"],
            serde_json::json!([{ "@odata.id": "/redfish/v1/Systems/uuid:1" }])
        );
    }

    #[test]
    fn merge_origins_skips_known_entries() {
        let mut ds = DeviceSubscription {
            origin_resources: vec!["a".into(), "b".into()],
            ..DeviceSubscription::default()
        };
        ds.merge_origins(["b", "c"]);
        assert_eq!(ds.origin_resources, vec!["a", "b", "c"]);
    }
}
