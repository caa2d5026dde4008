// ── Subscription reads ──

use serde::Serialize;
use tracing::warn;

use super::{EVENT_DESTINATION_TYPE, SUBSCRIPTIONS_URI, SubscriptionReconciler};
use crate::error::CoreError;
use crate::model::Subscription;
use crate::model::subscription::Link;
use crate::response::ApiResponse;
use crate::store::SubscriptionQuery;

const COLLECTION_TYPE: &str = "#EventDestinationCollection.EventDestinationCollection";

/// Client view of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionView {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "@odata.context")]
    pub odata_context: &'static str,
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub context: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subscription_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub message_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub origin_resources: Vec<Link>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delivery_retry_policy: String,
}

impl From<&Subscription> for SubscriptionView {
    fn from(sub: &Subscription) -> Self {
        Self {
            odata_type: EVENT_DESTINATION_TYPE,
            odata_context: "/redfish/v1/$metadata#EventDestination.EventDestination",
            odata_id: format!("{SUBSCRIPTIONS_URI}/{}", sub.id),
            id: sub.id.clone(),
            name: sub.name.clone(),
            destination: sub.destination.clone(),
            context: sub.context.clone(),
            protocol: sub.protocol.clone(),
            event_types: sub.event_types.clone(),
            subscription_type: sub.subscription_type.clone(),
            message_ids: sub.message_ids.clone(),
            resource_types: sub.resource_types.clone(),
            origin_resources: sub.origin_resources.iter().map(Link::new).collect(),
            delivery_retry_policy: sub.delivery_retry_policy.clone(),
        }
    }
}

/// `EventDestinationCollection` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionCollection {
    #[serde(rename = "@odata.context")]
    pub odata_context: &'static str,
    #[serde(rename = "@odata.id")]
    pub odata_id: &'static str,
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "Name")]
    pub name: &'static str,
    #[serde(rename = "Description")]
    pub description: &'static str,
    #[serde(rename = "Members@odata.count")]
    pub members_count: usize,
    #[serde(rename = "Members")]
    pub members: Vec<Link>,
}

impl SubscriptionCollection {
    /// Lists only subscriptions that deliver somewhere.
    pub fn of(subscriptions: &[Subscription]) -> Self {
        let members: Vec<Link> = subscriptions
            .iter()
            .filter(|s| s.is_deliverable())
            .map(|s| Link::new(format!("{SUBSCRIPTIONS_URI}/{}/", s.id)))
            .collect();
        Self {
            odata_context: "/redfish/v1/$metadata#EventDestinationCollection.EventDestinationCollection",
            odata_id: SUBSCRIPTIONS_URI,
            odata_type: COLLECTION_TYPE,
            name: "EventSubscriptions",
            description: "Event Subscriptions",
            members_count: members.len(),
            members,
        }
    }
}

impl SubscriptionReconciler {
    pub async fn get_event_subscription(&self, id: &str) -> ApiResponse {
        let result = self
            .inner
            .store
            .read_subscriptions(&SubscriptionQuery::ById(id.to_owned()))
            .await
            .map_err(CoreError::from)
            .and_then(|subs| {
                subs.into_iter()
                    .next()
                    .ok_or_else(|| CoreError::not_found("EventSubscription", id))
            });
        match result {
            Ok(sub) => match serde_json::to_value(SubscriptionView::from(&sub)) {
                Ok(body) => ApiResponse::ok(body),
                Err(e) => ApiResponse::from(&CoreError::Internal(e.to_string())),
            },
            Err(e) => {
                warn!(id, error = %e, "event subscription lookup failed");
                ApiResponse::from(&e)
            }
        }
    }

    pub async fn get_event_subscriptions_collection(&self) -> ApiResponse {
        let subs = match self
            .inner
            .store
            .read_subscriptions(&SubscriptionQuery::All)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                warn!(error = %e, "failed to list event subscriptions");
                return ApiResponse::from(&CoreError::Unavailable {
                    message: e.to_string(),
                });
            }
        };
        match serde_json::to_value(SubscriptionCollection::of(&subs)) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::from(&CoreError::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sub(id: &str, destination: &str) -> Subscription {
        Subscription {
            id: id.into(),
            name: "mine".into(),
            destination: destination.into(),
            event_types: vec!["Alert".into()],
            origin_resources: vec!["/redfish/v1/Systems/u:1".into()],
            ..Subscription::default()
        }
    }

    #[test]
    fn view_uses_redfish_property_names() {
        let body = serde_json::to_value(SubscriptionView::from(&sub("abc", "https://l/ev"))).unwrap();
        assert_eq!(body["@odata.id"], "/redfish/v1/EventService/Subscriptions/abc");
        assert_eq!(body["Destination"], "https://l/ev");
        assert_eq!(body["OriginResources"][0]["@odata.id"], "/redfish/v1/Systems/u:1");
        assert!(body.get("MessageIds").is_none());
    }

    #[test]
    fn collection_skips_default_subscriptions() {
        let list = SubscriptionCollection::of(&[sub("0", ""), sub("abc", "https://l/ev")]);
        assert_eq!(list.members_count, 1);
        assert_eq!(
            list.members,
            vec![Link::new("/redfish/v1/EventService/Subscriptions/abc/")]
        );
    }
}
