// ── Subscription deletion ──
//
// Deleting a subscription re-registers every origin it backed with the
// merged filters of the subscriptions that remain on that origin. When
// nothing remains, the southbound registration is simply removed.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::merge::EventFilters;
use super::southbound::resolve_address;
use super::{EVENT_DESTINATION_TYPE, SUBSCRIPTIONS_URI, SubscriptionReconciler};
use crate::error::CoreError;
use crate::model::collection::{CollectionKind, fabric_id, is_aggregate_uri};
use crate::model::subscription::Link;
use crate::model::{EventDestination, Subscription};
use crate::response::{ApiResponse, ExtendedInfo, StatusMessage};
use crate::store::SubscriptionQuery;
use crate::task::TaskState;

impl SubscriptionReconciler {
    /// Delete the subscription `id` and re-register what it shared.
    pub async fn delete_subscription(&self, task_id: &str, id: &str) -> ApiResponse {
        let response = match self.try_delete_subscription(id).await {
            Ok(()) => {
                info!(id, "event subscription deleted");
                ApiResponse {
                    status: 200,
                    status_message: StatusMessage::ResourceRemoved,
                    location: None,
                    body: removed_body(id),
                }
            }
            Err(e) => {
                warn!(id, error = %e, "event subscription delete failed");
                ApiResponse::from(&e)
            }
        };
        let state = if response.is_success() {
            TaskState::Completed
        } else {
            TaskState::Exception
        };
        self.finish(task_id, state, &response).await;
        response
    }

    async fn try_delete_subscription(&self, id: &str) -> Result<(), CoreError> {
        let subscription = self
            .inner
            .store
            .read_subscriptions(&SubscriptionQuery::ById(id.to_owned()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found("SubscriptionID", id))?;

        for origin in subscription.origin_resources.iter().filter(|o| !o.is_empty()) {
            let others = self.co_subscribers(origin, &subscription.id).await?;
            let delete_flag = others.is_empty();
            let post = resubscribe_body(&others);
            debug!(origin, remaining = others.len(), "re-registering origin");
            self.resubscribe(&post, origin, delete_flag, &subscription)
                .await?;
        }
        self.remove_subscription(&subscription.id).await
    }

    /// Subscriptions other than `exclude_id` still targeting `origin`.
    ///
    /// Fabric origins are also backed by whole-`Fabrics` subscriptions.
    async fn co_subscribers(&self, origin: &str, exclude_id: &str) -> Result<Vec<Subscription>, CoreError> {
        let store = &self.inner.store;
        let mut others = store
            .read_subscriptions(&SubscriptionQuery::ByOriginResource(origin.to_owned()))
            .await?;
        let fabrics = CollectionKind::Fabrics.origin();
        if origin.contains("Fabrics") && origin != fabrics {
            for sub in store
                .read_subscriptions(&SubscriptionQuery::ByOriginResource(fabrics.to_owned()))
                .await?
            {
                if !others.iter().any(|s| s.id == sub.id) {
                    others.push(sub);
                }
            }
        }
        others.retain(|s| s.id != exclude_id);
        Ok(others)
    }

    async fn resubscribe(
        &self,
        post: &EventDestination,
        origin: &str,
        delete_flag: bool,
        deleted: &Subscription,
    ) -> Result<(), CoreError> {
        if origin.contains("Fabrics") {
            return self.resubscribe_fabrics(post, origin, delete_flag).await;
        }
        if is_aggregate_uri(origin) {
            for member in self.expand(origin).await.members {
                self.resubscribe_device(post, &member, delete_flag, deleted)
                    .await?;
            }
            return Ok(());
        }
        if CollectionKind::from_origin(origin).is_some() {
            // Collection markers have no southbound registration.
            return Ok(());
        }
        self.resubscribe_device(post, origin, delete_flag, deleted)
            .await
    }

    async fn resubscribe_device(
        &self,
        post: &EventDestination,
        origin: &str,
        delete_flag: bool,
        deleted: &Subscription,
    ) -> Result<(), CoreError> {
        let target = self.target_for(origin).await?;
        let plugin = self.plugin(&target.plugin_id).await?;
        let host = resolve_address(&target.manager_address).await?;
        self.delete_device_registration(&host, &target, &plugin)
            .await?;

        if delete_flag {
            let store = &self.inner.store;
            let still_used = store
                .read_subscriptions(&SubscriptionQuery::ByHost(host.clone()))
                .await?
                .iter()
                .any(|s| s.id != deleted.id);
            if !still_used {
                store.delete_device_subscription(&host).await?;
            }
            return Ok(());
        }
        self.subscribe_device(origin, &host, &target, &plugin, post)
            .await
            .map(|_| ())
    }

    async fn resubscribe_fabrics(
        &self,
        post: &EventDestination,
        origin: &str,
        delete_flag: bool,
    ) -> Result<(), CoreError> {
        let fabrics = if CollectionKind::from_origin(origin) == Some(CollectionKind::Fabrics) {
            self.expand(origin).await.members
        } else {
            vec![origin.to_owned()]
        };

        for fabric_origin in fabrics {
            let Some(id) = fabric_id(&fabric_origin) else {
                continue;
            };
            let fabric = self
                .inner
                .store
                .read_fabric(id)
                .await?
                .ok_or_else(|| CoreError::not_found("Fabrics", id))?;
            let plugin = self.plugin(&fabric.plugin_id).await?;
            match self.delete_fabric_registration(&plugin).await {
                Ok(()) => {}
                Err(CoreError::NotFound { .. }) => {
                    debug!(fabric = id, "no fabric registration to replace");
                    continue;
                }
                Err(e) => return Err(e),
            }
            if delete_flag {
                continue;
            }
            let host = resolve_address(&plugin.ip).await?;
            let mut post = post.clone();
            post.origin_resources = vec![Link::new(fabric_origin.as_str())];
            self.register_fabric(&fabric_origin, &host, &plugin, &post)
                .await?;
        }
        Ok(())
    }

    // ── Server removal ───────────────────────────────────────────

    /// Drop every trace of the device `device_uuid` from subscriptions.
    pub async fn delete_subscriptions_by_origin(&self, task_id: &str, device_uuid: &str) -> ApiResponse {
        let response = match self.try_delete_by_origin(device_uuid).await {
            Ok(()) => ApiResponse {
                status: 204,
                status_message: StatusMessage::ResourceRemoved,
                location: None,
                body: Value::Null,
            },
            Err(e) => {
                warn!(device = device_uuid, error = %e, "device subscription cleanup failed");
                ApiResponse::from(&e)
            }
        };
        let state = if response.is_success() {
            TaskState::Completed
        } else {
            TaskState::Exception
        };
        self.finish(task_id, state, &response).await;
        response
    }

    async fn try_delete_by_origin(&self, device_uuid: &str) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let target = store.read_target(device_uuid).await?.ok_or_else(|| {
            CoreError::validation(
                StatusMessage::ResourceNotFound,
                ["uuid", device_uuid],
                format!("no managed device {device_uuid}"),
            )
        })?;
        let host = resolve_address(&target.manager_address).await?;
        let subscriptions = store
            .read_subscriptions(&SubscriptionQuery::ByHost(host.clone()))
            .await?;
        let plugin = self.plugin(&target.plugin_id).await?;
        self.delete_device_registration(&host, &target, &plugin)
            .await?;

        let ds = store
            .read_device_subscription(&host)
            .await?
            .ok_or_else(|| CoreError::not_found("Host", target.manager_address.as_str()))?;
        let origin = ds.origin_resources.first().cloned().unwrap_or_default();

        for mut sub in subscriptions {
            if sub.hosts.len() == 1 {
                self.remove_subscription(&sub.id).await?;
                continue;
            }
            sub.hosts
                .retain(|h| *h != host && *h != target.manager_address);
            sub.origin_resources.retain(|o| *o != origin);
            self.replace_subscription(&sub).await?;
        }

        if let Err(e) = store.delete_device_subscription(&host).await {
            warn!(host, error = %e, "failed to delete device subscription");
        }
        info!(device = device_uuid, host, "device removed from event subscriptions");
        Ok(())
    }
}

/// Destination re-registered for the subscriptions left on an origin.
///
/// Filters are folded from nothing; descriptive fields come from the last
/// remaining subscription.
fn resubscribe_body(others: &[Subscription]) -> EventDestination {
    let mut post = others
        .last()
        .map(Subscription::to_destination)
        .unwrap_or_default();
    post.origin_resources = Vec::new();
    EventFilters::default().merge(others).apply_to(&mut post);
    post
}

fn removed_body(id: &str) -> Value {
    let info = ExtendedInfo::new(StatusMessage::ResourceRemoved, Vec::new(), "");
    json!({
        "@odata.type": EVENT_DESTINATION_TYPE,
        "@odata.id": format!("{SUBSCRIPTIONS_URI}/{id}"),
        "Id": id,
        "Name": "Event Subscription",
        "MessageId": info.message_id,
        "Message": info.message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sub(destination: &str, event_types: &[&str]) -> Subscription {
        Subscription {
            destination: destination.into(),
            context: format!("ctx {destination}"),
            protocol: "Redfish".into(),
            event_types: event_types.iter().map(|s| (*s).to_owned()).collect(),
            origin_resources: vec!["/redfish/v1/Systems/u:1".into()],
            ..Subscription::default()
        }
    }

    #[test]
    fn resubscribe_body_unions_remaining_filters() {
        let post = resubscribe_body(&[
            sub("https://a/ev", &["Alert"]),
            sub("https://b/ev", &["StatusChange"]),
        ]);
        assert_eq!(post.event_types, vec!["Alert", "StatusChange"]);
        assert_eq!(post.destination, "https://b/ev");
        assert_eq!(post.context, "ctx https://b/ev");
        assert!(post.origin_resources.is_empty());
    }

    #[test]
    fn resubscribe_body_of_nothing_is_empty() {
        let post = resubscribe_body(&[]);
        assert!(post.destination.is_empty());
        assert!(post.event_types.is_empty());
    }

    #[test]
    fn removed_body_names_the_subscription() {
        let body = removed_body("abc");
        assert_eq!(body["@odata.id"], "/redfish/v1/EventService/Subscriptions/abc");
        assert_eq!(body["MessageId"], "Base.1.13.0.ResourceRemoved");
    }
}
