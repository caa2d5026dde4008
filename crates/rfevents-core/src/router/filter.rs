// ── Subscription filter matching ──
//
// Decides whether one event goes to one subscription. Empty filter lists
// match everything; an event field left empty matches any filter.

use crate::model::{Event, Subscription, resource_type};

/// Whether `event` passes every filter of `sub`, given the origin
/// resources registered for the device that raised it.
pub fn filter_matches(sub: &Subscription, event: &Event, device_origins: &[String]) -> bool {
    if !listed(&sub.event_types, &event.event_type) {
        return false;
    }
    if !listed(&sub.message_ids, &event.message_id) {
        return false;
    }
    if !sub.resource_types.is_empty()
        && !resource_type_subscribed(
            &sub.resource_types,
            &event.origin_of_condition,
            sub.subordinate_resources,
        )
    {
        return false;
    }

    let condition = event.origin_of_condition.trim_end_matches('/');
    device_origins.iter().any(|origin| {
        if sub.subordinate_resources {
            condition.contains(origin.as_str())
        } else {
            origin == condition
        }
    })
}

fn listed(filter: &[String], value: &str) -> bool {
    filter.is_empty() || value.is_empty() || filter.iter().any(|f| f == value)
}

/// Resource-type filter check against the `OriginOfCondition` path.
///
/// Non-subordinate subscriptions test the parent segment only. Subordinate
/// ones also accept a match two levels further up, so
/// `/redfish/v1/Systems/{id}/Processors/1` matches both `Processor` and
/// `ComputerSystem`.
pub fn resource_type_subscribed(
    resource_types: &[String],
    origin_of_condition: &str,
    subordinate: bool,
) -> bool {
    if origin_of_condition.is_empty() {
        return true;
    }
    let segments: Vec<&str> = origin_of_condition
        .trim_end_matches('/')
        .split('/')
        .collect();
    let from_end = |n: usize| {
        segments
            .len()
            .checked_sub(n)
            .and_then(|i| segments.get(i))
            .copied()
    };
    let parent = from_end(2).unwrap_or_default();
    let grandparent = from_end(4);

    resource_types.iter().any(|rt| {
        let Some(segment) = resource_type::segment_for(rt) else {
            return false;
        };
        if subordinate {
            segment.contains(parent) || grandparent.is_some_and(|g| segment.contains(g))
        } else {
            parent.contains(segment)
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SYSTEM: &str = "/redfish/v1/Systems/6d4a:1";

    fn sub(event_types: &[&str], resource_types: &[&str], subordinate: bool) -> Subscription {
        Subscription {
            destination: "https://listener/events".into(),
            event_types: event_types.iter().map(|s| (*s).to_owned()).collect(),
            resource_types: resource_types.iter().map(|s| (*s).to_owned()).collect(),
            subordinate_resources: subordinate,
            ..Subscription::default()
        }
    }

    fn event(event_type: &str, origin: &str) -> Event {
        Event {
            event_type: event_type.into(),
            message_id: "Alert.1.0.LanDisconnect".into(),
            origin_of_condition: origin.into(),
            ..Event::default()
        }
    }

    #[test]
    fn empty_filters_match_the_exact_origin() {
        let origins = vec![SYSTEM.to_owned()];
        assert!(filter_matches(&sub(&[], &[], false), &event("Alert", SYSTEM), &origins));
        assert!(filter_matches(
            &sub(&[], &[], false),
            &event("Alert", "/redfish/v1/Systems/6d4a:1/"),
            &origins
        ));
        assert!(!filter_matches(
            &sub(&[], &[], false),
            &event("Alert", "/redfish/v1/Systems/6d4a:1/Processors/1"),
            &origins
        ));
    }

    #[test]
    fn subordinate_subscriptions_match_descendants() {
        let origins = vec![SYSTEM.to_owned()];
        assert!(filter_matches(
            &sub(&[], &[], true),
            &event("Alert", "/redfish/v1/Systems/6d4a:1/Processors/1"),
            &origins
        ));
        assert!(!filter_matches(
            &sub(&[], &[], true),
            &event("Alert", "/redfish/v1/Systems/other:1/Processors/1"),
            &origins
        ));
    }

    #[test]
    fn event_type_filter_is_a_membership_test() {
        let origins = vec![SYSTEM.to_owned()];
        let alerts = sub(&["Alert"], &[], false);
        assert!(filter_matches(&alerts, &event("Alert", SYSTEM), &origins));
        assert!(!filter_matches(&alerts, &event("StatusChange", SYSTEM), &origins));
        assert!(filter_matches(&alerts, &event("", SYSTEM), &origins));
    }

    #[test]
    fn message_id_filter_is_a_membership_test() {
        let origins = vec![SYSTEM.to_owned()];
        let mut filtered = sub(&[], &[], false);
        filtered.message_ids = vec!["Alert.1.0.ServerPoweredOn".into()];
        assert!(!filter_matches(&filtered, &event("Alert", SYSTEM), &origins));
    }

    #[test]
    fn resource_types_resolve_against_the_parent_segment() {
        let types = ["ComputerSystem".to_owned()];
        assert!(resource_type_subscribed(&types, SYSTEM, false));
        assert!(!resource_type_subscribed(
            &types,
            "/redfish/v1/Systems/6d4a:1/Processors/1",
            false
        ));
        assert!(resource_type_subscribed(
            &types,
            "/redfish/v1/Systems/6d4a:1/Processors/1",
            true
        ));
        assert!(resource_type_subscribed(
            &["Processor".to_owned()],
            "/redfish/v1/Systems/6d4a:1/Processors/1",
            false
        ));
        assert!(resource_type_subscribed(&types, "", false));
    }

    #[test]
    fn unknown_resource_types_never_match() {
        assert!(!resource_type_subscribed(&["Toaster".to_owned()], SYSTEM, false));
    }
}
