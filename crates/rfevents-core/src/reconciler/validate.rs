// ── Subscription request validation ──
//
// Parses and normalises a client `EventDestination` body. Checks run in a
// fixed order and the first failure wins.

use serde_json::Value;
use url::Url;

use crate::error::CoreError;
use crate::model::{EventDestination, resource_type};
use crate::response::StatusMessage;

pub const DEFAULT_CONTEXT: &str = "Default";
pub const DEFAULT_EVENT_FORMAT_TYPE: &str = "Event";
pub const DEFAULT_DELIVERY_RETRY_POLICY: &str = "RetryForever";
pub const SUBSCRIPTION_TYPE: &str = "RedfishEvent";
pub const PROTOCOL: &str = "Redfish";

pub const EVENT_TYPES: [&str; 7] = [
    "Alert",
    "MetricReport",
    "ResourceAdded",
    "ResourceRemoved",
    "ResourceUpdated",
    "StatusChange",
    "Other",
];

const EVENT_FORMAT_TYPES: [&str; 2] = ["Event", "MetricReport"];

const PROPERTIES: [&str; 12] = [
    "Name",
    "Destination",
    "EventTypes",
    "MessageIds",
    "ResourceTypes",
    "Context",
    "EventFormatType",
    "Protocol",
    "SubscriptionType",
    "SubordinateResources",
    "OriginResources",
    "DeliveryRetryPolicy",
];

/// Parse `body` into a normalised request, or the first validation failure.
pub fn parse_request(body: &[u8]) -> Result<EventDestination, CoreError> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| CoreError::MalformedJson {
        message: e.to_string(),
    })?;
    let Value::Object(ref fields) = raw else {
        return Err(CoreError::MalformedJson {
            message: "request body must be a JSON object".into(),
        });
    };

    let unknown: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|key| !PROPERTIES.contains(key))
        .collect();
    if !unknown.is_empty() {
        return Err(CoreError::validation(
            StatusMessage::PropertyUnknown,
            [unknown.join(", ")],
            "one or more properties given in the request body are not valid, ensure properties are listed in upper camel case",
        ));
    }

    let mut request: EventDestination =
        serde_json::from_value(raw).map_err(|e| CoreError::MalformedJson {
            message: e.to_string(),
        })?;
    validate_fields(&mut request)?;
    Ok(request)
}

/// Apply defaults and check enumerated values in place.
pub fn validate_fields(request: &mut EventDestination) -> Result<(), CoreError> {
    if request.destination.is_empty() {
        return Err(CoreError::validation(
            StatusMessage::PropertyMissing,
            ["Destination"],
            "Destination field is missing",
        ));
    }

    if request.event_format_type.is_empty() {
        request.event_format_type = DEFAULT_EVENT_FORMAT_TYPE.into();
    }
    if !EVENT_FORMAT_TYPES.contains(&request.event_format_type.as_str()) {
        return Err(not_in_list(&request.event_format_type, "EventFormatType"));
    }

    let metric_report = request.event_format_type == "MetricReport";
    if metric_report && request.event_types.is_empty() {
        request.event_types = vec!["MetricReport".into()];
    }
    if let Some(bad) = request
        .event_types
        .iter()
        .find(|t| !EVENT_TYPES.contains(&t.as_str()))
    {
        return Err(not_in_list(bad, "EventTypes"));
    }
    if metric_report {
        if request.event_types.len() > 1 {
            return Err(CoreError::validation(
                StatusMessage::PropertyValueFormatError,
                [request.event_format_type.as_str(), "EventTypes"],
                "MetricReport subscriptions accept only the MetricReport event type",
            ));
        }
        let first = request.event_types.first().map_or("", String::as_str);
        if first != "MetricReport" {
            return Err(not_in_list(first, "EventType"));
        }
    }

    if request.subscription_type.is_empty() {
        return Err(CoreError::validation(
            StatusMessage::PropertyMissing,
            ["SubscriptionType"],
            "SubscriptionType field is missing",
        ));
    }
    if request.subscription_type != SUBSCRIPTION_TYPE {
        return Err(not_in_list(&request.subscription_type, "SubscriptionType"));
    }

    if request.context.is_empty() {
        request.context = DEFAULT_CONTEXT.into();
    }

    if request.delivery_retry_policy.is_empty() {
        request.delivery_retry_policy = DEFAULT_DELIVERY_RETRY_POLICY.into();
    } else if request.delivery_retry_policy != DEFAULT_DELIVERY_RETRY_POLICY {
        return Err(not_in_list(
            &request.delivery_retry_policy,
            "DeliveryRetryPolicy",
        ));
    }

    if request.protocol != PROTOCOL {
        return Err(not_in_list(&request.protocol, "Protocol"));
    }

    if let Some(bad) = request
        .resource_types
        .iter()
        .find(|t| !resource_type::is_known(t))
    {
        return Err(not_in_list(bad, "ResourceType"));
    }

    if !is_valid_destination(&request.destination) {
        return Err(CoreError::validation(
            StatusMessage::PropertyValueFormatError,
            [request.destination.as_str(), "Destination"],
            format!(
                "request body contains invalid value for Destination field, {}",
                request.destination
            ),
        ));
    }
    Ok(())
}

/// `https://host[:port]/path` with a non-empty host.
pub fn is_valid_destination(destination: &str) -> bool {
    Url::parse(destination)
        .is_ok_and(|url| url.scheme() == "https" && url.host_str().is_some_and(|h| !h.is_empty()))
}

fn not_in_list(value: &str, property: &str) -> CoreError {
    CoreError::validation(
        StatusMessage::PropertyValueNotInList,
        [value, property],
        format!("{property} {value} is not supported"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "Destination": "https://listener.example:8443/events",
            "Protocol": "Redfish",
            "SubscriptionType": "RedfishEvent",
            "EventTypes": ["Alert"],
            "OriginResources": [{ "@odata.id": "/redfish/v1/Systems/uuid:1" }]
        })
    }

    fn kind(err: &CoreError) -> StatusMessage {
        err.status_message()
    }

    #[test]
    fn applies_defaults() {
        let request = parse_request(&body(&valid())).unwrap();
        assert_eq!(request.context, "Default");
        assert_eq!(request.event_format_type, "Event");
        assert_eq!(request.delivery_retry_policy, "RetryForever");
        assert_eq!(request.origin_uris(), vec!["/redfish/v1/Systems/uuid:1"]);
    }

    #[test]
    fn malformed_json_is_rejected_before_anything_else() {
        let err = parse_request(b"{\"Destination\": ").unwrap_err();
        assert_eq!(kind(&err), StatusMessage::MalformedJson);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn wrong_case_property_is_unknown() {
        let mut v = valid();
        v["destination"] = json!("https://other/events");
        let err = parse_request(&body(&v)).unwrap_err();
        assert_eq!(kind(&err), StatusMessage::PropertyUnknown);
        let CoreError::Validation { args, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(args, vec!["destination".to_owned()]);
    }

    #[test]
    fn destination_is_required_and_must_be_https() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("Destination");
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyMissing
        );

        v["Destination"] = json!("http://listener/events");
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyValueFormatError
        );

        v["Destination"] = json!("not a uri");
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyValueFormatError
        );
    }

    #[test]
    fn enumerated_values_are_checked() {
        for (field, value) in [
            ("EventTypes", json!(["Bogus"])),
            ("EventFormatType", json!("Csv")),
            ("Protocol", json!("SNMP")),
            ("SubscriptionType", json!("Syslog")),
            ("DeliveryRetryPolicy", json!("SuspendRetries")),
            ("ResourceTypes", json!(["Toaster"])),
        ] {
            let mut v = valid();
            v[field] = value;
            let err = parse_request(&body(&v)).unwrap_err();
            assert_eq!(kind(&err), StatusMessage::PropertyValueNotInList, "{field}");
        }
    }

    #[test]
    fn metric_report_defaults_and_restricts_event_types() {
        let mut v = valid();
        v["EventFormatType"] = json!("MetricReport");
        v.as_object_mut().unwrap().remove("EventTypes");
        let request = parse_request(&body(&v)).unwrap();
        assert_eq!(request.event_types, vec!["MetricReport".to_owned()]);

        v["EventTypes"] = json!(["MetricReport", "Alert"]);
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyValueFormatError
        );

        v["EventTypes"] = json!(["Alert"]);
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyValueNotInList
        );
    }

    #[test]
    fn missing_subscription_type_is_reported() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("SubscriptionType");
        assert_eq!(
            kind(&parse_request(&body(&v)).unwrap_err()),
            StatusMessage::PropertyMissing
        );
    }
}
