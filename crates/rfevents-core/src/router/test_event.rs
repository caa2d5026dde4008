// ── Test event submission ──
//
// `SubmitTestEvent` lets a client push a synthetic event through its own
// subscriptions. Each optional property is type-checked individually so
// the error names the offending field.

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::EventRouter;
use super::filter::filter_matches;
use crate::error::CoreError;
use crate::model::{Event, MessageData};
use crate::reconciler::validate::EVENT_TYPES;
use crate::response::{ApiResponse, StatusMessage};
use crate::store::SubscriptionQuery;

pub const SEVERITIES: [&str; 3] = ["Critical", "OK", "Warning"];

const PROPERTIES: [&str; 11] = [
    "MemberId",
    "EventType",
    "EventGroupId",
    "EventId",
    "Severity",
    "EventTimestamp",
    "Message",
    "MessageArgs",
    "MessageId",
    "Oem",
    "OriginOfCondition",
];

/// Build an [`Event`] from a test-event request body.
pub fn parse_test_event(body: &[u8]) -> Result<Event, CoreError> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| CoreError::MalformedJson {
        message: e.to_string(),
    })?;
    let Value::Object(fields) = raw else {
        return Err(CoreError::MalformedJson {
            message: "test event must be a JSON object".into(),
        });
    };

    let mut event = Event {
        message_id: match fields.get("MessageId") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => return Err(type_error(other, "MessageId")),
            None => {
                return Err(CoreError::validation(
                    StatusMessage::PropertyMissing,
                    ["MessageId"],
                    "MessageId is a required parameter",
                ));
            }
        },
        ..Event::default()
    };

    if let Some(value) = fields.get("EventGroupId") {
        event.event_group_id = Some(value.as_i64().ok_or_else(|| type_error(value, "EventGroupId"))?);
    }
    if let Some(id) = optional_string(&fields, "EventId")? {
        event.event_id = id;
    }
    if let Some(ts) = optional_string(&fields, "EventTimestamp")? {
        event.event_timestamp = ts;
    }
    if let Some(event_type) = optional_string(&fields, "EventType")? {
        if !EVENT_TYPES.contains(&event_type.as_str()) {
            return Err(not_in_list(&event_type, "EventType"));
        }
        event.event_type = event_type;
    }
    if let Some(message) = optional_string(&fields, "Message")? {
        event.message = message;
    }
    if let Some(value) = fields.get("MessageArgs") {
        event.message_args = value
            .as_array()
            .and_then(|args| {
                args.iter()
                    .map(|a| a.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| type_error(value, "MessageArgs"))?;
    }
    if let Some(origin) = optional_string(&fields, "OriginOfCondition")? {
        event.origin_of_condition = origin;
    }
    if let Some(severity) = optional_string(&fields, "Severity")? {
        if !SEVERITIES.contains(&severity.as_str()) {
            return Err(not_in_list(&severity, "Severity"));
        }
        event.severity = severity;
    }

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
    Ok(event)
}

fn optional_string(fields: &Map<String, Value>, name: &str) -> Result<Option<String>, CoreError> {
    match fields.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(other, name)),
    }
}

fn type_error(value: &Value, property: &str) -> CoreError {
    CoreError::validation(
        StatusMessage::PropertyValueTypeError,
        [value.to_string(), property.to_owned()],
        format!("{property} has the wrong type"),
    )
}

fn not_in_list(value: &str, property: &str) -> CoreError {
    CoreError::validation(
        StatusMessage::PropertyValueNotInList,
        [value, property],
        format!("{property} must have an allowed value"),
    )
}

impl EventRouter {
    /// Deliver a synthetic event to the matching subscriptions of `user`.
    pub async fn submit_test_event(&self, user: &str, body: &[u8]) -> ApiResponse {
        let event = match parse_test_event(body) {
            Ok(event) => event,
            Err(e) => return ApiResponse::from(&e),
        };
        let subscriptions = match self
            .inner
            .reconciler
            .store()
            .read_subscriptions(&SubscriptionQuery::ByUser(user.to_owned()))
            .await
        {
            Ok(subs) => subs,
            Err(e) => return ApiResponse::from(&CoreError::from(e)),
        };

        let envelope = MessageData {
            events: vec![event],
            ..MessageData::default()
        };
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(e) => return ApiResponse::from(&CoreError::Internal(e.to_string())),
        };

        let mut sent = 0usize;
        for sub in subscriptions.iter().filter(|s| s.is_deliverable()) {
            let matched = envelope.events.iter().any(|event| {
                sub.origin_resources
                    .iter()
                    .any(|origin| filter_matches(sub, event, std::slice::from_ref(origin)))
            });
            if matched {
                debug!(destination = %sub.destination, "sending test event");
                self.spawn_delivery(sub.destination.clone(), payload.clone());
                sent += 1;
            }
        }
        info!(user, destinations = sent, "test event submitted");

        ApiResponse::ok(json!({
            "code": StatusMessage::Success.message_id(),
            "message": "Request completed successfully.",
        }))
    }
}
