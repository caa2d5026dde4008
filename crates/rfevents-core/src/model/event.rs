// ── Inbound event envelope ──
//
// Plugins send `OriginOfCondition` either as a bare URI string or as a
// `{"@odata.id": ...}` link; both decode to the URI. Outbound events
// always carry the link form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::subscription::Link;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(rename = "@odata.type", default)]
    pub odata_type: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "@odata.context", default, skip_serializing_if = "String::is_empty")]
    pub context: String,
    #[serde(rename = "Events", default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(rename = "MemberId", default, skip_serializing_if = "String::is_empty")]
    pub member_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(rename = "EventGroupId", default, skip_serializing_if = "Option::is_none")]
    pub event_group_id: Option<i64>,
    #[serde(rename = "EventId", default)]
    pub event_id: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub event_timestamp: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_args: Vec<String>,
    #[serde(rename = "MessageId", default)]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oem: Option<Value>,
    #[serde(
        default,
        deserialize_with = "deserialize_origin",
        serialize_with = "serialize_origin",
        skip_serializing_if = "String::is_empty"
    )]
    pub origin_of_condition: String,
}

impl Event {
    /// `OriginOfCondition` split on `/` with any trailing slash removed.
    pub fn origin_segments(&self) -> Vec<&str> {
        self.origin_of_condition
            .trim_end_matches('/')
            .split('/')
            .collect()
    }
}

fn deserialize_origin<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(uri)) => uri,
        Some(Value::Object(map)) => map
            .get("@odata.id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_default(),
        _ => String::new(),
    })
}

fn serialize_origin<S: Serializer>(origin: &str, serializer: S) -> Result<S::Ok, S::Error> {
    Link::new(origin).serialize(serializer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn origin_accepts_string_and_link() {
        let data: MessageData = serde_json::from_value(json!({
            "Events": [
                { "EventType": "Alert", "OriginOfCondition": "/redfish/v1/Systems/1" },
                { "EventType": "Alert", "OriginOfCondition": { "@odata.id": "/redfish/v1/Chassis/1" } },
                { "EventType": "Alert" }
            ]
        }))
        .unwrap();
        let origins: Vec<_> = data.events.iter().map(|e| e.origin_of_condition.as_str()).collect();
        assert_eq!(origins, vec!["/redfish/v1/Systems/1", "/redfish/v1/Chassis/1", ""]);
    }

    #[test]
    fn outbound_origin_is_a_link() {
        let event = Event {
            event_type: "Alert".into(),
            origin_of_condition: "/redfish/v1/Systems/1".into(),
            ..Event::default()
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["OriginOfCondition"], json!({ "@odata.id": "/redfish/v1/Systems/1" }));
        assert!(value.get("MemberId").is_none());
    }

    #[test]
    fn origin_segments_ignore_trailing_slash() {
        let event = Event {
            origin_of_condition: "/redfish/v1/Systems/1/".into(),
            ..Event::default()
        };
        assert_eq!(event.origin_segments(), vec!["", "redfish", "v1", "Systems", "1"]);
    }
}
