// ── Store string encodings ──
//
// Device subscription rows are stored as `host||location||[o1 o2]`;
// list fields are space separated inside brackets. The list form only
// round-trips elements that are non-empty and free of spaces and brackets,
// which holds for resource URIs and filter names.

use crate::error::StoreError;
use crate::model::DeviceSubscription;

const FIELD_SEPARATOR: &str = "||";

/// `["a", "b"]` -> `"[a b]"`.
pub fn slice_to_string<S: AsRef<str>>(items: &[S]) -> String {
    let joined: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    format!("[{}]", joined.join(" "))
}

/// Inverse of [`slice_to_string`]; `"[]"` and `""` both decode to an empty list.
///
/// A list holding `""` or an element with a space does not survive the trip.
pub fn slice_from_string(value: &str) -> Vec<String> {
    let inner = value.replace(['[', ']'], "");
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(' ').map(String::from).collect()
}

pub fn encode_device_subscription(ds: &DeviceSubscription) -> String {
    format!(
        "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
        ds.event_host_ip,
        ds.location,
        slice_to_string(&ds.origin_resources)
    )
}

pub fn decode_device_subscription(row: &str) -> Result<DeviceSubscription, StoreError> {
    let mut parts = row.splitn(3, FIELD_SEPARATOR);
    let (Some(host), Some(location), Some(origins)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StoreError::Corrupt {
            table: "DeviceSubscription",
            key: row.to_owned(),
            reason: "expected host||location||origins".into(),
        });
    };
    Ok(DeviceSubscription {
        event_host_ip: host.to_owned(),
        location: location.to_owned(),
        origin_resources: slice_from_string(origins),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn slice_encoding_round_trips(items in prop::collection::vec("[^ \\[\\]]{1,24}", 0..8)) {
            prop_assert_eq!(slice_from_string(&slice_to_string(&items)), items);
        }
    }

    #[test]
    fn slice_encoding_matches_store_format() {
        assert_eq!(slice_to_string(&["Alert", "StatusChange"]), "[Alert StatusChange]");
        assert_eq!(slice_to_string::<&str>(&[]), "[]");
        assert_eq!(slice_from_string("[Alert StatusChange]"), vec!["Alert", "StatusChange"]);
        assert!(slice_from_string("[]").is_empty());
        assert!(slice_from_string("").is_empty());
    }

    #[test]
    fn uri_lists_survive_encoding() {
        let origins = vec![
            "/redfish/v1/Systems/a:1".to_owned(),
            "/redfish/v1/Chassis/a:1".to_owned(),
        ];
        assert_eq!(slice_from_string(&slice_to_string(&origins)), origins);
    }

    #[test]
    fn device_row_keeps_location_with_scheme() {
        let ds = DeviceSubscription {
            event_host_ip: "10.0.0.7".into(),
            location: "https://10.0.0.7/redfish/v1/EventService/Subscriptions/3".into(),
            origin_resources: vec!["/redfish/v1/Systems/a:1".into()],
        };
        let row = encode_device_subscription(&ds);
        assert_eq!(
            row,
            "10.0.0.7||https://10.0.0.7/redfish/v1/EventService/Subscriptions/3||[/redfish/v1/Systems/a:1]"
        );
        assert_eq!(decode_device_subscription(&row).unwrap(), ds);
    }

    #[test]
    fn collection_marker_has_empty_location() {
        let ds = decode_device_subscription("SystemsCollection||||[/redfish/v1/Systems]").unwrap();
        assert_eq!(ds.event_host_ip, "SystemsCollection");
        assert_eq!(ds.location, "");
        assert_eq!(ds.origin_resources, vec!["/redfish/v1/Systems"]);
    }

    #[test]
    fn short_row_is_corrupt() {
        assert!(matches!(
            decode_device_subscription("10.0.0.7||loc"),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
