// ── Inbound payload rewriting ──
//
// Devices report their own local resource IDs. Before routing, system,
// chassis and manager paths are rewritten to the aggregated
// `{device-uuid}:{local-id}` form.

use crate::model::collection::{device_uuid, is_collection_host};

const REWRITTEN_PREFIXES: [&str; 4] = [
    "/redfish/v1/Systems/",
    "/redfish/v1/systems/",
    "/redfish/v1/Chassis/",
    "/redfish/v1/Managers/",
];

/// Rewrite local resource IDs in `payload` for the device whose first
/// registered origin is `origin_resource`.
///
/// Returns the rewritten payload and the device UUID (empty when the
/// origin carries none). Events raised by collection markers are left
/// untouched.
pub fn canonicalize_ids(payload: &str, origin_resource: &str, host: &str) -> (String, String) {
    let uuid = device_uuid(origin_resource).unwrap_or_default().to_owned();
    if is_collection_host(host) || uuid.is_empty() {
        return (payload.to_owned(), uuid);
    }
    let mut out = payload.to_owned();
    for prefix in REWRITTEN_PREFIXES {
        out = out.replace(prefix, &format!("{prefix}{uuid}:"));
    }
    (out, uuid)
}

/// `/a/b/c/d/e/` prefix of a volume URI naming its storage resource.
pub fn storage_uri(volume_uri: &str) -> Option<String> {
    let segments: Vec<&str> = volume_uri.split('/').collect();
    let head = segments.get(1..6)?;
    Some(format!("/{}/", head.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_gain_the_device_uuid() {
        let raw = r#"{"OriginOfCondition":"/redfish/v1/Systems/1","Chassis":"/redfish/v1/Chassis/1"}"#;
        let (out, uuid) = canonicalize_ids(raw, "/redfish/v1/Systems/6d4a:1", "10.0.0.1");
        assert_eq!(uuid, "6d4a");
        assert_eq!(
            out,
            r#"{"OriginOfCondition":"/redfish/v1/Systems/6d4a:1","Chassis":"/redfish/v1/Chassis/6d4a:1"}"#
        );
    }

    #[test]
    fn collection_events_are_untouched() {
        let raw = r#"{"OriginOfCondition":"/redfish/v1/Systems/1"}"#;
        let (out, _) = canonicalize_ids(raw, "/redfish/v1/Systems/6d4a:1", "SystemsCollection");
        assert_eq!(out, raw);
    }

    #[test]
    fn storage_uri_keeps_five_segments() {
        assert_eq!(
            storage_uri("/redfish/v1/Systems/6d4a:1/Storage/1/Volumes/2").as_deref(),
            Some("/redfish/v1/Systems/6d4a:1/Storage/")
        );
        assert_eq!(storage_uri("/redfish/v1"), None);
    }
}
