// ── Top-level collections ──
//
// Collection origins stand for "all current and future members". Each has
// a marker name used as the `DeviceSubscription` key and as a subscription
// host.

/// Origins subscribed when a request names none.
pub const DEFAULT_ORIGIN_RESOURCES: [&str; 5] = [
    "/redfish/v1/Systems",
    "/redfish/v1/Chassis",
    "/redfish/v1/Fabrics",
    "/redfish/v1/Managers",
    "/redfish/v1/TaskService/Tasks",
];

pub const SYSTEMS_PREFIX: &str = "/redfish/v1/Systems/";
pub const FABRICS_PREFIX: &str = "/redfish/v1/Fabrics/";
pub const AGGREGATES_PREFIX: &str = "/redfish/v1/AggregationService/Aggregates/";

/// Marker host for aggregate subscriptions; no `DeviceSubscription` is saved under it.
pub const AGGREGATE_COLLECTIONS: &str = "AggregateCollections";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CollectionKind {
    #[strum(to_string = "SystemsCollection")]
    Systems,
    #[strum(to_string = "ChassisCollection")]
    Chassis,
    #[strum(to_string = "ManagerCollection")]
    Managers,
    #[strum(to_string = "FabricsCollection")]
    Fabrics,
    #[strum(to_string = "TasksCollection")]
    Tasks,
}

impl CollectionKind {
    /// Classify an origin URI that names a whole collection.
    pub fn from_origin(origin: &str) -> Option<Self> {
        match origin.trim_end_matches('/') {
            "/redfish/v1/Systems" => Some(Self::Systems),
            "/redfish/v1/Chassis" => Some(Self::Chassis),
            "/redfish/v1/Managers" => Some(Self::Managers),
            "/redfish/v1/Fabrics" => Some(Self::Fabrics),
            "/redfish/v1/TaskService/Tasks" => Some(Self::Tasks),
            _ => None,
        }
    }

    /// Parse a marker name such as `SystemsCollection`.
    pub fn from_marker(name: &str) -> Option<Self> {
        match name {
            "SystemsCollection" => Some(Self::Systems),
            "ChassisCollection" => Some(Self::Chassis),
            "ManagerCollection" => Some(Self::Managers),
            "FabricsCollection" => Some(Self::Fabrics),
            "TasksCollection" => Some(Self::Tasks),
            _ => None,
        }
    }

    pub fn origin(self) -> &'static str {
        match self {
            Self::Systems => "/redfish/v1/Systems",
            Self::Chassis => "/redfish/v1/Chassis",
            Self::Managers => "/redfish/v1/Managers",
            Self::Fabrics => "/redfish/v1/Fabrics",
            Self::Tasks => "/redfish/v1/TaskService/Tasks",
        }
    }

    /// Bucket an event's origin falls into, unless `host` already is that bucket.
    ///
    /// Checked in order: Systems, Chassis, Managers, Fabrics.
    pub fn for_event(origin_of_condition: &str, host: &str) -> Option<Self> {
        [
            ("Systems", Self::Systems),
            ("Chassis", Self::Chassis),
            ("Managers", Self::Managers),
            ("Fabrics", Self::Fabrics),
        ]
        .into_iter()
        .find(|(segment, kind)| {
            origin_of_condition.contains(segment) && host != kind.to_string()
        })
        .map(|(_, kind)| kind)
    }
}

/// Hosts containing `Collection` are markers, not devices.
pub fn is_collection_host(host: &str) -> bool {
    host.contains("Collection")
}

pub fn is_aggregate_uri(origin: &str) -> bool {
    origin.contains(AGGREGATES_PREFIX)
}

pub fn is_fabric_uri(origin: &str) -> bool {
    origin.contains(FABRICS_PREFIX)
}

/// Fabric ID from `/redfish/v1/Fabrics/{id}[/...]`.
pub fn fabric_id(origin: &str) -> Option<&str> {
    let (_, rest) = origin.split_once(FABRICS_PREFIX)?;
    rest.split('/').next().filter(|id| !id.is_empty())
}

/// Device UUID of a `{uuid}:{n}` style resource URI.
///
/// Keys written with the older `{uuid}.{n}` form are accepted too.
/// Returns `None` for URIs without either separator, which name
/// collections.
pub fn device_uuid(origin: &str) -> Option<&str> {
    let (head, _) = origin.split_once([':', '.'])?;
    head.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Local ID after the last `/`.
pub fn last_segment(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_collection_origins() {
        assert_eq!(
            CollectionKind::from_origin("/redfish/v1/Systems/"),
            Some(CollectionKind::Systems)
        );
        assert_eq!(CollectionKind::from_origin("/redfish/v1/Systems/uuid:1"), None);
        assert_eq!(CollectionKind::Managers.to_string(), "ManagerCollection");
        assert_eq!(
            CollectionKind::from_marker("TasksCollection"),
            Some(CollectionKind::Tasks)
        );
    }

    #[test]
    fn event_bucket_skips_systems_for_systems_marker() {
        assert_eq!(
            CollectionKind::for_event("/redfish/v1/Systems/u:1", "10.0.0.1"),
            Some(CollectionKind::Systems)
        );
        assert_eq!(
            CollectionKind::for_event("/redfish/v1/Systems/u:1", "SystemsCollection"),
            None
        );
        assert_eq!(
            CollectionKind::for_event("/redfish/v1/Fabrics/f1/Switches/s", "10.0.0.1"),
            Some(CollectionKind::Fabrics)
        );
    }

    #[test]
    fn extracts_identifiers() {
        assert_eq!(device_uuid("/redfish/v1/Systems/6d4a:1"), Some("6d4a"));
        assert_eq!(device_uuid("/redfish/v1/Systems/6d4a.1"), Some("6d4a"));
        assert_eq!(device_uuid("/redfish/v1/Systems"), None);
        assert_eq!(fabric_id("/redfish/v1/Fabrics/f-1/Zones/z"), Some("f-1"));
        assert_eq!(fabric_id("/redfish/v1/Fabrics/"), None);
        assert_eq!(last_segment("/redfish/v1/Systems/6d4a:1/"), "6d4a:1");
    }
}
