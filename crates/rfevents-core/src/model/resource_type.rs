// ── Known Redfish resource types ──
//
// Maps a subscribable `ResourceTypes` entry to the path segment that
// appears in `OriginOfCondition` URIs (e.g. `ComputerSystem` -> `Systems`).

const RESOURCE_TYPES: &[(&str, &str)] = &[
    ("AccelerationFunction", "AccelerationFunction"),
    ("AddressPool", "AddressPool"),
    ("Assembly", "Assembly"),
    ("Bios", "Bios"),
    ("BootOption", "BootOptions"),
    ("Chassis", "Chassis"),
    ("ComputerSystem", "Systems"),
    ("Drive", "Drive"),
    ("Endpoint", "Endpoint"),
    ("EthernetInterface", "EthernetInterfaces"),
    ("Event", "Event"),
    ("EventDestination", "EventDestination"),
    ("EventService", "EventService"),
    ("Fabric", "Fabric"),
    ("HostInterface", "HostInterfaces"),
    ("IPAddresses", "IPAddresses"),
    ("Job", "Job"),
    ("JobService", "JobService"),
    ("LogEntry", "LogEntry"),
    ("LogService", "LogServices"),
    ("Manager", "Manager"),
    ("ManagerAccount", "ManagerAccount"),
    ("ManagerNetworkProtocol", "ManagerNetworkProtocol"),
    ("Memory", "Memory"),
    ("MemoryChunks", "MemoryChunks"),
    ("MemoryDomain", "MemoryDomains"),
    ("MemoryMetrics", "MemoryMetrics"),
    ("Message", "Message"),
    ("MessageRegistry", "MessageRegistry"),
    ("MessageRegistryFile", "MessageRegistryFile"),
    ("NetworkAdapter", "NetworkAdapters"),
    ("NetworkDeviceFunction", "NetworkDeviceFunction"),
    ("NetworkInterface", "NetworkInterfaces"),
    ("NetworkPort", "NetworkPort"),
    ("PCIeDevice", "PCIeDevices"),
    ("PCIeFunction", "PCIeFunction"),
    ("PCIeSlots", "PCIeSlots"),
    ("PhysicalContext", "PhysicalContext"),
    ("Port", "Port"),
    ("Power", "Power"),
    ("PrivilegeRegistry", "PrivilegeRegistry"),
    ("Privileges", "Privileges"),
    ("Processor", "Processors"),
    ("ProcessorCollection", "ProcessorCollection"),
    ("ProcessorMetrics", "ProcessorMetrics"),
    ("Protocol", "Protocol"),
    ("Redundancy", "Redundancy"),
    ("Resource", "Resource"),
    ("Role", "Role"),
    ("SecureBoot", "SecureBoot"),
    ("Sensor", "Sensor"),
    ("SerialInterfaces", "SerialInterfaces"),
    ("Session", "Session"),
    ("Storage", "Storage"),
    ("Switch", "Switch"),
    ("Task", "Task"),
    ("Thermal", "Thermal"),
    ("VLanNetworkInterface", "VLanNetworkInterface"),
    ("Volume", "Volume"),
    ("Zone", "Zone"),
];

/// URI segment for a resource type name, if it is known.
pub fn segment_for(resource_type: &str) -> Option<&'static str> {
    RESOURCE_TYPES
        .iter()
        .find(|(name, _)| *name == resource_type)
        .map(|(_, segment)| *segment)
}

pub fn is_known(resource_type: &str) -> bool {
    segment_for(resource_type).is_some()
}

/// Whether an `OriginOfCondition` segment names a supported resource,
/// i.e. contains one of the table's URI segments.
pub fn segment_is_supported(segment: &str) -> bool {
    RESOURCE_TYPES
        .iter()
        .any(|(_, value)| segment.contains(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_translates_plural_segments() {
        assert_eq!(segment_for("ComputerSystem"), Some("Systems"));
        assert_eq!(segment_for("Processor"), Some("Processors"));
        assert_eq!(segment_for("Volume"), Some("Volume"));
        assert_eq!(segment_for("Toaster"), None);
    }

    #[test]
    fn segment_support_is_substring_based() {
        assert!(segment_is_supported("Systems"));
        assert!(segment_is_supported("Volumes"));
        assert!(!segment_is_supported("redfish"));
    }
}
