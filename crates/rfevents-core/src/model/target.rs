// ── Read-only inventory records ──
//
// Managed devices, fabrics and aggregates as the aggregation service
// stores them. This crate only reads them.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use rfevents_api::models::{deserialize_secret, serialize_secret};

use super::subscription::Link;

/// Connection info for a managed device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Target {
    pub manager_address: String,
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: SecretString,
    pub user_name: String,
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
    #[serde(rename = "DeviceUUID")]
    pub device_uuid: String,
}

impl Target {
    /// `ManagerAddress` without any `:port` suffix.
    pub fn host(&self) -> &str {
        self.manager_address
            .split(':')
            .next()
            .unwrap_or(&self.manager_address)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fabric {
    #[serde(rename = "FabricUUID", default)]
    pub fabric_uuid: String,
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
}

/// A client-defined set of systems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Aggregate {
    pub elements: Vec<Link>,
}

impl Aggregate {
    pub fn member_uris(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|l| l.oid.as_str())
    }
}
