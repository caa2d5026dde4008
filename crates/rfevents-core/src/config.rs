// ── Runtime event service configuration ──
//
// These types describe how the service talks to plugins and subscribers.
// They never touch disk; `rfevents-config` layers file and environment
// sources on top of the defaults here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rfevents_api::{ProbePolicy, TlsMode};

/// TLS verification strategy for outbound connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    System,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    AcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::System => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::AcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventServiceConfig {
    pub url_translation: UrlTranslation,
    pub delivery: DeliveryConfig,
    pub plugin_status_polling: PluginStatusPolling,
    pub plugin: PluginConfig,
    pub subscription: SubscriptionConfig,
    pub cache: CacheConfig,
}

/// Path prefix rewrites between the northbound and southbound URI spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlTranslation {
    /// Applied to inbound events before routing.
    pub north_bound: BTreeMap<String, String>,
    /// Applied to subscription bodies sent to plugins.
    pub south_bound: BTreeMap<String, String>,
}

impl Default for UrlTranslation {
    fn default() -> Self {
        Self {
            north_bound: BTreeMap::from([("/ODIM/v1".to_owned(), "/redfish/v1".to_owned())]),
            south_bound: BTreeMap::from([("/redfish/v1".to_owned(), "/ODIM/v1".to_owned())]),
        }
    }
}

impl UrlTranslation {
    pub fn to_north(&self, payload: &str) -> String {
        translate(payload, &self.north_bound)
    }

    pub fn to_south(&self, payload: &str) -> String {
        translate(payload, &self.south_bound)
    }
}

fn translate(payload: &str, table: &BTreeMap<String, String>) -> String {
    table
        .iter()
        .fold(payload.to_owned(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Attempts after the first failed POST.
    pub retry_attempts: u32,
    pub retry_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub tls: TlsVerification,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_interval_secs: 60,
            request_timeout_secs: 30,
            tls: TlsVerification::default(),
        }
    }
}

impl DeliveryConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginStatusPolling {
    pub response_timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub retry_interval_mins: u64,
    /// Interval between monitor sweeps; 0 disables the monitor.
    pub polling_frequency_mins: u64,
    pub start_up_resource_batch_size: usize,
}

impl Default for PluginStatusPolling {
    fn default() -> Self {
        Self {
            response_timeout_secs: 30,
            max_retry_attempts: 3,
            retry_interval_mins: 1,
            polling_frequency_mins: 30,
            start_up_resource_batch_size: 10,
        }
    }
}

impl PluginStatusPolling {
    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            max_attempts: self.max_retry_attempts,
            retry_interval: Duration::from_secs(self.retry_interval_mins * 60),
        }
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_frequency_mins * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// `https` for real plugins; `http` is accepted for local doubles.
    pub scheme: String,
    pub request_timeout_secs: u64,
    pub tls: TlsVerification,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            scheme: "https".into(),
            request_timeout_secs: 30,
            tls: TlsVerification::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Upper bound on concurrently processed origin resources per request.
    pub max_concurrent_origins: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_origins: 16,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Full rebuild period in seconds. 0 = only explicit refresh.
    pub refresh_interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_rewrites_every_occurrence() {
        let t = UrlTranslation::default();
        assert_eq!(
            t.to_north(r#"{"a":"/ODIM/v1/Systems/1","b":"/ODIM/v1/Chassis/1"}"#),
            r#"{"a":"/redfish/v1/Systems/1","b":"/redfish/v1/Chassis/1"}"#
        );
        assert_eq!(t.to_south("/redfish/v1/Systems"), "/ODIM/v1/Systems");
    }

    #[test]
    fn polling_defaults_build_probe_policy() {
        let policy = PluginStatusPolling::default().probe_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.response_timeout, Duration::from_secs(30));
        assert_eq!(policy.retry_interval, Duration::from_secs(60));
    }
}
