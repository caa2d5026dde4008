// ── Southbound plugin wire types ──
//
// Plugin connection records as read from the store, plus the request and
// response shapes of the `/ODIM/v1` plugin contract.

use std::str::FromStr;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Plugin record ───────────────────────────────────────────────────

/// How the gateway authenticates against a plugin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AuthType {
    /// Credentials sent inline on every request.
    #[default]
    BasicAuth,
    /// Session token from `POST /ODIM/v1/Sessions`, sent as `X-Auth-Token`.
    XAuthToken,
}

impl AuthType {
    /// Anything other than a (case-insensitive) `XAuthToken` falls back to basic auth.
    pub fn from_preference(value: &str) -> Self {
        Self::from_str(value).unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for AuthType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_preference(&raw))
    }
}

/// A device-management plugin. Read-only from this crate's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Plugin {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "IP")]
    pub ip: String,
    pub port: String,
    pub username: String,
    /// Decrypted password.
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub password: SecretString,
    #[serde(default)]
    pub preferred_auth_type: AuthType,
}

impl Plugin {
    pub fn uses_token_auth(&self) -> bool {
        self.preferred_auth_type == AuthType::XAuthToken
    }
}

/// Deserialize a plain string field straight into a `SecretString`.
pub fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Write a `SecretString` back out in the clear, for store snapshots only.
pub fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

// ── Requests ────────────────────────────────────────────────────────

/// A single southbound call: method, plugin-relative path (or absolute
/// URL such as a stored subscription `Location`) and optional JSON body.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    pub method: reqwest::Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl PluginRequest {
    pub fn new(method: reqwest::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(reqwest::Method::POST, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(reqwest::Method::DELETE, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Login body for `POST /ODIM/v1/Sessions`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SessionRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

// ── Responses ───────────────────────────────────────────────────────

/// A fully-read plugin response. The body has been drained so the
/// underlying connection is back in the pool.
#[derive(Debug, Clone)]
pub struct PluginResponse {
    pub status: StatusCode,
    pub body: String,
    /// `Location` header, if the plugin returned one.
    pub location: Option<String>,
    /// `X-Auth-Token` header, if the plugin returned one.
    pub token: Option<String>,
}

impl PluginResponse {
    /// Only 200 and 201 count as success on the plugin contract.
    pub fn is_success(&self) -> bool {
        matches!(self.status, StatusCode::OK | StatusCode::CREATED)
    }

    /// Parse the body as JSON, mapping an empty body to `null`.
    pub fn json(&self) -> Result<serde_json::Value, crate::Error> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| crate::Error::Deserialization {
            message: e.to_string(),
            body: self.body.clone(),
        })
    }
}

/// `GET /ODIM/v1/Status` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub status: Option<PluginAvailability>,
    pub event_message_bus: Option<EventMessageBus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginAvailability {
    #[serde(default)]
    pub available: String,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub time_stamp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventMessageBus {
    #[serde(default)]
    pub emb_type: String,
    #[serde(default)]
    pub emb_queue: Vec<EmbQueue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbQueue {
    #[serde(rename = "EmbQueueName", default)]
    pub name: String,
    #[serde(rename = "EmbQueueDesc", default)]
    pub description: String,
}

impl StatusResponse {
    pub fn is_available(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.available.eq_ignore_ascii_case("yes"))
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.event_message_bus
            .as_ref()
            .map(|bus| bus.emb_queue.iter().map(|q| q.name.clone()).collect())
            .unwrap_or_default()
    }
}
