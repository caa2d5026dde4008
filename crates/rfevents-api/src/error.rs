use thiserror::Error;

/// Top-level error type for the `rfevents-api` crate.
///
/// Covers every failure mode of the southbound plugin contract:
/// session creation, transport, unexpected plugin responses and the
/// health probe. `rfevents-core` maps these into task outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login against `/ODIM/v1/Sessions` failed or returned no token.
    #[error("Unable to create session with plugin {plugin_id}: {message}")]
    SessionCreation { plugin_id: String, message: String },

    /// The plugin rejected the credentials or token (HTTP 401).
    #[error("Plugin {plugin_id} rejected the request credentials")]
    Unauthorized { plugin_id: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Plugin responses ────────────────────────────────────────────
    /// The plugin answered with a status the caller did not expect.
    #[error("Plugin returned HTTP {status}")]
    Plugin { status: u16, body: String },

    /// Health probe ran out of attempts.
    #[error("Plugin {plugin_id} unavailable: {log}")]
    PluginUnavailable { plugin_id: String, log: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if re-creating the plugin session might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
            || matches!(self, Self::Plugin { status: 401, .. })
    }

    /// Returns `true` if this is a transient error worth a health-gated retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::PluginUnavailable { .. } => true,
            _ => false,
        }
    }

    /// HTTP status associated with this error, if the plugin produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Plugin { status, .. } => Some(*status),
            Self::Unauthorized { .. } | Self::SessionCreation { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
