// Plugin gateway
//
// Authenticated HTTP contact to device-management plugins. Picks the auth
// scheme from the plugin record, caches session tokens per plugin, drains
// every response body, and retries once after a healthy status probe when
// the transport itself fails.

use reqwest::header::{CONTENT_TYPE, LOCATION};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::{Plugin, PluginRequest, PluginResponse, SessionRequest};
use crate::status::ProbePolicy;
use crate::token::TokenCache;
use crate::topics::TopicRegistry;
use crate::transport::TransportConfig;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// How a single request authenticates.
pub(crate) enum Credentials {
    Basic,
    Token(SecretString),
    Anonymous,
}

/// Process-wide gateway to every plugin.
///
/// Construct once and share by reference (or `Arc`). The token cache and
/// topic registry live here rather than in globals.
pub struct PluginGateway {
    http: reqwest::Client,
    scheme: String,
    tokens: TokenCache,
    topics: TopicRegistry,
    probe: ProbePolicy,
}

impl PluginGateway {
    /// Build a gateway with an HTTPS client from `transport`.
    pub fn new(transport: &TransportConfig, probe: ProbePolicy) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, "https", probe))
    }

    /// Build a gateway around a pre-built client and URL scheme.
    ///
    /// Plugins are normally reached over `https`; plain `http` is accepted
    /// for local plugins and test doubles.
    pub fn with_client(http: reqwest::Client, scheme: &str, probe: ProbePolicy) -> Self {
        Self {
            http,
            scheme: scheme.to_owned(),
            tokens: TokenCache::new(),
            topics: TopicRegistry::new(),
            probe,
        }
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }

    pub fn probe_policy(&self) -> &ProbePolicy {
        &self.probe
    }

    // ── URL construction ─────────────────────────────────────────────

    /// Resolve a request path against the plugin: `{scheme}://{IP}:{Port}{path}`.
    ///
    /// Absolute URLs (e.g. a stored southbound `Location`) pass through.
    pub fn plugin_url(&self, plugin: &Plugin, path: &str) -> Result<Url, Error> {
        if path.starts_with("https://") || path.starts_with("http://") {
            return Ok(Url::parse(path)?);
        }
        let full = format!("{}://{}:{}{path}", self.scheme, plugin.ip, plugin.port);
        Ok(Url::parse(&full)?)
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Send `request` to `plugin`.
    ///
    /// Any response status is returned as `Ok`; callers decide what counts
    /// as success. On a transport error the plugin is probed and, if it
    /// reports healthy, the call is retried exactly once.
    pub async fn call(
        &self,
        plugin: &Plugin,
        request: &PluginRequest,
    ) -> Result<PluginResponse, Error> {
        let credentials = self.credentials(plugin).await?;
        match self.send(plugin, request, &credentials).await {
            Err(err @ Error::Transport(_)) => {
                warn!(plugin = %plugin.id, error = %err, "plugin call failed, probing status");
                if self.plugin_status(plugin).await {
                    self.send(plugin, request, &credentials).await
                } else {
                    Err(err)
                }
            }
            other => other,
        }
    }

    /// [`call`](Self::call), then one session re-creation and retry if a
    /// token-authenticated request comes back 401.
    pub async fn call_with_reauth(
        &self,
        plugin: &Plugin,
        request: &PluginRequest,
    ) -> Result<PluginResponse, Error> {
        let response = self.call(plugin, request).await?;
        if response.status == reqwest::StatusCode::UNAUTHORIZED && plugin.uses_token_auth() {
            debug!(plugin = %plugin.id, "plugin token rejected, recreating session");
            self.create_token(plugin).await?;
            return self.call(plugin, request).await;
        }
        Ok(response)
    }

    // ── Session tokens ───────────────────────────────────────────────

    /// Log in to the plugin and cache the returned `X-Auth-Token`.
    pub async fn create_token(&self, plugin: &Plugin) -> Result<SecretString, Error> {
        let body = serde_json::to_value(SessionRequest {
            username: &plugin.username,
            password: plugin.password.expose_secret(),
        })
        .map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        let request = PluginRequest::post(crate::SESSIONS_PATH, body);

        let response = self
            .send(plugin, &request, &Credentials::Anonymous)
            .await
            .map_err(|e| Error::SessionCreation {
                plugin_id: plugin.id.clone(),
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(Error::SessionCreation {
                plugin_id: plugin.id.clone(),
                message: format!("login returned HTTP {}", response.status.as_u16()),
            });
        }

        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::SessionCreation {
                plugin_id: plugin.id.clone(),
                message: "login response carried no X-Auth-Token".into(),
            })?;

        debug!(plugin = %plugin.id, "plugin session created");
        let token = SecretString::from(token);
        self.tokens.store(&plugin.id, token.clone());
        Ok(token)
    }

    /// Cached token for the plugin, or a freshly created one.
    pub async fn get_or_create_token(&self, plugin: &Plugin) -> Result<SecretString, Error> {
        if let Some(token) = self.tokens.get(&plugin.id) {
            return Ok(token);
        }
        self.create_token(plugin).await
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn credentials(&self, plugin: &Plugin) -> Result<Credentials, Error> {
        if plugin.uses_token_auth() {
            Ok(Credentials::Token(self.get_or_create_token(plugin).await?))
        } else {
            Ok(Credentials::Basic)
        }
    }

    pub(crate) async fn send(
        &self,
        plugin: &Plugin,
        request: &PluginRequest,
        credentials: &Credentials,
    ) -> Result<PluginResponse, Error> {
        let url = self.plugin_url(plugin, &request.path)?;
        debug!(plugin = %plugin.id, method = %request.method, %url, "calling plugin");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json");

        builder = match credentials {
            Credentials::Basic => {
                builder.basic_auth(&plugin.username, Some(plugin.password.expose_secret()))
            }
            Credentials::Token(token) => builder.header(AUTH_TOKEN_HEADER, token.expose_secret()),
            Credentials::Anonymous => builder,
        };

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let location = header_value(resp.headers(), LOCATION.as_str());
        let token = header_value(resp.headers(), AUTH_TOKEN_HEADER);
        let body = resp.text().await?;
        trace!(plugin = %plugin.id, status = status.as_u16(), "plugin responded");

        Ok(PluginResponse {
            status,
            body,
            location,
            token,
        })
    }
}

fn header_value(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
