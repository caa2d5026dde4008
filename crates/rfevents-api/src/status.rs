// ── Plugin health probe ──
//
// Each round races `GET /ODIM/v1/Status` against a response timer, so a
// hung plugin costs at most `response_timeout` per round. Rounds are
// separated by `retry_interval`.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::gateway::{Credentials, PluginGateway};
use crate::models::{Plugin, PluginRequest, StatusResponse};

/// Round count and timing for [`PluginGateway::check_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub response_timeout: Duration,
    pub max_attempts: u32,
    pub retry_interval: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_interval: Duration::from_secs(60),
        }
    }
}

/// Outcome of a health probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub alive: bool,
    /// Rounds used before concluding.
    pub tries: u32,
    /// EMB queue names reported by the plugin.
    pub queues: Vec<String>,
    /// Accumulated round errors, present on failure and on a late success.
    pub error: Option<String>,
}

impl StatusReport {
    /// Convert a failed probe into an [`Error::PluginUnavailable`].
    pub fn into_result(self, plugin_id: &str) -> Result<Self, Error> {
        if self.alive {
            return Ok(self);
        }
        Err(Error::PluginUnavailable {
            plugin_id: plugin_id.to_owned(),
            log: self.error.unwrap_or_default(),
        })
    }
}

impl PluginGateway {
    /// Probe with the gateway's configured [`ProbePolicy`].
    pub async fn plugin_status(&self, plugin: &Plugin) -> bool {
        let policy = self.probe_policy().clone();
        let report = self
            .check_status(
                plugin,
                policy.max_attempts,
                policy.response_timeout,
                policy.retry_interval,
            )
            .await;
        if report.alive {
            info!(plugin = %plugin.id, tries = report.tries, "plugin is alive");
        } else {
            warn!(
                plugin = %plugin.id,
                error = report.error.as_deref().unwrap_or_default(),
                "plugin status check failed"
            );
        }
        report.alive
    }

    /// Run up to `attempts` probe rounds.
    ///
    /// Returns on the first round where the plugin reports
    /// `Available == "yes"`; otherwise all rounds are used and the report
    /// carries the concatenated round errors.
    pub async fn check_status(
        &self,
        plugin: &Plugin,
        attempts: u32,
        wait: Duration,
        interval: Duration,
    ) -> StatusReport {
        let mut log = String::new();
        let mut queues = Vec::new();

        for round in 1..=attempts {
            let outcome = tokio::select! {
                result = self.status_once(plugin) => result,
                () = tokio::time::sleep(wait) => Err(RoundError::Timeout),
            };

            match outcome {
                Ok(status) => {
                    queues = status.queue_names();
                    if status.is_available() {
                        let error = (!log.is_empty()).then(|| format!("error logs: {log}"));
                        return StatusReport {
                            alive: true,
                            tries: round,
                            queues,
                            error,
                        };
                    }
                    let available = status
                        .status
                        .as_ref()
                        .map(|s| s.available.clone())
                        .unwrap_or_default();
                    log.push_str(&format!(
                        " LOGS FROM TRY {round}:error: expected plugin status: yes, but got {available}"
                    ));
                }
                Err(e) => {
                    debug!(plugin = %plugin.id, round, error = %e, "status round failed");
                    log.push_str(&format!(" LOGS FROM TRY {round}:{e}"));
                }
            }

            if round < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        StatusReport {
            alive: false,
            tries: attempts,
            queues,
            error: Some(format!(
                "error: maximum retries are over. unable to contact the plugin: error logs: {log}"
            )),
        }
    }

    async fn status_once(&self, plugin: &Plugin) -> Result<StatusResponse, RoundError> {
        let credentials = if plugin.uses_token_auth() {
            let token = self.create_token(plugin).await.map_err(RoundError::Request)?;
            Credentials::Token(token)
        } else {
            Credentials::Basic
        };

        let request = PluginRequest::new(reqwest::Method::GET, crate::STATUS_PATH);
        let response = self
            .send(plugin, &request, &credentials)
            .await
            .map_err(RoundError::Request)?;

        if response.status != reqwest::StatusCode::OK {
            return Err(RoundError::UnexpectedStatus(response.status.as_u16()));
        }

        serde_json::from_str(&response.body).map_err(|e| RoundError::Parse(e.to_string()))
    }
}

/// Why one probe round failed.
#[derive(Debug, thiserror::Error)]
enum RoundError {
    #[error("error: wait time exceeded and got no response from plugin")]
    Timeout,
    #[error("error while trying to make the request to the plugin: {0}")]
    Request(Error),
    #[error("error: expected response from plugin 200, but got {0}")]
    UnexpectedStatus(u16),
    #[error("error while trying to unmarshal the response: {0}")]
    Parse(String),
}
