// ── Subscriber delivery ──
//
// Fire-and-forget POST of event payloads to subscriber destinations. The
// client sits behind a read-write lock so a TLS reload can swap it while
// deliveries keep reading.

use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use rfevents_api::TransportConfig;

use crate::config::{DeliveryConfig, TlsVerification};
use crate::error::CoreError;

pub struct Deliverer {
    client: RwLock<reqwest::Client>,
    timeout: Duration,
    /// Attempts after the first one.
    retry_attempts: u32,
    retry_interval: Duration,
}

impl Deliverer {
    pub fn new(config: &DeliveryConfig) -> Result<Self, CoreError> {
        let client = build_client(&config.tls, config.request_timeout())?;
        Ok(Self {
            client: RwLock::new(client),
            timeout: config.request_timeout(),
            retry_attempts: config.retry_attempts,
            retry_interval: config.retry_interval(),
        })
    }

    /// Deliverer over a prepared client.
    pub fn with_client(client: reqwest::Client, retry_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            client: RwLock::new(client),
            timeout: Duration::from_secs(30),
            retry_attempts,
            retry_interval,
        }
    }

    /// Rebuild the client with new TLS settings.
    pub async fn reload(&self, tls: &TlsVerification) -> Result<(), CoreError> {
        let client = build_client(tls, self.timeout)?;
        *self.client.write().await = client;
        info!("delivery TLS configuration reloaded");
        Ok(())
    }

    /// POST `payload` to `destination`, retrying on transport errors.
    ///
    /// Any HTTP response ends the attempt loop. Returns whether a response
    /// was received at all.
    pub async fn deliver(&self, destination: &str, payload: Vec<u8>) -> bool {
        let attempts = self.retry_attempts.saturating_add(1);
        for attempt in 1..=attempts {
            let client = self.client.read().await.clone();
            let result = client
                .post(destination)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload.clone())
                .send()
                .await;
            match result {
                Ok(response) => {
                    debug!(
                        destination,
                        status = response.status().as_u16(),
                        "event delivered"
                    );
                    return true;
                }
                Err(e) if attempt < attempts => {
                    debug!(destination, attempt, error = %e, "event delivery failed, retrying");
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    warn!(destination, attempts, error = %e, "event delivery abandoned");
                }
            }
        }
        false
    }
}

fn build_client(tls: &TlsVerification, timeout: Duration) -> Result<reqwest::Client, CoreError> {
    TransportConfig::new(tls.into(), timeout)
        .build_client()
        .map_err(|e| CoreError::Internal(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_once_on_any_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(header("content-type", "application/json"))
            .and(body_string("{}"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let deliverer = Deliverer::with_client(reqwest::Client::new(), 3, Duration::from_millis(1));
        assert!(
            deliverer
                .deliver(&format!("{}/events", server.uri()), b"{}".to_vec())
                .await
        );
    }

    #[tokio::test]
    async fn unreachable_destination_is_abandoned_after_retries() {
        let deliverer = Deliverer::with_client(reqwest::Client::new(), 2, Duration::from_millis(1));
        assert!(!deliverer.deliver("http://127.0.0.1:9/events", b"{}".to_vec()).await);
    }

    #[tokio::test]
    async fn reload_swaps_the_client() {
        let deliverer = Deliverer::new(&DeliveryConfig::default()).unwrap();
        deliverer.reload(&TlsVerification::AcceptInvalid).await.unwrap();
    }
}
