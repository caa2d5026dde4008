#![allow(clippy::unwrap_used)]
// Integration tests for `PluginGateway` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rfevents_api::{AuthType, Error, Plugin, PluginGateway, PluginRequest, ProbePolicy};

// ── Helpers ─────────────────────────────────────────────────────────

fn quick_probe() -> ProbePolicy {
    ProbePolicy {
        response_timeout: Duration::from_millis(200),
        max_attempts: 1,
        retry_interval: Duration::ZERO,
    }
}

fn plugin_for(server: &MockServer, auth: AuthType) -> Plugin {
    let addr = server.address();
    Plugin {
        id: "GRF".into(),
        ip: addr.ip().to_string(),
        port: addr.port().to_string(),
        username: "admin".into(),
        password: SecretString::from("plugin-pass"),
        preferred_auth_type: auth,
    }
}

async fn setup(auth: AuthType) -> (MockServer, PluginGateway, Plugin) {
    let server = MockServer::start().await;
    let gateway = PluginGateway::with_client(reqwest::Client::new(), "http", quick_probe());
    let plugin = plugin_for(&server, auth);
    (server, gateway, plugin)
}

fn subscribe_request() -> PluginRequest {
    PluginRequest::post(
        rfevents_api::SUBSCRIPTIONS_PATH,
        json!({ "ManagerAddress": "10.0.0.9", "PostBody": {} }),
    )
}

// ── Auth selection ──────────────────────────────────────────────────

#[tokio::test]
async fn test_basic_auth_sends_inline_credentials() {
    let (server, gateway, plugin) = setup(AuthType::BasicAuth).await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .and(basic_auth("admin", "plugin-pass"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", "/ODIM/v1/Subscriptions/1")
                .set_body_json(json!({})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = gateway.call(&plugin, &subscribe_request()).await.unwrap();

    assert!(resp.is_success());
    assert_eq!(resp.location.as_deref(), Some("/ODIM/v1/Subscriptions/1"));
    assert!(gateway.tokens().is_empty());
}

#[tokio::test]
async fn test_token_auth_creates_and_caches_session() {
    let (server, gateway, plugin) = setup(AuthType::XAuthToken).await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Sessions"))
        .and(body_json(json!({ "Username": "admin", "Password": "plugin-pass" })))
        .respond_with(ResponseTemplate::new(201).insert_header("X-Auth-Token", "tok-1"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .and(header("X-Auth-Token", "tok-1"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/loc"))
        .expect(2)
        .mount(&server)
        .await;

    gateway.call(&plugin, &subscribe_request()).await.unwrap();
    gateway.call(&plugin, &subscribe_request()).await.unwrap();

    let cached = gateway.tokens().get("GRF").unwrap();
    assert_eq!(cached.expose_secret(), "tok-1");
}

#[tokio::test]
async fn test_reauth_recreates_token_once_on_401() {
    let (server, gateway, plugin) = setup(AuthType::XAuthToken).await;
    gateway.tokens().store("GRF", SecretString::from("stale"));

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .and(header("X-Auth-Token", "stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Sessions"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Auth-Token", "fresh"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .and(header("X-Auth-Token", "fresh"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/loc"))
        .expect(1)
        .mount(&server)
        .await;

    let resp = gateway
        .call_with_reauth(&plugin, &subscribe_request())
        .await
        .unwrap();

    assert_eq!(resp.status.as_u16(), 201);
    assert_eq!(gateway.tokens().get("GRF").unwrap().expose_secret(), "fresh");
}

#[tokio::test]
async fn test_session_without_token_header_fails() {
    let (server, gateway, plugin) = setup(AuthType::XAuthToken).await;

    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Sessions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let result = gateway.call(&plugin, &subscribe_request()).await;

    assert!(
        matches!(result, Err(Error::SessionCreation { .. })),
        "expected SessionCreation error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_non_success_status_is_returned_to_caller() {
    let (server, gateway, plugin) = setup(AuthType::BasicAuth).await;

    Mock::given(method("DELETE"))
        .and(path("/ODIM/v1/Subscriptions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "gone" })))
        .mount(&server)
        .await;

    let resp = gateway
        .call(&plugin, &PluginRequest::delete(rfevents_api::SUBSCRIPTIONS_PATH))
        .await
        .unwrap();

    assert!(!resp.is_success());
    assert_eq!(resp.json().unwrap(), json!({ "error": "gone" }));
}

#[tokio::test]
async fn test_absolute_location_bypasses_plugin_address() {
    let (server, gateway, _) = setup(AuthType::BasicAuth).await;
    let unreachable = Plugin {
        ip: "192.0.2.1".into(),
        port: "1".into(),
        ..plugin_for(&server, AuthType::BasicAuth)
    };

    Mock::given(method("DELETE"))
        .and(path("/redfish/v1/EventService/Subscriptions/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let location = format!("{}/redfish/v1/EventService/Subscriptions/7", server.uri());
    let resp = gateway
        .call(&unreachable, &PluginRequest::delete(location))
        .await
        .unwrap();
    assert_eq!(resp.status.as_u16(), 204);
}

// ── Transport failure ───────────────────────────────────────────────

#[tokio::test]
async fn test_transport_error_surfaces_after_failed_probe() {
    let gateway = PluginGateway::with_client(reqwest::Client::new(), "http", quick_probe());
    let plugin = Plugin {
        id: "DOWN".into(),
        ip: "127.0.0.1".into(),
        port: "9".into(),
        username: "admin".into(),
        password: SecretString::from("x"),
        preferred_auth_type: AuthType::BasicAuth,
    };

    let result = gateway.call(&plugin, &subscribe_request()).await;

    match result {
        Err(err @ Error::Transport(_)) => assert!(err.is_transient()),
        other => panic!("expected transport error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_error_is_retried_once_after_healthy_status() {
    let server = MockServer::start().await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let gateway = PluginGateway::with_client(http, "http", quick_probe());
    let plugin = plugin_for(&server, AuthType::BasicAuth);

    // The first attempt hangs past the client timeout.
    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ODIM/v1/Status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "GRF",
            "Status": { "Available": "yes", "Uptime": "", "TimeStamp": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Subscriptions"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/ODIM/v1/Subscriptions/2"))
        .expect(1)
        .mount(&server)
        .await;

    let resp = gateway.call(&plugin, &subscribe_request()).await.unwrap();

    assert_eq!(resp.status.as_u16(), 201);
    assert_eq!(resp.location.as_deref(), Some("/ODIM/v1/Subscriptions/2"));
    let posts = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .count();
    assert_eq!(posts, 2);
}
