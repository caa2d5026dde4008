#![allow(clippy::unwrap_used)]
// Integration tests for `PluginMonitor` against a wiremock plugin.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rfevents_api::{AuthType, Plugin, PluginGateway};
use rfevents_core::{
    DeviceSubscription, InMemoryStore, PluginMonitor, PluginStatusPolling, Subscription,
    SubscriptionStore, Target,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn polling(batch: usize) -> PluginStatusPolling {
    PluginStatusPolling {
        response_timeout_secs: 1,
        max_retry_attempts: 1,
        retry_interval_mins: 0,
        polling_frequency_mins: 0,
        start_up_resource_batch_size: batch,
    }
}

fn target(n: u32) -> Target {
    Target {
        manager_address: format!("10.0.0.{n}"),
        password: SecretString::from("bmc-pass"),
        user_name: "root".into(),
        plugin_id: "GRF".into(),
        device_uuid: format!("uuid-{n}"),
    }
}

async fn setup(server: &MockServer, batch: usize) -> (Arc<InMemoryStore>, PluginMonitor, Plugin) {
    let addr = server.address();
    let plugin = Plugin {
        id: "GRF".into(),
        ip: addr.ip().to_string(),
        port: addr.port().to_string(),
        username: "admin".into(),
        password: SecretString::from("plugin-pass"),
        preferred_auth_type: AuthType::BasicAuth,
    };
    let store = Arc::new(InMemoryStore::new());
    store.insert_plugin(plugin.clone());
    for n in 1..=3 {
        store.insert_target(target(n));
    }
    store
        .save_device_subscription(&DeviceSubscription {
            event_host_ip: "10.0.0.1".into(),
            location: "https://10.0.0.1/redfish/v1/EventService/Subscriptions/7".into(),
            origin_resources: vec!["/redfish/v1/Systems/uuid-1:1".into()],
        })
        .await
        .unwrap();
    store
        .write_subscription(&Subscription {
            id: "s1".into(),
            destination: "https://listener/events".into(),
            event_types: vec!["Alert".into()],
            hosts: vec!["10.0.0.1".into()],
            ..Subscription::default()
        })
        .await
        .unwrap();

    let gateway = Arc::new(PluginGateway::with_client(
        reqwest::Client::new(),
        "http",
        polling(batch).probe_policy(),
    ));
    let monitor = PluginMonitor::new(store.clone(), gateway, &polling(batch));
    (store, monitor, plugin)
}

async fn mount_status(server: &MockServer, available: &str) {
    Mock::given(method("GET"))
        .and(path("/ODIM/v1/Status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "GRF",
            "Status": { "Available": available },
            "EventMessageBus": {
                "EmbType": "Kafka",
                "EmbQueue": [{ "EmbQueueName": "GRF-EVENTS", "EmbQueueDesc": "events" }]
            }
        })))
        .mount(server)
        .await;
}

async fn startup_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/ODIM/v1/Startup")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_healthy_probe_shares_inventory_in_batches() {
    let server = MockServer::start().await;
    let (store, monitor, _) = setup(&server, 2).await;
    mount_status(&server, "yes").await;
    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Startup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "10.0.0.1": "https://10.0.0.1/redfish/v1/EventService/Subscriptions/9"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let health = monitor.sweep().await.unwrap();
    assert_eq!(health.len(), 1);
    assert!(health[0].alive);
    assert_eq!(health[0].new_topics, vec!["GRF-EVENTS"]);
    assert_eq!(health[0].devices_shared, 3);

    let bodies = startup_bodies(&server).await;
    assert_eq!(bodies[0]["RequestType"], "full");
    assert_eq!(bodies[0]["ResyncEvtSubscription"], false);
    assert_eq!(bodies[0]["Devices"].as_object().unwrap().len(), 2);
    let first = &bodies[0]["Devices"]["uuid-1"];
    assert_eq!(first["Address"], "10.0.0.1");
    assert_eq!(first["Operation"], "add");
    assert_eq!(first["EventSubscriptionInfo"]["EventTypes"], json!(["Alert"]));
    assert_eq!(
        first["EventSubscriptionInfo"]["Location"],
        "https://10.0.0.1/redfish/v1/EventService/Subscriptions/7"
    );

    let ds = store.read_device_subscription("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(
        ds.location,
        "https://10.0.0.1/redfish/v1/EventService/Subscriptions/9"
    );
}

#[tokio::test]
async fn test_healthy_plugin_is_only_shared_once() {
    let server = MockServer::start().await;
    let (_, monitor, plugin) = setup(&server, 10).await;
    mount_status(&server, "yes").await;
    Mock::given(method("POST"))
        .and(path("/ODIM/v1/Startup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let first = monitor.check_plugin(&plugin).await;
    let second = monitor.check_plugin(&plugin).await;
    assert_eq!(first.devices_shared, 3);
    assert_eq!(second.devices_shared, 0);
    assert!(second.new_topics.is_empty());
}

#[tokio::test]
async fn test_unavailable_plugin_gets_no_startup_data() {
    let server = MockServer::start().await;
    let (_, monitor, plugin) = setup(&server, 10).await;
    mount_status(&server, "no").await;

    let health = monitor.check_plugin(&plugin).await;
    assert!(!health.alive);
    assert!(startup_bodies(&server).await.is_empty());
}
