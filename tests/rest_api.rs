//! End-to-end tests of the REST endpoints against a live server.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use resview_gateway::config::GatewayConfig;
use resview_gateway::domain::{EventBus, ResourceStore};
use resview_gateway::server;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct TestServer {
    base: String,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

async fn start_server() -> TestServer {
    let store = Arc::new(ResourceStore::new(EventBus::new(64)));
    let shutdown = CancellationToken::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let state = server::build_state(GatewayConfig::default(), store, shutdown.clone());
    tokio::spawn(server::serve(listener, server::build_app(state), shutdown.clone()));

    TestServer {
        base: format!("http://{addr}"),
        shutdown,
    }
}

fn widget(name: &str, namespace: &str, tier: &str) -> Value {
    json!({
        "metadata": { "name": name, "namespace": namespace, "labels": { "tier": tier } },
        "spec": { "color": "red" }
    })
}

#[tokio::test]
async fn health_reports_version() {
    let server = start_server().await;
    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn object_lifecycle() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let objects = server.url("/api/v1/collections/widgets/objects");

    let response = client
        .post(&objects)
        .json(&widget("w-1", "prod", "web"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let version = created["metadata"]["resourceVersion"].as_u64().unwrap();
    assert!(version > 0);

    let response = client
        .post(&objects)
        .json(&widget("w-1", "prod", "web"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let one = server.url("/api/v1/collections/widgets/objects/w-1?namespace=prod");
    let fetched: Value = client.get(&one).send().await.unwrap().json().await.unwrap();
    assert_eq!(fetched["spec"]["color"], "red");

    let mut stale = widget("w-1", "prod", "web");
    stale["metadata"]["resourceVersion"] = json!(version + 100);
    let response = client.put(&one).json(&stale).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let mut fresh = widget("w-1", "prod", "web");
    fresh["metadata"]["resourceVersion"] = json!(version);
    fresh["spec"]["color"] = json!("blue");
    let response = client.put(&one).json(&fresh).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["spec"]["color"], "blue");
    assert!(updated["metadata"]["resourceVersion"].as_u64().unwrap() > version);

    let response = client.delete(&one).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get(&one).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn list_filters_by_namespace_and_selectors() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let objects = server.url("/api/v1/collections/widgets/objects");

    for (name, ns, tier) in [("a", "prod", "web"), ("b", "prod", "db"), ("c", "dev", "web")] {
        let response = client
            .post(&objects)
            .json(&widget(name, ns, tier))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let names = |body: &Value| -> Vec<String> {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["metadata"]["name"].as_str().unwrap().to_string())
            .collect()
    };

    let all: Value = client.get(&objects).send().await.unwrap().json().await.unwrap();
    assert_eq!(names(&all), ["c", "a", "b"]);

    let web: Value = client
        .get(format!("{objects}?namespace=prod&labelSelector=tier%3Dweb"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(&web), ["a"]);

    let not_b: Value = client
        .get(format!("{objects}?fieldSelector=metadata.name%21%3Db"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut remaining = names(&not_b);
    remaining.sort();
    assert_eq!(remaining, vec!["a".to_string(), "c".to_string()]);

    let response = client
        .get(format!("{objects}?labelSelector=tier%20in%20%28web%29"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let collections: Value = client
        .get(server.url("/api/v1/collections"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(collections["collections"], json!(["widgets"]));
}

#[tokio::test]
async fn update_rejects_mismatched_name() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let response = client
        .put(server.url("/api/v1/collections/widgets/objects/other"))
        .json(&widget("w-1", "prod", "web"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_ids_are_generated_and_propagated() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/health")).send().await.unwrap();
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(generated.len(), 8);

    let response = client
        .get(server.url("/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-me")
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let server = start_server().await;
    let doc: Value = reqwest::get(server.url("/api-docs/openapi.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/api/v1/collections/{collection}/objects"].is_object());
}
