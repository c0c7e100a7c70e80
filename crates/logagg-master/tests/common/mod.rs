//! Shared fixtures: an in-memory master plus fake collector and broker API
//! endpoints served on ephemeral local ports.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use logagg_master::broker_api::BrokerApiClient;
use logagg_master::{create_router, AppState, AuthConfig, MasterConfig};
use logagg_registry::{RegistryStore, SqliteRegistryStore};

pub const AUTH: &str = "key=xyz&secret=xxxx";

pub struct TestMaster {
    pub router: Router,
    pub registry: Arc<dyn RegistryStore>,
    pub broker_api: BrokerApiClient,
}

pub async fn test_master() -> TestMaster {
    let registry = Arc::new(SqliteRegistryStore::new_in_memory().await.unwrap())
        as Arc<dyn RegistryStore>;

    let config = MasterConfig {
        auth: AuthConfig::new("xyz", "xxxx"),
        tail_flush_interval: Duration::from_millis(100),
        collector_timeout: Duration::from_secs(2),
        broker_connect_timeout: Duration::from_secs(2),
        ..MasterConfig::default()
    };
    let (state, broker_api) = AppState::new(Arc::clone(&registry), &config).unwrap();

    TestMaster {
        router: create_router(state),
        registry,
        broker_api,
    }
}

impl TestMaster {
    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    /// GET expecting the uniform HTTP 200 JSON reply.
    pub async fn get_json(&self, uri: &str) -> Value {
        let (status, body) = self.get(uri).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
        serde_json::from_slice(&body).unwrap()
    }

    /// Register a broker whose API endpoint is `api`.
    pub async fn add_broker(&self, api: SocketAddr) {
        let reply = self
            .get_json(&format!(
                "/logagg/v1/register_broker_api?{AUTH}&host={}&port={}",
                api.ip(),
                api.port()
            ))
            .await;
        assert_eq!(reply["success"], true);

        let reply = self
            .get_json(&format!(
                "/logagg/v1/register_broker?{AUTH}&tcp_address=127.0.0.1:4150&http_address=127.0.0.1:4151"
            ))
            .await;
        assert_eq!(reply["success"], true);
    }

    pub async fn add_component(&self, namespace: &str, topic: &str, host: &str, port: u16) {
        let reply = self
            .get_json(&format!(
                "/logagg/v1/register_component?namespace={namespace}&topic_name={topic}&host={host}&port={port}"
            ))
            .await;
        assert_eq!(reply["success"], true);
    }
}

pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ---------------------------------------------------------------
// Fake collector
// ---------------------------------------------------------------

#[derive(Clone, Default)]
pub struct FakeCollector {
    pub files: Arc<Mutex<Vec<String>>>,
    pub stops: Arc<Mutex<usize>>,
}

async fn add_file(
    State(collector): State<FakeCollector>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut files = collector.files.lock().unwrap();
    if let Some(fpath) = params.get("fpath") {
        files.push(fpath.clone());
    }
    Json(json!({ "result": files.clone() }))
}

async fn remove_file(
    State(collector): State<FakeCollector>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut files = collector.files.lock().unwrap();
    if let Some(fpath) = params.get("fpath") {
        files.retain(|f| f != fpath);
    }
    Json(json!({ "result": files.clone() }))
}

async fn stop(State(collector): State<FakeCollector>) -> Json<Value> {
    *collector.stops.lock().unwrap() += 1;
    Json(json!({ "result": "stopping" }))
}

pub async fn spawn_collector() -> (SocketAddr, FakeCollector) {
    let collector = FakeCollector::default();
    let router = Router::new()
        .route("/collector/v1/add_file", get(add_file))
        .route("/collector/v1/remove_file", get(remove_file))
        .route("/collector/v1/stop", get(stop))
        .with_state(collector.clone());
    (spawn_server(router).await, collector)
}

// ---------------------------------------------------------------
// Fake broker API
// ---------------------------------------------------------------

/// Serves a fixed set of lines per sub-topic, then ends the response.
#[derive(Clone, Default)]
pub struct FakeBrokerApi {
    pub lines: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
    pub requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl FakeBrokerApi {
    pub fn publish(&self, sub_topic: &str, line: &str) {
        self.publish_bytes(sub_topic, line.as_bytes());
    }

    /// Publish a raw record, which need not be valid UTF-8.
    pub fn publish_bytes(&self, sub_topic: &str, line: &[u8]) {
        self.lines
            .lock()
            .unwrap()
            .entry(sub_topic.to_string())
            .or_default()
            .push(line.to_vec());
    }
}

async fn tail(
    State(api): State<FakeBrokerApi>,
    Query(params): Query<HashMap<String, String>>,
) -> Vec<u8> {
    let topic = params.get("topic").cloned().unwrap_or_default();
    api.requests.lock().unwrap().push(params);

    let lines = api.lines.lock().unwrap().get(&topic).cloned().unwrap_or_default();
    let mut body = Vec::new();
    for line in lines {
        body.extend_from_slice(&line);
        body.push(b'\n');
    }
    body
}

pub async fn spawn_broker_api() -> (SocketAddr, FakeBrokerApi) {
    let api = FakeBrokerApi::default();
    let router = Router::new()
        .route("/tail", get(tail))
        .with_state(api.clone());
    (spawn_server(router).await, api)
}
