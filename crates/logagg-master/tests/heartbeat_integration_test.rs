//! Heartbeat ingestion against a fake broker API

mod common;

use std::time::Duration;

use common::*;
use logagg_master::HeartbeatTracker;
use logagg_registry::{Component, Namespace, RegistryStore};

async fn wait_for<F>(registry: &dyn RegistryStore, topic: &str, done: F) -> Vec<Component>
where
    F: Fn(&[Component]) -> bool,
{
    for _ in 0..100 {
        let components = registry.list_components(topic).await.unwrap();
        if done(&components) {
            return components;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached for topic {topic}");
}

#[tokio::test]
async fn test_heartbeat_overwrites_explicit_registration() {
    let master = test_master().await;
    let (api_addr, api) = spawn_broker_api().await;
    master.add_broker(api_addr).await;
    master.add_component("master", "logagg", "10.0.0.1", 1088).await;

    api.publish(
        "logagg_heartbeat#ephemeral",
        r#"{"host": "10.0.0.1", "port": 1088, "namespace": "collector", "topic_name": "logagg", "nbytes": 42}"#,
    );

    let tracker = HeartbeatTracker::new(
        master.registry.clone(),
        master.broker_api.clone(),
        Duration::from_millis(100),
    );
    assert_eq!(tracker.sync_once().await.unwrap(), 1);

    let components = wait_for(master.registry.as_ref(), "logagg", |c| {
        c.len() == 1 && c[0].namespace == Namespace::Collector
    })
    .await;
    assert_eq!(components[0].port, "1088");
    assert_eq!(components[0].fields["nbytes"], 42);

    {
        let requests = api.requests.lock().unwrap();
        assert_eq!(requests[0]["topic"], "logagg_heartbeat#ephemeral");
        assert_eq!(requests[0]["empty_lines"], "no");
    }

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_malformed_heartbeats_are_skipped() {
    let master = test_master().await;
    let (api_addr, api) = spawn_broker_api().await;
    master.add_broker(api_addr).await;
    master.add_component("master", "logagg", "10.0.0.1", 1088).await;

    api.publish("logagg_heartbeat#ephemeral", "not json");
    api.publish("logagg_heartbeat#ephemeral", r#"{"port": 9000}"#);
    api.publish(
        "logagg_heartbeat#ephemeral",
        r#"{"host": "10.0.0.2", "port": "9000", "namespace": "collector"}"#,
    );

    let tracker = HeartbeatTracker::new(
        master.registry.clone(),
        master.broker_api.clone(),
        Duration::from_millis(100),
    );
    tracker.sync_once().await.unwrap();

    let components = wait_for(master.registry.as_ref(), "logagg", |c| c.len() == 2).await;
    let collector = components.iter().find(|c| c.host == "10.0.0.2").unwrap();
    assert_eq!(collector.namespace, Namespace::Collector);
    assert_eq!(collector.topic_name, "logagg");

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_ingestion_retries_after_stream_ends() {
    let master = test_master().await;
    let (api_addr, api) = spawn_broker_api().await;
    master.add_broker(api_addr).await;
    master.add_component("master", "logagg", "10.0.0.1", 1088).await;

    let tracker = HeartbeatTracker::new(
        master.registry.clone(),
        master.broker_api.clone(),
        Duration::from_millis(100),
    );
    tracker.sync_once().await.unwrap();

    // Published after the first (empty) stream already ended.
    tokio::time::sleep(Duration::from_millis(150)).await;
    api.publish(
        "logagg_heartbeat#ephemeral",
        r#"{"host": "10.0.0.3", "port": 7000, "namespace": "broker_api"}"#,
    );

    let components = wait_for(master.registry.as_ref(), "logagg", |c| c.len() == 2).await;
    assert!(components
        .iter()
        .any(|c| c.host == "10.0.0.3" && c.namespace == Namespace::BrokerApi));
    assert!(api.requests.lock().unwrap().len() >= 2);

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_non_utf8_heartbeat_does_not_drop_later_records() {
    let master = test_master().await;
    let (api_addr, api) = spawn_broker_api().await;
    master.add_broker(api_addr).await;
    master.add_component("master", "logagg", "10.0.0.1", 1088).await;

    api.publish_bytes(
        "logagg_heartbeat#ephemeral",
        b"{\"host\": \"10.0.0.9\", \"port\": 9000, \"note\": \"\xff\xfe\"}",
    );
    api.publish_bytes("logagg_heartbeat#ephemeral", b"\xff\xfe\xfd");
    api.publish(
        "logagg_heartbeat#ephemeral",
        r#"{"host": "10.0.0.2", "port": 9000, "namespace": "collector"}"#,
    );

    // Backoff far longer than the wait below: the record must land from the
    // first stream, not a retry.
    let tracker = HeartbeatTracker::new(
        master.registry.clone(),
        master.broker_api.clone(),
        Duration::from_secs(60),
    );
    tracker.sync_once().await.unwrap();

    let components = wait_for(master.registry.as_ref(), "logagg", |c| {
        c.iter().any(|c| c.host == "10.0.0.2")
    })
    .await;
    assert!(components.iter().any(|c| c.host == "10.0.0.9"));
    assert_eq!(api.requests.lock().unwrap().len(), 1);

    tracker.shutdown().await;
}
