//! Heartbeat-driven component liveness tracking
//!
//! Every component publishes periodic JSON heartbeats to its topic's heartbeat
//! channel. The master runs one ingestion task per known topic that tails that
//! channel through the topic's broker API and upserts each heartbeat into the
//! registry, keyed by `(host, port)`.
//!
//! ## How It Works
//!
//! ```text
//! HeartbeatTracker::run (every 30s)
//!   └─► list topics ─► ensure_tracked(topic) ─► spawn ingestion task (once)
//!
//! ingestion task (forever, until shutdown)
//!   ├─► resolve topic ─► tail heartbeat_topic (no empty lines)
//!   ├─► parse line ─► upsert_component   (malformed lines skipped)
//!   └─► stream failed or ended ─► warn, sleep 30s, start over
//! ```
//!
//! Tasks are never reaped when their topic is deleted; they keep retrying on
//! the backoff interval and resume if the topic comes back. Components that
//! stop heartbeating are not expired either.

use futures::StreamExt;
use logagg_registry::{Component, Namespace, RegistryError, RegistryStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker_api::{BrokerApiClient, BrokerApiError};

#[derive(Debug, Error)]
pub enum HeartbeatParseError {
    #[error("invalid heartbeat json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("heartbeat is not a JSON object")]
    NotAnObject,

    #[error("heartbeat missing field `{0}`")]
    MissingField(&'static str),
}

/// Parse one heartbeat record into the component it describes.
///
/// `host` and `port` are required; `port` may be a string or an integer.
/// `topic_name` falls back to `default_topic`, `namespace` to `other`. All
/// remaining keys are kept verbatim in `fields`.
pub fn parse_heartbeat(line: &str, default_topic: &str) -> Result<Component, HeartbeatParseError> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(line)? else {
        return Err(HeartbeatParseError::NotAnObject);
    };

    let host = match fields.remove("host") {
        Some(Value::String(host)) => host,
        _ => return Err(HeartbeatParseError::MissingField("host")),
    };
    let port = match fields.remove("port") {
        Some(Value::String(port)) => port,
        Some(Value::Number(port)) => port.to_string(),
        _ => return Err(HeartbeatParseError::MissingField("port")),
    };
    let namespace = match fields.remove("namespace") {
        Some(Value::String(ns)) => Namespace::from_name(&ns),
        _ => Namespace::Other,
    };
    let topic_name = match fields.remove("topic_name") {
        Some(Value::String(topic)) => topic,
        _ => default_topic.to_string(),
    };

    Ok(Component {
        host,
        port,
        namespace,
        topic_name,
        fields,
    })
}

#[derive(Debug, Error)]
enum IngestError {
    #[error("topic is no longer registered")]
    TopicGone,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    BrokerApi(#[from] BrokerApiError),
}

/// Reads one topic's heartbeat channel into the registry.
struct Ingestor {
    registry: Arc<dyn RegistryStore>,
    broker_api: BrokerApiClient,
    topic_name: String,
}

impl Ingestor {
    /// Consume the heartbeat stream until it ends or fails.
    async fn ingest_once(&self) -> Result<u64, IngestError> {
        let topic = self
            .registry
            .get_topic(&self.topic_name)
            .await?
            .ok_or(IngestError::TopicGone)?;

        info!(
            topic = %self.topic_name,
            heartbeat_topic = %topic.heartbeat_topic,
            api_address = %topic.api_address,
            "Updating components"
        );

        let mut lines = self
            .broker_api
            .tail(&topic, &topic.heartbeat_topic, false)
            .await?;

        let mut applied: u64 = 0;
        while let Some(line) = lines.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_heartbeat(&line, &self.topic_name) {
                Ok(component) => {
                    self.registry.upsert_component(component).await?;
                    applied += 1;
                }
                Err(e) => warn!(topic = %self.topic_name, error = %e, "Skipping malformed heartbeat"),
            }
        }

        Ok(applied)
    }

    async fn run(self, backoff: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.ingest_once() => match result {
                    Ok(applied) => warn!(
                        topic = %self.topic_name,
                        applied,
                        "Heartbeat stream ended, will try again"
                    ),
                    Err(e) => warn!(
                        topic = %self.topic_name,
                        error = %e,
                        "Cannot read heartbeats, will try again"
                    ),
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        debug!(topic = %self.topic_name, "Heartbeat ingestion stopped");
    }
}

struct TrackedTopic {
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Supervisor keeping exactly one ingestion task per known topic.
pub struct HeartbeatTracker {
    registry: Arc<dyn RegistryStore>,
    broker_api: BrokerApiClient,
    interval: Duration,
    tasks: Mutex<HashMap<String, TrackedTopic>>,
    shutdown: CancellationToken,
}

impl HeartbeatTracker {
    /// `interval` is both the supervisor period and the ingestion backoff.
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        broker_api: BrokerApiClient,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            broker_api,
            interval,
            tasks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start an ingestion task for `topic_name` unless one is already running.
    ///
    /// Returns true when a task was started.
    pub async fn ensure_tracked(&self, topic_name: &str) -> bool {
        let mut tasks = self.tasks.lock().await;

        if let Some(existing) = tasks.get(topic_name) {
            if !existing.join.is_finished() {
                return false;
            }
            warn!(topic = %topic_name, "Heartbeat ingestion task exited, restarting");
        }

        let cancel = self.shutdown.child_token();
        let ingestor = Ingestor {
            registry: Arc::clone(&self.registry),
            broker_api: self.broker_api.clone(),
            topic_name: topic_name.to_string(),
        };
        let join = tokio::spawn(ingestor.run(self.interval, cancel.clone()));
        tasks.insert(topic_name.to_string(), TrackedTopic { join, cancel });

        info!(topic = %topic_name, "Heartbeat tracking started");
        true
    }

    /// Topics with an ingestion task, sorted.
    pub async fn tracked_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.tasks.lock().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// One supervisor pass. Returns how many tasks were started.
    pub async fn sync_once(&self) -> Result<usize, RegistryError> {
        let mut started = 0;
        for topic in self.registry.list_topics().await? {
            if self.ensure_tracked(&topic.name).await {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Supervisor loop; runs until [`shutdown`](Self::shutdown).
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "Heartbeat supervisor started"
        );

        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tick.tick() => match self.sync_once().await {
                    Ok(0) => {}
                    Ok(started) => debug!(started, "Heartbeat supervisor started new tasks"),
                    Err(e) => warn!(error = %e, "Cannot list topics, will try again"),
                },
            }
        }

        info!("Heartbeat supervisor stopped");
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    /// Cancel the supervisor and every ingestion task, waiting for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<(String, TrackedTopic)> = self.tasks.lock().await.drain().collect();
        for (topic, task) in tasks {
            task.cancel.cancel();
            if let Err(e) = task.join.await {
                warn!(topic = %topic, error = %e, "Heartbeat ingestion task failed");
            }
        }
    }
}
