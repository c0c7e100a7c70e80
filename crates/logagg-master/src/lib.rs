//! logagg master
//!
//! Control plane of the logagg log-aggregation fleet. The master keeps a
//! registry of brokers, broker API endpoints, topics and components, binds new
//! topics to brokers, tracks component liveness from heartbeats, and proxies
//! live log tails to clients.
//!
//! ## Architecture
//!
//! ```text
//!   CLI / clients ──HTTP──► router (/logagg/v1/*)
//!                              │
//!            ┌─────────────────┼──────────────────┐
//!            ▼                 ▼                  ▼
//!     TopicLifecycle      TailProxy        HeartbeatTracker
//!       │      │              │                   │
//!       │      └─► collectors │ ◄── broker APIs ──┘
//!       ▼                     ▼
//!   RegistryStore (SQLite, unique keys as the only concurrency control)
//! ```

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use logagg_registry::RegistryStore;

pub mod assignment;
pub mod broker_api;
pub mod collector;
pub mod config;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod lifecycle;
pub mod models;
pub mod shutdown;
pub mod tail;

pub use config::{AuthConfig, MasterConfig};
pub use error::{MasterError, Result};
pub use heartbeat::HeartbeatTracker;
pub use lifecycle::{Registration, TopicLifecycle};
pub use tail::TailProxy;

use broker_api::BrokerApiClient;
use collector::CollectorClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RegistryStore>,
    pub lifecycle: Arc<TopicLifecycle>,
    pub collectors: CollectorClient,
    pub tail: Arc<TailProxy>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire every service from one registry handle and the configuration.
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        config: &MasterConfig,
    ) -> std::result::Result<(Self, BrokerApiClient), reqwest::Error> {
        let collectors = CollectorClient::new(config.collector_timeout)?;
        let broker_api = BrokerApiClient::new(config.broker_connect_timeout)?;

        let lifecycle = Arc::new(TopicLifecycle::new(
            Arc::clone(&registry),
            collectors.clone(),
            config.broker_depth_limit,
        ));
        let tail = Arc::new(TailProxy::new(
            Arc::clone(&registry),
            broker_api.clone(),
            config.tail_flush_interval,
            config.tail_channel_capacity,
        ));

        let state = Self {
            registry,
            lifecycle,
            collectors,
            tail,
            auth: config.auth.clone(),
        };
        Ok((state, broker_api))
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    use handlers::{auth, brokers, collectors, components, health, tail, topics};

    let api_routes = Router::new()
        .route("/ping", get(auth::ping))
        // Brokers
        .route("/register_broker", get(brokers::register_broker))
        .route("/get_brokers", get(brokers::get_brokers))
        .route("/register_broker_api", get(brokers::register_broker_api))
        // Topics
        .route("/get_topics", get(topics::get_topics))
        .route("/get_topic_info", get(topics::get_topic_info))
        .route("/delete_topic", get(topics::delete_topic))
        // Components
        .route("/register_component", get(components::register_component))
        .route("/get_components", get(components::get_components))
        // Collectors
        .route("/collector_add_file", get(collectors::collector_add_file))
        .route("/collector_remove_file", get(collectors::collector_remove_file))
        // Streaming
        .route("/tail_logs", get(tail::tail_logs))
        .with_state(state);

    Router::new()
        .nest("/logagg/v1", api_routes)
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `listener` until `shutdown` completes.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "logagg master listening");
        tracing::info!("   API: http://{}/logagg/v1/", addr);
        tracing::info!("   Health: http://{}/health", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
