//! logagg master binary
//!
//! # Environment Variables
//!
//! Every flag can also be set from the environment:
//!
//! - `LOGAGG_HOST` / `LOGAGG_PORT`: listen address (default: 0.0.0.0:1088)
//! - `LOGAGG_REGISTRY`: SQLite registry file (default: ./data/logagg-registry.db)
//! - `LOGAGG_AUTH`: `key=<key>:secret=<secret>` (required)
//! - `LOGAGG_HEARTBEAT_INTERVAL_SECS`: heartbeat supervisor period (default: 30)
//! - `LOGAGG_BROKER_DEPTH_LIMIT`: depth limit of newly registered brokers
//! - `LOGAGG_TAIL_FLUSH_INTERVAL_MS`: tail batching period (default: 1000)
//! - `LOGAGG_TAIL_CHANNEL_CAPACITY`: chunks buffered per tail client (default: 64)
//! - `LOGAGG_COLLECTOR_TIMEOUT_SECS`: collector request timeout (default: 10)
//! - `LOGAGG_BROKER_CONNECT_TIMEOUT_SECS`: broker API connect timeout (default: 5)
//! - `RUST_LOG`: log filter (default: info)
//!
//! # Example
//!
//! ```bash
//! logagg-master --port 1088 --auth key=xyz:secret=xxxx
//! ```

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use logagg_master::config::{
    DEFAULT_BROKER_DEPTH_LIMIT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_TAIL_FLUSH_INTERVAL,
};
use logagg_master::shutdown::{shutdown_signal, DEFAULT_SHUTDOWN_TIMEOUT};
use logagg_master::{create_router, serve, AppState, AuthConfig, HeartbeatTracker, MasterConfig};
use logagg_registry::{RegistryStore, SqliteRegistryStore};

#[derive(Parser)]
#[command(name = "logagg-master")]
#[command(about = "Control plane for the logagg log-aggregation fleet", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "LOGAGG_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "LOGAGG_PORT", default_value_t = 1088)]
    port: u16,

    /// SQLite registry file
    #[arg(long, env = "LOGAGG_REGISTRY", default_value = "./data/logagg-registry.db")]
    registry: String,

    /// Service auth, format: key=<key>:secret=<secret>
    #[arg(long, env = "LOGAGG_AUTH")]
    auth: AuthConfig,

    /// Depth limit stamped on newly registered brokers
    #[arg(long, env = "LOGAGG_BROKER_DEPTH_LIMIT", default_value_t = DEFAULT_BROKER_DEPTH_LIMIT)]
    broker_depth_limit: i64,

    #[arg(long, env = "LOGAGG_HEARTBEAT_INTERVAL_SECS", default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_secs())]
    heartbeat_interval_secs: u64,

    #[arg(long, env = "LOGAGG_TAIL_FLUSH_INTERVAL_MS", default_value_t = DEFAULT_TAIL_FLUSH_INTERVAL.as_millis() as u64)]
    tail_flush_interval_ms: u64,

    /// Timeout of add_file/remove_file/stop requests to collectors
    #[arg(long, env = "LOGAGG_COLLECTOR_TIMEOUT_SECS", default_value_t = 10)]
    collector_timeout_secs: u64,

    /// Connect timeout towards broker API endpoints
    #[arg(long, env = "LOGAGG_BROKER_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    broker_connect_timeout_secs: u64,

    /// Chunks buffered between a tail upstream and its client
    #[arg(long, env = "LOGAGG_TAIL_CHANNEL_CAPACITY", default_value_t = 64)]
    tail_channel_capacity: usize,
}

impl Args {
    fn into_config(self) -> MasterConfig {
        MasterConfig {
            host: self.host,
            port: self.port,
            registry_path: self.registry,
            auth: self.auth,
            broker_depth_limit: self.broker_depth_limit,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            tail_flush_interval: Duration::from_millis(self.tail_flush_interval_ms.max(1)),
            collector_timeout: Duration::from_secs(self.collector_timeout_secs),
            broker_connect_timeout: Duration::from_secs(self.broker_connect_timeout_secs),
            tail_channel_capacity: self.tail_channel_capacity.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_config_field_has_a_flag() {
        let config = Args::try_parse_from([
            "logagg-master",
            "--auth",
            "key=xyz:secret=xxxx",
            "--port",
            "2088",
            "--broker-connect-timeout-secs",
            "7",
            "--tail-channel-capacity",
            "16",
        ])
        .unwrap()
        .into_config();

        assert_eq!(config.port, 2088);
        assert_eq!(config.auth, AuthConfig::new("xyz", "xxxx"));
        assert_eq!(config.broker_connect_timeout, Duration::from_secs(7));
        assert_eq!(config.tail_channel_capacity, 16);
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let config = Args::try_parse_from(["logagg-master", "--auth", "key=a:secret=b"])
            .unwrap()
            .into_config();
        let defaults = MasterConfig::default();

        assert_eq!(config.bind_address(), defaults.bind_address());
        assert_eq!(config.registry_path, defaults.registry_path);
        assert_eq!(config.broker_depth_limit, defaults.broker_depth_limit);
        assert_eq!(config.heartbeat_interval, defaults.heartbeat_interval);
        assert_eq!(config.tail_flush_interval, defaults.tail_flush_interval);
        assert_eq!(config.tail_channel_capacity, defaults.tail_channel_capacity);
        assert_eq!(config.collector_timeout, defaults.collector_timeout);
        assert_eq!(config.broker_connect_timeout, defaults.broker_connect_timeout);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();

    info!("logagg master starting");
    info!("  Registry: {}", config.registry_path);
    info!("  Listen: {}", config.bind_address());
    info!("  Heartbeat interval: {:?}", config.heartbeat_interval);

    if let Some(parent) = std::path::Path::new(&config.registry_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    let registry: Arc<dyn RegistryStore> = Arc::new(
        SqliteRegistryStore::new(&config.registry_path)
            .await
            .context("cannot open registry")?,
    );
    info!("✓ Registry opened");

    let (state, broker_api) =
        AppState::new(Arc::clone(&registry), &config).context("cannot build HTTP clients")?;

    let tracker = HeartbeatTracker::new(Arc::clone(&registry), broker_api, config.heartbeat_interval);
    let supervisor = tracker.spawn();

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("cannot bind {}", config.bind_address()))?;

    let stop = CancellationToken::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        let signal = shutdown_signal().await;
        info!("Received {}, initiating graceful shutdown", signal);
        signal_stop.cancel();
    });

    let drain_stop = stop.clone();
    let server = serve(listener, create_router(state), async move {
        drain_stop.cancelled().await
    });
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.context("server failed")?,
        _ = async {
            stop.cancelled().await;
            tokio::time::sleep(DEFAULT_SHUTDOWN_TIMEOUT).await;
        } => warn!("Shutdown timeout reached, closing open streams"),
    }

    tracker.shutdown().await;
    if let Err(e) = supervisor.await {
        warn!(error = %e, "Heartbeat supervisor failed");
    }

    info!("Server shut down gracefully");
    Ok(())
}
