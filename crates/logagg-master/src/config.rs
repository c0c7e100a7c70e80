//! Master configuration
//!
//! Defaults match the production deployment; the binary overrides them from
//! command-line arguments and `LOGAGG_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Depth limit stamped on every newly registered broker.
pub const DEFAULT_BROKER_DEPTH_LIMIT: i64 = 1_000_000;

/// Interval of the heartbeat supervisor and backoff of failed ingestion tasks.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound between two flushes of a tail stream.
pub const DEFAULT_TAIL_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Shared key/secret pair checked by equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub key: String,
    pub secret: String,
}

impl AuthConfig {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn check(&self, key: &str, secret: &str) -> bool {
        key == self.key && secret == self.secret
    }
}

/// Parses `key=<key>:secret=<secret>`.
impl FromStr for AuthConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = None;
        let mut secret = None;

        for part in s.split(':') {
            match part.split_once('=') {
                Some(("key", value)) => key = Some(value),
                Some(("secret", value)) => secret = Some(value),
                _ => return Err(format!("unexpected auth component `{}`", part)),
            }
        }

        match (key, secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok(Self::new(key, secret))
            }
            _ => Err("expected key=<key>:secret=<secret>".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Address the HTTP API binds to
    pub host: String,
    pub port: u16,

    /// SQLite registry file
    pub registry_path: String,

    pub auth: AuthConfig,

    pub broker_depth_limit: i64,

    pub heartbeat_interval: Duration,

    pub tail_flush_interval: Duration,

    /// Bounded channel between the upstream reader and the client body
    pub tail_channel_capacity: usize,

    /// Total timeout of add_file/remove_file/stop requests to collectors
    pub collector_timeout: Duration,

    /// Connect timeout towards broker API endpoints; streams themselves are unbounded
    pub broker_connect_timeout: Duration,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1088,
            registry_path: "./data/logagg-registry.db".to_string(),
            auth: AuthConfig::default(),
            broker_depth_limit: DEFAULT_BROKER_DEPTH_LIMIT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            tail_flush_interval: DEFAULT_TAIL_FLUSH_INTERVAL,
            tail_channel_capacity: 64,
            collector_timeout: Duration::from_secs(10),
            broker_connect_timeout: Duration::from_secs(5),
        }
    }
}

impl MasterConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
