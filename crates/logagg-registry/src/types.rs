//! Registry entity types
//!
//! Every entity has a unique key enforced by the backing store:
//!
//! | Entity      | Unique key                     |
//! |-------------|--------------------------------|
//! | `Broker`    | `(tcp_address, http_address)`  |
//! | `BrokerApi` | `(host, port)`                 |
//! | `Topic`     | `name`                         |
//! | `Component` | `(host, port)`                 |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Suffix of the per-topic heartbeat channel.
pub const HEARTBEAT_TOPIC_SUFFIX: &str = "_heartbeat#ephemeral";

/// Suffix of the per-topic log channel.
pub const LOGS_TOPIC_SUFFIX: &str = "_logs";

/// A message-queue node.
///
/// Created on explicit registration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    /// TCP ingest address (e.g., "10.0.1.5:4150")
    pub tcp_address: String,

    /// HTTP control address (e.g., "10.0.1.5:4151")
    pub http_address: String,

    /// Maximum queue depth configured for this broker
    pub depth_limit: i64,

    /// Broker API endpoint ("host:port") that proxies reads for this broker
    pub api_address: String,
}

/// An endpoint that can proxy streaming tail reads from brokers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerApi {
    pub host: String,
    pub port: u16,
}

impl BrokerApi {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A logical log channel.
///
/// The broker fields are a snapshot of the broker assigned at creation time,
/// not a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "topic_name")]
    pub name: String,
    pub tcp_address: String,
    pub http_address: String,
    pub depth_limit: i64,
    pub api_address: String,
    pub heartbeat_topic: String,
    pub logs_topic: String,
}

impl Topic {
    /// Build a topic record bound to `broker`, deriving the sub-topic names.
    pub fn assign(name: &str, broker: &Broker) -> Self {
        Self {
            name: name.to_string(),
            tcp_address: broker.tcp_address.clone(),
            http_address: broker.http_address.clone(),
            depth_limit: broker.depth_limit,
            api_address: broker.api_address.clone(),
            heartbeat_topic: format!("{name}{HEARTBEAT_TOPIC_SUFFIX}"),
            logs_topic: format!("{name}{LOGS_TOPIC_SUFFIX}"),
        }
    }
}

/// Role of a registered process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Master,
    Collector,
    BrokerApi,
    #[serde(other)]
    Other,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Master => "master",
            Namespace::Collector => "collector",
            Namespace::BrokerApi => "broker_api",
            Namespace::Other => "other",
        }
    }

    /// Lenient parse; anything unrecognised is `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "master" => Namespace::Master,
            "collector" => Namespace::Collector,
            "broker_api" => Namespace::BrokerApi,
            _ => Namespace::Other,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a component: at most one row exists per `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub host: String,
    pub port: String,
}

/// Any registered process in the fleet.
///
/// Explicit registrations and heartbeats write the same rows; whichever comes
/// last replaces every stored field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub host: String,

    /// Kept as a string so `"1088"` and `1088` land on the same identity
    pub port: String,

    pub namespace: Namespace,

    pub topic_name: String,

    /// Free-form heartbeat attributes (timestamps, counters, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Component {
    pub fn new(namespace: Namespace, topic_name: &str, host: &str, port: &str) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
            namespace,
            topic_name: topic_name.to_string(),
            fields: Map::new(),
        }
    }

    pub fn key(&self) -> ComponentKey {
        ComponentKey {
            host: self.host.clone(),
            port: self.port.clone(),
        }
    }

    /// "host:port" network address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> Broker {
        Broker {
            tcp_address: "localhost:4150".to_string(),
            http_address: "localhost:4151".to_string(),
            depth_limit: 1_000_000,
            api_address: "localhost:1077".to_string(),
        }
    }

    #[test]
    fn test_topic_assign_derives_sub_topics() {
        let topic = Topic::assign("logagg", &broker());
        assert_eq!(topic.heartbeat_topic, "logagg_heartbeat#ephemeral");
        assert_eq!(topic.logs_topic, "logagg_logs");
        assert_eq!(topic.api_address, "localhost:1077");
        assert_eq!(topic.depth_limit, 1_000_000);
    }

    #[test]
    fn test_namespace_parsing() {
        assert_eq!(Namespace::from_name("collector"), Namespace::Collector);
        assert_eq!(Namespace::from_name("broker_api"), Namespace::BrokerApi);
        assert_eq!(Namespace::from_name("forwarder"), Namespace::Other);

        let ns: Namespace = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(ns, Namespace::Other);
    }

    #[test]
    fn test_component_serializes_flat() {
        let mut component = Component::new(Namespace::Collector, "logagg", "10.0.0.1", "1088");
        component
            .fields
            .insert("timestamp".to_string(), Value::from(1_700_000_000));

        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["host"], "10.0.0.1");
        assert_eq!(json["namespace"], "collector");
        assert_eq!(json["timestamp"], 1_700_000_000);

        let back: Component = serde_json::from_value(json).unwrap();
        assert_eq!(back, component);
    }

    #[test]
    fn test_topic_serializes_with_topic_name_key() {
        let json = serde_json::to_value(Topic::assign("logagg", &broker())).unwrap();
        assert_eq!(json["topic_name"], "logagg");
    }
}
