//! API models for the RPC endpoints
//!
//! Every non-streaming response has the shape `{success, details?, ...payload}`.

use logagg_registry::{Broker, Component, Topic};
use serde::{Deserialize, Serialize};

/// Envelope shared by all non-streaming operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T = NoData> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Payload of responses that carry only `success`/`details`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NoData {}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            details: None,
            data,
        }
    }
}

impl ApiResponse<NoData> {
    pub fn ok_with_details(details: impl Into<String>) -> Self {
        Self {
            success: true,
            details: Some(details.into()),
            data: NoData {},
        }
    }

    pub fn failure(details: impl Into<String>) -> Self {
        Self {
            success: false,
            details: Some(details.into()),
            data: NoData {},
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BrokerList {
    pub brokers: Vec<Broker>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic_info: Topic,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentsInfo {
    pub components_info: Vec<Component>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackedFiles {
    pub fpaths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicDeleted {
    pub collectors_stopped: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// ---------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------

/// Missing credentials are treated as wrong ones.
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBrokerQuery {
    pub tcp_address: String,
    pub http_address: String,
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBrokerApiQuery {
    pub key: String,
    pub secret: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub topic_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTopicQuery {
    pub topic_name: String,
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterComponentQuery {
    pub namespace: String,
    pub topic_name: String,
    pub host: String,
    pub port: String,
}

#[derive(Debug, Deserialize)]
pub struct CollectorAddFileQuery {
    pub topic_name: String,
    pub collector_host: String,
    pub collector_port: String,
    pub fpath: String,
    pub formatter: String,
}

#[derive(Debug, Deserialize)]
pub struct CollectorRemoveFileQuery {
    pub topic_name: String,
    pub collector_host: String,
    pub collector_port: String,
    pub fpath: String,
}
