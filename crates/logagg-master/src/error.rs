//! Error types for the logagg master
//!
//! Every variant is converted to `{success: false, details}` at the operation
//! boundary (see the `IntoResponse` impl); none of them crash the process.
//! Registry uniqueness conflicts never reach this type: they are resolved as
//! success inside the lifecycle operations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use logagg_registry::RegistryError;
use thiserror::Error;

use crate::collector::CollectorError;
use crate::models::ApiResponse;

pub type Result<T> = std::result::Result<T, MasterError>;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("Authentication failed")]
    AuthFailed,

    #[error("Topic not found")]
    TopicNotFound(String),

    #[error("Collector not found")]
    CollectorNotFound { host: String, port: String },

    #[error("Could not reach collector")]
    CollectorUnreachable(#[source] CollectorError),

    #[error("Collector request failed: {0}")]
    Collector(#[source] CollectorError),

    #[error("Cannot request broker api")]
    BrokerApiUnreachable(String),

    #[error("No broker in master to assign to topic")]
    NoBrokerAvailable,

    #[error("No broker api in master to assign to broker")]
    NoBrokerApiAvailable,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<CollectorError> for MasterError {
    fn from(e: CollectorError) -> Self {
        if e.is_unreachable() {
            MasterError::CollectorUnreachable(e)
        } else {
            MasterError::Collector(e)
        }
    }
}

impl IntoResponse for MasterError {
    fn into_response(self) -> Response {
        match &self {
            MasterError::Registry(e) => tracing::error!(error = %e, "Registry operation failed"),
            MasterError::BrokerApiUnreachable(url) => {
                tracing::error!(url = %url, "Cannot request broker api")
            }
            other => tracing::debug!(error = %other, "Request failed"),
        }

        (StatusCode::OK, Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}
