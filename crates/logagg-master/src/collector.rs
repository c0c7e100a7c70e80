//! HTTP client for collector agents
//!
//! Collectors expose `/collector/v1/{add_file,remove_file,stop}`. All calls are
//! best-effort: any transport failure (refused, reset, timeout) is reported as
//! [`CollectorError::Unreachable`]. A collector that is asked to stop usually
//! exits before answering, so callers of [`CollectorClient::stop`] read
//! `Unreachable` as "already stopped".

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("collector returned HTTP {0}")]
    Status(u16),

    #[error("invalid collector response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
}

impl CollectorError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, CollectorError::Unreachable(_))
    }
}

#[derive(Debug, Deserialize)]
struct FilesReply {
    #[serde(default)]
    result: Vec<String>,
}

#[derive(Clone)]
pub struct CollectorClient {
    client: Client,
}

impl CollectorClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Start tracking `fpath` with `formatter`; returns every tracked path.
    pub async fn add_file(
        &self,
        address: &str,
        fpath: &str,
        formatter: &str,
    ) -> Result<Vec<String>, CollectorError> {
        let url = format!("http://{}/collector/v1/add_file", address);
        self.files_request(&url, &[("fpath", fpath), ("formatter", formatter)])
            .await
    }

    /// Stop tracking `fpath`; returns the remaining tracked paths.
    pub async fn remove_file(&self, address: &str, fpath: &str) -> Result<Vec<String>, CollectorError> {
        let url = format!("http://{}/collector/v1/remove_file", address);
        self.files_request(&url, &[("fpath", fpath)]).await
    }

    pub async fn stop(&self, address: &str) -> Result<(), CollectorError> {
        let url = format!("http://{}/collector/v1/stop", address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(CollectorError::Unreachable)?;

        if !response.status().is_success() {
            return Err(CollectorError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn files_request(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<String>, CollectorError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(CollectorError::Unreachable)?;

        if !response.status().is_success() {
            return Err(CollectorError::Status(response.status().as_u16()));
        }

        let reply: FilesReply = response
            .json()
            .await
            .map_err(CollectorError::InvalidResponse)?;
        Ok(reply.result)
    }
}
