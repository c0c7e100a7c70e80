//! Log tail streaming proxy
//!
//! `tail_logs` relays a topic's logs channel from its broker API to the HTTP
//! client, batching records so the client sees at most one write per flush
//! interval while idle keepalives still pass straight through.
//!
//! ```text
//! broker api ──lines──► pump ──Bytes──► mpsc (bounded) ──► response body
//!                        │
//!                        ├─ record     → buffer "record\n"
//!                        ├─ keepalive  → flush buffer + "\n"
//!                        ├─ timer      → flush buffer
//!                        └─ client gone / upstream end → stop
//! ```
//!
//! The channel is bounded, so a slow client applies backpressure to the
//! upstream read instead of growing the buffer.

use axum::body::Body;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use logagg_registry::RegistryStore;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broker_api::BrokerApiClient;
use crate::error::{MasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Opening,
    Streaming,
    ClosedByClient,
    ClosedByUpstreamError,
}

/// Relay `upstream` into `sink` until either side goes away.
///
/// An empty upstream line is a keepalive. Returns the terminal state.
pub async fn pump<S, E>(mut upstream: S, sink: mpsc::Sender<Bytes>, flush_interval: Duration) -> TailState
where
    S: Stream<Item = std::result::Result<String, E>> + Unpin,
    E: Display,
{
    let mut buffer = BytesMut::new();
    let mut deadline = Instant::now() + flush_interval;

    loop {
        if sink.is_closed() {
            return TailState::ClosedByClient;
        }

        tokio::select! {
            biased;

            _ = sink.closed() => return TailState::ClosedByClient,

            _ = tokio::time::sleep_until(deadline) => {
                if !flush(&sink, &mut buffer).await {
                    return TailState::ClosedByClient;
                }
                deadline = Instant::now() + flush_interval;
            }

            next = upstream.next() => match next {
                Some(Ok(line)) if line.is_empty() => {
                    buffer.put_u8(b'\n');
                    if !flush(&sink, &mut buffer).await {
                        return TailState::ClosedByClient;
                    }
                    deadline = Instant::now() + flush_interval;
                }
                Some(Ok(line)) => {
                    buffer.extend_from_slice(line.as_bytes());
                    buffer.put_u8(b'\n');
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Tail upstream failed");
                    flush(&sink, &mut buffer).await;
                    return TailState::ClosedByUpstreamError;
                }
                None => {
                    debug!("Tail upstream ended");
                    flush(&sink, &mut buffer).await;
                    return TailState::ClosedByUpstreamError;
                }
            },
        }
    }
}

/// Send whatever is buffered. False once the client is gone.
async fn flush(sink: &mpsc::Sender<Bytes>, buffer: &mut BytesMut) -> bool {
    if buffer.is_empty() {
        return true;
    }
    sink.send(buffer.split().freeze()).await.is_ok()
}

/// Client side of an open tail.
pub struct TailStream {
    rx: mpsc::Receiver<Bytes>,
}

impl TailStream {
    /// Dropping the body drops the receiver, which stops the pump.
    pub fn into_body(self) -> Body {
        let chunks = futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        Body::from_stream(chunks)
    }
}

pub struct TailProxy {
    registry: Arc<dyn RegistryStore>,
    broker_api: BrokerApiClient,
    flush_interval: Duration,
    capacity: usize,
}

impl TailProxy {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        broker_api: BrokerApiClient,
        flush_interval: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            registry,
            broker_api,
            flush_interval,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to the logs channel of `topic_name`.
    pub async fn open(&self, topic_name: &str) -> Result<TailStream> {
        debug!(topic = %topic_name, state = ?TailState::Opening, "Opening tail");

        let topic = self
            .registry
            .get_topic(topic_name)
            .await?
            .ok_or_else(|| MasterError::TopicNotFound(topic_name.to_string()))?;

        let url = BrokerApiClient::tail_url(&topic);
        let upstream = self
            .broker_api
            .tail(&topic, &topic.logs_topic, true)
            .await
            .map_err(|e| {
                warn!(topic = %topic_name, url = %url, error = %e, "Cannot open tail upstream");
                MasterError::BrokerApiUnreachable(url.clone())
            })?;

        let (tx, rx) = mpsc::channel(self.capacity);
        let flush_interval = self.flush_interval;
        let name = topic_name.to_string();

        info!(topic = %name, logs_topic = %topic.logs_topic, state = ?TailState::Streaming, "Tail opened");
        tokio::spawn(async move {
            let state = pump(upstream, tx, flush_interval).await;
            info!(topic = %name, ?state, "Tail closed");
        });

        Ok(TailStream { rx })
    }
}
