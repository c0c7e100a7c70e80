//! Streaming client for broker API endpoints
//!
//! A broker API proxies "tail" reads from a broker topic as a long-lived HTTP
//! response of newline-delimited records. With `empty_lines=yes` it also emits
//! blank keepalive lines while the topic is idle.
//!
//! ```text
//! GET http://{api_address}/tail
//!     ?nsqd_tcp_address={tcp}&nsqd_http_address={http}&topic={sub_topic}&empty_lines=yes|no
//! ```
//!
//! Record content never ends a stream: bytes that are not UTF-8 are replaced
//! and over-long records are dropped. Only transport failures surface as
//! errors.

use bytes::BytesMut;
use futures::{Stream, TryStreamExt};
use logagg_registry::Topic;
use reqwest::Client;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::io::StreamReader;
use tracing::warn;

/// Maximum record size (1MB)
const MAX_RECORD_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum BrokerApiError {
    #[error("broker api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("broker api returned HTTP {0}")]
    Status(u16),

    #[error("broker api stream failed: {0}")]
    Read(#[from] io::Error),
}

/// Upstream records without their trailing newline; `""` is a keepalive.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, BrokerApiError>> + Send>>;

/// Newline-delimited record codec
///
/// Splits on `\n` at the byte level, strips a trailing `\r` and decodes each
/// record lossily. A record longer than `max_length` is skipped up to its
/// terminating newline.
pub struct RecordCodec {
    max_length: usize,
    /// Bytes of `src` already scanned without finding a newline
    next_index: usize,
    /// Inside an over-long record
    discarding: bool,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(MAX_RECORD_LENGTH)
    }
}

impl RecordCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    fn record(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl Decoder for RecordCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            let Some(end) = newline else {
                if src.len() > self.max_length {
                    if !self.discarding {
                        warn!(max_length = self.max_length, "Skipping over-long record");
                    }
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(end + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if end > self.max_length {
                warn!(max_length = self.max_length, "Skipping over-long record");
                continue;
            }
            return Ok(Some(Self::record(&line[..end])));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(record) = self.decode(src)? {
            return Ok(Some(record));
        }

        self.next_index = 0;
        if src.is_empty() || std::mem::take(&mut self.discarding) {
            src.clear();
            return Ok(None);
        }
        let rest = src.split();
        Ok(Some(Self::record(&rest)))
    }
}

#[derive(Clone)]
pub struct BrokerApiClient {
    client: Client,
}

impl BrokerApiClient {
    /// Only the connect phase is bounded; tail responses never complete.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }

    pub fn tail_url(topic: &Topic) -> String {
        format!("http://{}/tail", topic.api_address)
    }

    /// Open a tail subscription on `sub_topic` of the broker `topic` is bound to.
    pub async fn tail(
        &self,
        topic: &Topic,
        sub_topic: &str,
        empty_lines: bool,
    ) -> Result<LineStream, BrokerApiError> {
        let response = self
            .client
            .get(Self::tail_url(topic))
            .query(&[
                ("nsqd_tcp_address", topic.tcp_address.as_str()),
                ("nsqd_http_address", topic.http_address.as_str()),
                ("topic", sub_topic),
                ("empty_lines", if empty_lines { "yes" } else { "no" }),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrokerApiError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let lines = FramedRead::new(StreamReader::new(body), RecordCodec::default())
            .map_err(BrokerApiError::from);

        Ok(Box::pin(lines))
    }
}
