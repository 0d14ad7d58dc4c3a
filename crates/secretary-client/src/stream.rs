//! Server-sent event subscriptions.
//!
//! A [`Subscription`] owns the task that reads the HTTP body. Dropping or
//! closing it aborts the task, which drops the response and closes the
//! connection. Reconnecting means opening a new subscription; nothing is
//! replayed.

use crate::error::ClientError;
use crate::types::GpuMetrics;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Typed event pushed by a streaming endpoint, dispatched on its `type` field.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk { content: String },
    /// End of a response.
    Done {
        #[serde(default)]
        message_id: Option<String>,
    },
    /// Backend-side failure reported in-band.
    Error { message: String },
    /// One line of a log tail.
    Log {
        #[serde(alias = "message")]
        line: String,
    },
    /// GPU sample from the monitoring stream.
    Metrics(GpuMetrics),
}

impl StreamEvent {
    /// Decode one `data:` payload.
    ///
    /// Log tails may push bare text lines; those become [`StreamEvent::Log`].
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                if payload.trim_start().starts_with('{') {
                    warn!("Skipping undecodable event: {}", e);
                    None
                } else {
                    Some(StreamEvent::Log {
                        line: payload.to_string(),
                    })
                }
            }
        }
    }
}

/// Incremental SSE decoder.
///
/// Accepts arbitrary byte chunks (events and even UTF-8 sequences may be split
/// across network reads) and yields the `data` payload of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning payloads of events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(payload) = self.take_event() {
                    out.push(payload);
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
            // `event:`, `id:`, `retry:` and comments carry nothing we dispatch on.
        }

        out
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).trim_end().to_string();
            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.trim_start().to_string());
            }
        }
        self.take_event()
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload == "[DONE]" {
            None
        } else {
            Some(payload)
        }
    }
}

/// Cancellable handle over a streaming endpoint.
pub struct Subscription {
    receiver: mpsc::Receiver<Result<StreamEvent, ClientError>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn(response: reqwest::Response, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);

        let task = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = sender.send(Err(ClientError::Stream(e.to_string()))).await;
                        return;
                    }
                };

                for payload in decoder.push(&bytes) {
                    if let Some(event) = StreamEvent::parse(&payload) {
                        if sender.send(Ok(event)).await.is_err() {
                            debug!("Subscriber went away, closing stream");
                            return;
                        }
                    }
                }
            }

            if let Some(event) = decoder.finish().and_then(|p| StreamEvent::parse(&p)) {
                let _ = sender.send(Ok(event)).await;
            }
            debug!("Event stream ended");
        });

        Self { receiver, task }
    }

    /// Next event, or `None` once the stream has ended or been closed.
    pub async fn next(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        self.receiver.recv().await
    }

    /// Close the underlying connection.
    pub fn close(self) {
        drop(self);
    }

    /// Whether the reader task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
