//! Bounded buffers for streamed output.

use secretary_client::{GpuMetrics, StreamEvent, Subscription};
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TRIM_TO: usize = 500;

/// Append-only buffer that drops its oldest entries in bulk.
///
/// When a push would exceed `capacity`, the buffer keeps only the newest
/// `trim_to` entries, so trimming happens once per `capacity - trim_to`
/// pushes instead of on every push.
#[derive(Debug, Clone)]
pub struct StreamBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
    trim_to: usize,
    dropped: u64,
}

impl<T> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TRIM_TO)
    }
}

impl<T> StreamBuffer<T> {
    pub fn new(capacity: usize, trim_to: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            trim_to: trim_to.clamp(1, capacity),
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.trim_to;
            self.entries.drain(..excess);
            self.dropped += excess as u64;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Entries discarded by trimming since creation or the last clear.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

/// Reads a subscription into buffers.
///
/// Chat chunks accumulate into the current reply, log lines and GPU samples
/// go to their own bounded buffers.
pub struct StreamConsumer {
    subscription: Option<Subscription>,
    lines: StreamBuffer<String>,
    samples: StreamBuffer<GpuMetrics>,
    reply: String,
    done: bool,
    error: Option<String>,
}

impl StreamConsumer {
    pub fn new(subscription: Subscription) -> Self {
        Self::with_limits(subscription, DEFAULT_CAPACITY, DEFAULT_TRIM_TO)
    }

    pub fn with_limits(subscription: Subscription, capacity: usize, trim_to: usize) -> Self {
        Self {
            subscription: Some(subscription),
            lines: StreamBuffer::new(capacity, trim_to),
            samples: StreamBuffer::new(capacity, trim_to),
            reply: String::new(),
            done: false,
            error: None,
        }
    }

    /// Next event, already applied to the buffers. `None` once the stream
    /// has ended or been closed.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        let event = match self.subscription.as_mut()?.next().await {
            Some(Ok(event)) => event,
            Some(Err(e)) => StreamEvent::Error {
                message: e.to_string(),
            },
            None => {
                self.subscription = None;
                return None;
            }
        };

        match &event {
            StreamEvent::Chunk { content } => self.reply.push_str(content),
            StreamEvent::Done { .. } => self.done = true,
            StreamEvent::Error { message } => self.error = Some(message.clone()),
            StreamEvent::Log { line } => self.lines.push(line.clone()),
            StreamEvent::Metrics(sample) => self.samples.push(sample.clone()),
        }
        Some(event)
    }

    /// Read until `done`, an error, or the end of the stream.
    pub async fn finish(&mut self) -> Result<&str, String> {
        while !self.done {
            match self.next().await {
                Some(StreamEvent::Error { message }) => return Err(message),
                Some(_) => {}
                None => break,
            }
        }
        Ok(&self.reply)
    }

    /// Swap in a new connection. Buffers start over; nothing is replayed.
    pub fn reconnect(&mut self, subscription: Subscription) {
        debug!("Stream reconnected, discarding {} buffered lines", self.lines.len());
        self.subscription = Some(subscription);
        self.lines.clear();
        self.samples.clear();
        self.reply.clear();
        self.done = false;
        self.error = None;
    }

    /// Close the connection, keeping what was received.
    pub fn close(&mut self) {
        self.subscription = None;
    }

    pub fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn lines(&self) -> &StreamBuffer<String> {
        &self.lines
    }

    pub fn samples(&self) -> &StreamBuffer<GpuMetrics> {
        &self.samples
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretary_client::SecretaryClient;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_overflow_keeps_latest_half() {
        let mut buffer = StreamBuffer::default();
        for i in 0..1000 {
            buffer.push(i);
        }
        assert_eq!(buffer.len(), 1000);

        buffer.push(1000);
        assert_eq!(buffer.len(), 500);
        assert_eq!(buffer.iter().next(), Some(&501));
        assert_eq!(buffer.last(), Some(&1000));
        assert_eq!(buffer.dropped(), 501);
    }

    #[test]
    fn test_tail() {
        let mut buffer = StreamBuffer::new(10, 5);
        for i in 0..4 {
            buffer.push(i);
        }
        assert_eq!(buffer.tail(2).copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(buffer.tail(10).count(), 4);
    }

    #[test]
    fn test_limits_are_clamped() {
        let mut buffer = StreamBuffer::new(3, 10);
        for i in 0..4 {
            buffer.push(i);
        }
        assert_eq!(buffer.len(), 3);
    }

    async fn subscribe(server: &MockServer, body: &'static str) -> Subscription {
        Mock::given(method("GET"))
            .and(path("/admin/finetune/train/log"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(server)
            .await;

        SecretaryClient::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .finetune()
            .tail_log()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_consumer_buffers_log_lines() {
        let server = MockServer::start().await;
        let subscription = subscribe(
            &server,
            "data: epoch 1\n\ndata: epoch 2\n\ndata: epoch 3\n\ndata: {\"type\":\"error\",\"message\":\"OOM\"}\n\n",
        )
        .await;

        let mut consumer = StreamConsumer::with_limits(subscription, 2, 1);
        while consumer.next().await.is_some() {}

        assert!(!consumer.is_open());
        assert_eq!(consumer.lines().iter().collect::<Vec<_>>(), vec!["epoch 3"]);
        assert_eq!(consumer.lines().dropped(), 2);
        assert_eq!(consumer.error(), Some("OOM"));
    }

    #[tokio::test]
    async fn test_reconnect_starts_empty() {
        let server = MockServer::start().await;
        let first = subscribe(&server, "data: one\n\n").await;

        let mut consumer = StreamConsumer::new(first);
        while consumer.next().await.is_some() {}
        assert_eq!(consumer.lines().len(), 1);

        let second = SecretaryClient::new(server.uri(), Duration::from_secs(5))
            .unwrap()
            .finetune()
            .tail_log()
            .await
            .unwrap();
        consumer.reconnect(second);
        assert!(consumer.lines().is_empty());
        assert!(consumer.is_open());
    }
}
