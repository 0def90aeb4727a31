//! Events API sink
//!
//! Posts each frame's JSON envelope to the remote service's
//! `/lobby-session-events` endpoint. Delivery is best-effort: failures are
//! logged and never retried; the next frame is the natural retry.
//!
//! Frames whose session payload carries no events are suppressed by default
//! (the remote service only cares about event-bearing ticks); the policy is
//! configurable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use evrcap_protocol::Frame;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{SinkError, SinkMetrics, DEFAULT_QUEUE_SIZE, DRAIN_QUIESCENCE, DRAIN_TIMEOUT};
use crate::envelope::frame_envelope;
use crate::handle::{SinkHandle, SinkKind};

/// Request timeout for each POST
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the events sink
#[derive(Debug, Clone)]
pub struct EventsSinkConfig {
    /// Base URL of the remote service
    pub base_url: String,

    /// Bearer credential
    pub token: Option<String>,

    /// Optional `X-Node-ID` header value
    pub node_id: Option<String>,

    /// Optional `X-User-ID` header value
    pub user_id: Option<String>,

    /// Incoming queue capacity
    pub queue_size: usize,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Skip frames whose payload carries no events
    pub suppress_eventless: bool,
}

impl EventsSinkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            node_id: None,
            user_id: None,
            queue_size: DEFAULT_QUEUE_SIZE,
            request_timeout: REQUEST_TIMEOUT,
            suppress_eventless: true,
        }
    }

    /// Set the bearer credential
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the node identification header
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set the user identification header
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set whether event-free frames are suppressed
    #[must_use]
    pub fn with_suppress_eventless(mut self, suppress: bool) -> Self {
        self.suppress_eventless = suppress;
        self
    }

    /// Set the incoming queue capacity
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }
}

/// Acknowledgement body returned by the events endpoint
#[derive(Debug, Deserialize)]
struct EventsAck {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    error: Option<String>,
}

/// Events API sink task.
pub struct EventsApiSink {
    rx: mpsc::Receiver<Arc<Frame>>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    metrics: Arc<SinkMetrics>,

    client: reqwest::Client,
    endpoint: String,
    config: EventsSinkConfig,
}

impl EventsApiSink {
    /// Build the HTTP client and start the sender task.
    pub fn spawn(
        config: EventsSinkConfig,
        parent: &CancellationToken,
    ) -> Result<SinkHandle, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SinkError::init(e.to_string()))?;

        let endpoint = format!(
            "{}/lobby-session-events",
            config.base_url.trim_end_matches('/')
        );

        let (tx, rx) = mpsc::channel(config.queue_size);
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = parent.child_token();
        let metrics = Arc::new(SinkMetrics::new());

        let handle = SinkHandle::new(
            SinkKind::Events,
            endpoint.clone(),
            tx,
            Arc::clone(&stopped),
            cancel.clone(),
            Arc::clone(&metrics),
        );

        let sink = Self {
            rx,
            cancel,
            stopped,
            metrics,
            client,
            endpoint,
            config,
        };
        tokio::spawn(sink.run());

        Ok(handle)
    }

    async fn run(mut self) {
        tracing::debug!(endpoint = %self.endpoint, "events sink starting");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = self.rx.recv() => match frame {
                    None => break,
                    Some(frame) => self.deliver(&frame).await,
                }
            }
        }

        // Flush the backlog: the session may still be forwarding frames
        // when the token fires, so keep receiving until the queue stays
        // quiet, bounded overall by the drain deadline.
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        loop {
            match tokio::time::timeout(DRAIN_QUIESCENCE, self.rx.recv()).await {
                Ok(Some(frame)) => {
                    if tokio::time::timeout_at(deadline, self.deliver(&frame))
                        .await
                        .is_err()
                    {
                        tracing::warn!(
                            endpoint = %self.endpoint,
                            "drain deadline reached with frames still queued"
                        );
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
        self.rx.close();
        self.stopped.store(true, Ordering::Release);

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            endpoint = %self.endpoint,
            delivered = snapshot.frames_written,
            dropped = snapshot.frames_dropped,
            errors = snapshot.write_errors,
            "events sink stopped"
        );
    }

    async fn deliver(&self, frame: &Frame) {
        if self.config.suppress_eventless && !frame.has_events() {
            return;
        }

        let body = match frame_envelope(frame) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build event envelope");
                self.metrics.record_error();
                return;
            }
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        if let Some(node_id) = &self.config.node_id {
            request = request.header("X-Node-ID", node_id);
        }
        if let Some(user_id) = &self.config.user_id {
            request = request.header("X-User-ID", user_id);
        }

        match request.send().await {
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "event delivery failed");
                self.metrics.record_error();
            }
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    status = response.status().as_u16(),
                    "events endpoint rejected frame"
                );
                self.metrics.record_error();
            }
            Ok(response) => {
                match response.json::<EventsAck>().await {
                    Ok(ack) if !ack.success => {
                        tracing::warn!(
                            endpoint = %self.endpoint,
                            error = ack.error.as_deref().unwrap_or("unspecified"),
                            "events endpoint reported failure"
                        );
                        self.metrics.record_error();
                    }
                    // An unparseable ack still counts as delivered
                    _ => self.metrics.record_written(0),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;
