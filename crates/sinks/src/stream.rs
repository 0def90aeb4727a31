//! Stream sink
//!
//! Maintains a single persistent WebSocket connection to the remote
//! service's `/v3/stream` endpoint and writes each frame as a text message
//! carrying the JSON envelope. A ticker keeps the connection alive with
//! PINGs; a reader consumes server acks. Any read or write error stops the
//! sink - reconnection is a concern of a higher layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use evrcap_protocol::Frame;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::common::{SinkError, SinkMetrics, DEFAULT_QUEUE_SIZE};
use crate::envelope::frame_envelope;
use crate::handle::{SinkHandle, SinkKind};

/// Write deadline per outgoing message
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Keep-alive ping interval
const PING_INTERVAL: Duration = Duration::from_secs(50);

/// Read deadline; the server is assumed to send keep-alives inside this
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the stream sink
#[derive(Debug, Clone)]
pub struct StreamSinkConfig {
    /// Base URL of the remote service (http(s) or ws(s) scheme)
    pub base_url: String,

    /// Bearer credential sent on the handshake
    pub token: Option<String>,

    /// Optional `X-Node-ID` handshake header
    pub node_id: Option<String>,

    /// Optional `X-User-ID` handshake header
    pub user_id: Option<String>,

    /// Incoming queue capacity
    pub queue_size: usize,

    /// Per-message write deadline
    pub write_timeout: Duration,

    /// Keep-alive ping interval
    pub ping_interval: Duration,

    /// Read deadline
    pub read_timeout: Duration,
}

impl StreamSinkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            node_id: None,
            user_id: None,
            queue_size: DEFAULT_QUEUE_SIZE,
            write_timeout: WRITE_TIMEOUT,
            ping_interval: PING_INTERVAL,
            read_timeout: READ_TIMEOUT,
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
}

/// Acknowledgement message sent back by the server
#[derive(Debug, Deserialize)]
struct StreamAck {
    #[serde(default)]
    success: Option<bool>,

    #[serde(default)]
    error: Option<String>,
}

/// WebSocket stream sink task.
pub struct StreamSink {
    rx: mpsc::Receiver<Arc<Frame>>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    metrics: Arc<SinkMetrics>,

    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    config: StreamSinkConfig,
}

impl StreamSink {
    /// Establish the connection and start the writer task.
    ///
    /// A failed handshake surfaces here; once connected, any later error
    /// transitions the sink to Stopped without reconnecting.
    pub async fn connect(
        config: StreamSinkConfig,
        parent: &CancellationToken,
    ) -> Result<SinkHandle, SinkError> {
        let url = stream_url(&config.base_url)?;

        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| SinkError::connection(e.to_string()))?;
        let headers = request.headers_mut();
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                header_value(&format!("Bearer {token}"))?,
            );
        }
        if let Some(node_id) = &config.node_id {
            headers.insert("X-Node-ID", header_value(node_id)?);
        }
        if let Some(user_id) = &config.user_id {
            headers.insert("X-User-ID", header_value(user_id)?);
        }

        tracing::info!(url = %url, "connecting stream sink");
        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| SinkError::connection(e.to_string()))?;

        let (tx, rx) = mpsc::channel(config.queue_size);
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = parent.child_token();
        let metrics = Arc::new(SinkMetrics::new());

        let handle = SinkHandle::new(
            SinkKind::Stream,
            url.clone(),
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
            ws,
            url,
            config,
        };
        tokio::spawn(sink.run());

        Ok(handle)
    }

    async fn run(self) {
        let Self {
            mut rx,
            cancel,
            stopped,
            metrics,
            ws,
            url,
            config,
        } = self;

        let (mut write, mut read) = ws.split();

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + config.ping_interval,
            config.ping_interval,
        );
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let read_deadline = tokio::time::sleep(config.read_timeout);
        tokio::pin!(read_deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = ping.tick() => {
                    if let Err(err) = write.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(url = %url, error = %err, "websocket ping failed");
                        metrics.record_error();
                        break;
                    }
                }

                _ = &mut read_deadline => {
                    tracing::warn!(url = %url, "websocket read deadline exceeded");
                    metrics.record_error();
                    break;
                }

                message = read.next() => match message {
                    None => {
                        tracing::warn!(url = %url, "websocket closed by server");
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::warn!(url = %url, error = %err, "websocket read failed");
                        metrics.record_error();
                        break;
                    }
                    Some(Ok(message)) => {
                        read_deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + config.read_timeout);
                        consume_server_message(&url, message);
                    }
                },

                frame = rx.recv() => match frame {
                    None => break,
                    Some(frame) => {
                        let body = match frame_envelope(&frame) {
                            Ok(body) => body,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to build stream envelope");
                                metrics.record_error();
                                continue;
                            }
                        };

                        let bytes = body.len() as u64;
                        let send = write.send(Message::Text(body));
                        match tokio::time::timeout(config.write_timeout, send).await {
                            Err(_) => {
                                tracing::warn!(url = %url, "websocket write deadline exceeded");
                                metrics.record_error();
                                break;
                            }
                            Ok(Err(err)) => {
                                tracing::warn!(url = %url, error = %err, "websocket write failed");
                                metrics.record_error();
                                break;
                            }
                            Ok(Ok(())) => metrics.record_written(bytes),
                        }
                    }
                }
            }
        }

        let _ = tokio::time::timeout(
            Duration::from_secs(1),
            write.send(Message::Close(None)),
        )
        .await;
        rx.close();
        stopped.store(true, Ordering::Release);

        let snapshot = metrics.snapshot();
        tracing::info!(
            url = %url,
            delivered = snapshot.frames_written,
            bytes = snapshot.bytes_written,
            dropped = snapshot.frames_dropped,
            errors = snapshot.write_errors,
            "stream sink stopped"
        );
    }
}

/// Log server acks; anything else (pongs, binary) is ignored.
fn consume_server_message(url: &str, message: Message) {
    if let Message::Text(text) = message {
        if let Ok(ack) = serde_json::from_str::<StreamAck>(&text) {
            if ack.success == Some(false) {
                tracing::warn!(
                    url = %url,
                    error = ack.error.as_deref().unwrap_or("unspecified"),
                    "stream server reported error"
                );
            }
        }
    }
}

/// Map the remote service base URL onto the stream endpoint.
fn stream_url(base_url: &str) -> Result<String, SinkError> {
    let base = base_url.trim_end_matches('/');
    let socket_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(SinkError::connection(format!(
            "invalid stream URL {base_url:?}"
        )));
    };
    Ok(format!("{socket_base}/v3/stream"))
}

fn header_value(value: &str) -> Result<HeaderValue, SinkError> {
    HeaderValue::from_str(value)
        .map_err(|_| SinkError::connection(format!("invalid header value {value:?}")))
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
