//! Replay-file sink
//!
//! Consumes a match session's frames and appends them as compressed
//! newline-delimited records to a single file. One background task owns the
//! file; the queue is the producer-consumer boundary.
//!
//! Records accumulate in an in-memory chunk buffer that is written through
//! the compressor whenever it reaches the flush threshold. On close the
//! buffer is flushed, the compressor and container are finalised, and the
//! file is fsynced - in that order, with errors from each stage collected.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use evrcap_protocol::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{
    MetricsSnapshot, SinkError, SinkMetrics, DEFAULT_QUEUE_SIZE, DRAIN_QUIESCENCE, DRAIN_TIMEOUT,
};
use crate::handle::{SinkHandle, SinkKind};

pub mod codec;

use codec::ContainerWrite;

/// Chunk buffer flush threshold (2 MiB)
const FLUSH_THRESHOLD: usize = 2 * 1024 * 1024;

/// Initial chunk buffer capacity
const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Configuration for a replay-file sink
#[derive(Debug, Clone)]
pub struct ReplayFileConfig {
    /// Output file path; the extension selects the container format
    pub path: PathBuf,

    /// Incoming queue capacity
    pub queue_size: usize,

    /// Chunk buffer flush threshold in bytes
    pub flush_threshold: usize,
}

impl ReplayFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            queue_size: DEFAULT_QUEUE_SIZE,
            flush_threshold: FLUSH_THRESHOLD,
        }
    }

    /// Set the incoming queue capacity
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set the chunk buffer flush threshold
    #[must_use]
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }
}

/// Replay-file sink task.
///
/// Created via [`ReplayFileSink::spawn`], which opens the container, starts
/// the drain task, and returns the producer-side [`SinkHandle`].
pub struct ReplayFileSink {
    rx: mpsc::Receiver<Arc<Frame>>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    metrics: Arc<SinkMetrics>,

    path: PathBuf,
    container: Option<Box<dyn ContainerWrite>>,
    buf: BytesMut,
    flush_threshold: usize,
}

impl ReplayFileSink {
    /// Open the container and start the drain task.
    ///
    /// Fails fast if the file cannot be created, so a broken output
    /// directory surfaces at session setup rather than mid-match.
    pub fn spawn(
        config: ReplayFileConfig,
        parent: &CancellationToken,
    ) -> Result<SinkHandle, SinkError> {
        let kind = kind_for_path(&config.path)?;
        let container =
            codec::open_container(&config.path).map_err(|e| SinkError::Init(e.to_string()))?;

        let (tx, rx) = mpsc::channel(config.queue_size);
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = parent.child_token();
        let metrics = Arc::new(SinkMetrics::new());

        let handle = SinkHandle::new(
            kind,
            config.path.display().to_string(),
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
            path: config.path,
            container: Some(container),
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            flush_threshold: config.flush_threshold,
        };
        tokio::spawn(sink.run());

        Ok(handle)
    }

    async fn run(mut self) {
        tracing::debug!(path = %self.path.display(), "replay file sink starting");

        let mut failed = false;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = self.rx.recv() => match frame {
                    None => break,
                    Some(frame) => {
                        if let Err(err) = self.append(&frame) {
                            tracing::error!(
                                path = %self.path.display(),
                                error = %err,
                                "replay write failed, stopping sink"
                            );
                            self.metrics.record_error();
                            failed = true;
                            break;
                        }
                    }
                }
            }
        }

        // A write failure is terminal; queued frames would land in a broken
        // container, so only a healthy sink drains its backlog.
        if !failed {
            self.drain().await;
        }
        self.rx.close();

        for err in self.finalize() {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "replay file close stage failed"
            );
        }
        self.stopped.store(true, Ordering::Release);

        let snapshot: MetricsSnapshot = self.metrics.snapshot();
        tracing::info!(
            path = %self.path.display(),
            frames = snapshot.frames_written,
            bytes = snapshot.bytes_written,
            dropped = snapshot.frames_dropped,
            errors = snapshot.write_errors,
            "replay file written"
        );
    }

    /// Drain frames accepted before close.
    ///
    /// The session may still be flushing its own backlog into this sink
    /// when the token fires, so the drain keeps receiving until the queue
    /// stays quiet for [`DRAIN_QUIESCENCE`], bounded overall by
    /// [`DRAIN_TIMEOUT`].
    async fn drain(&mut self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        loop {
            match tokio::time::timeout(DRAIN_QUIESCENCE, self.rx.recv()).await {
                Ok(Some(frame)) => {
                    if self.append(&frame).is_err() {
                        self.metrics.record_error();
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => break,
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    path = %self.path.display(),
                    "drain deadline reached with frames still queued"
                );
                break;
            }
        }
    }

    fn append(&mut self, frame: &Frame) -> Result<(), SinkError> {
        // The record format frames payloads between tabs; a payload carrying
        // a raw tab or newline would corrupt the file, so it is rejected
        // here at the sink boundary.
        if !frame.payload_is_line_safe() {
            tracing::warn!(
                path = %self.path.display(),
                "payload contains tab or newline, rejecting frame"
            );
            self.metrics.record_dropped();
            return Ok(());
        }

        let bytes = codec::encode_record(&mut self.buf, frame);
        self.metrics.record_written(bytes as u64);

        if self.buf.len() >= self.flush_threshold {
            self.write_chunk()?;
        }
        Ok(())
    }

    fn write_chunk(&mut self) -> Result<(), SinkError> {
        if let Some(container) = self.container.as_mut() {
            container.write_chunk(&self.buf)?;
        }
        self.buf.clear();
        Ok(())
    }

    /// Flush the buffer, finalise compressor and container, fsync the file.
    /// Errors from each stage are collected rather than short-circuiting.
    fn finalize(&mut self) -> Vec<SinkError> {
        let mut errors = Vec::new();

        let Some(mut container) = self.container.take() else {
            return errors;
        };

        if !self.buf.is_empty() {
            if let Err(err) = container.write_chunk(&self.buf) {
                errors.push(err.into());
            }
            self.buf.clear();
        }

        match container.finish() {
            Ok(file) => {
                if let Err(err) = file.sync_all() {
                    errors.push(err.into());
                }
            }
            Err(err) => errors.push(err.into()),
        }

        errors
    }
}

fn kind_for_path(path: &Path) -> Result<SinkKind, SinkError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("echoreplay") => Ok(SinkKind::Replay),
        Some("nevrcap") => Ok(SinkKind::NevrCap),
        _ => Err(SinkError::init(format!(
            "unsupported replay extension in {:?}",
            path.display().to_string()
        ))),
    }
}

/// Output file name for a match: `rec_<UTC timestamp>_<uuid>.<ext>`.
pub fn session_filename(
    ts: chrono::DateTime<chrono::Utc>,
    session_uuid: &str,
    extension: &str,
) -> String {
    format!(
        "rec_{}_{}.{}",
        ts.format("%Y-%m-%d_%H-%M-%S"),
        session_uuid,
        extension
    )
}
