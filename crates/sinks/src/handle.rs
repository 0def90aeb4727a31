//! Sink handle and fan-out
//!
//! [`SinkHandle`] is the producer side of every sink: a bounded sender plus
//! the shared stopped flag and cancellation token of the drain task behind
//! it. The match session never knows a sink's concrete implementation; it
//! holds a [`FrameSink`], the tagged variant over a single handle or a
//! fan-out of children.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evrcap_protocol::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{SinkError, SinkMetrics};

/// Which destination a handle feeds; used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Replay,
    NevrCap,
    Events,
    Stream,
    Null,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::NevrCap => "nevrcap",
            Self::Events => "events",
            Self::Stream => "stream",
            Self::Null => "null",
        }
    }
}

/// Handle to a running sink task.
///
/// Writing is non-blocking: a full queue drops the frame (real-time
/// correctness outweighs completeness). `close()` signals the drain task via
/// the cancellation token and is idempotent; the task sets the shared
/// stopped flag once its cleanup is done.
pub struct SinkHandle {
    kind: SinkKind,

    /// Human-readable name for logging (e.g. the output path)
    name: String,

    tx: mpsc::Sender<Arc<Frame>>,

    /// Set by the drain task after cleanup completes
    stopped: Arc<AtomicBool>,

    cancel: CancellationToken,

    metrics: Arc<SinkMetrics>,
}

impl SinkHandle {
    pub(crate) fn new(
        kind: SinkKind,
        name: impl Into<String>,
        tx: mpsc::Sender<Arc<Frame>>,
        stopped: Arc<AtomicBool>,
        cancel: CancellationToken,
        metrics: Arc<SinkMetrics>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            tx,
            stopped,
            cancel,
            metrics,
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a frame without blocking.
    ///
    /// A closing sink still accepts frames until its drain task finishes;
    /// the session relies on this to flush its backlog during shutdown.
    pub fn write(&self, frame: Arc<Frame>) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Stopped);
        }

        match self.tx.try_send(frame) {
            Ok(()) => {
                self.metrics.record_received();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_dropped();
                tracing::warn!(
                    sink = %self.name,
                    kind = self.kind.as_str(),
                    "sink queue full, dropping frame"
                );
                Err(SinkError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Stopped),
        }
    }

    /// Signal the sink to drain and stop. Safe to call more than once.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the drain task has finished its cleanup.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Cancellation handle shared with the drain task.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Snapshot of this sink's counters.
    pub fn metrics_snapshot(&self) -> crate::common::MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("kind", &self.kind.as_str())
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Tagged sink variant behind the four-operation capability set.
///
/// A fan-out holds further `FrameSink`s, so the tree depth is unrestricted,
/// though in practice it is one.
#[derive(Debug)]
pub enum FrameSink {
    Handle(SinkHandle),
    FanOut(FanOutSink),
}

impl FrameSink {
    /// Write a frame; see the variant for queueing behaviour.
    pub fn write(&self, frame: Arc<Frame>) -> Result<(), SinkError> {
        match self {
            Self::Handle(handle) => handle.write(frame),
            Self::FanOut(fanout) => fanout.write(frame),
        }
    }

    /// Close the sink (idempotent).
    pub fn close(&self) {
        match self {
            Self::Handle(handle) => handle.close(),
            Self::FanOut(fanout) => fanout.close(),
        }
    }

    /// Whether the sink has reached its terminal state.
    pub fn is_stopped(&self) -> bool {
        match self {
            Self::Handle(handle) => handle.is_stopped(),
            Self::FanOut(fanout) => fanout.is_stopped(),
        }
    }
}

impl From<SinkHandle> for FrameSink {
    fn from(handle: SinkHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<FanOutSink> for FrameSink {
    fn from(fanout: FanOutSink) -> Self {
        Self::FanOut(fanout)
    }
}

/// Broadcasts each frame to every non-stopped child.
///
/// Partial failure is survivable: a write succeeds as long as at least one
/// child accepted the frame. Total failure surfaces to the caller as a
/// routine emission failure.
#[derive(Debug)]
pub struct FanOutSink {
    children: Vec<FrameSink>,
    closed: AtomicBool,
}

impl FanOutSink {
    pub fn new(children: Vec<FrameSink>) -> Self {
        Self {
            children,
            closed: AtomicBool::new(false),
        }
    }

    pub fn children(&self) -> &[FrameSink] {
        &self.children
    }

    /// Write to every live child; `Ok` iff at least one accepted.
    pub fn write(&self, frame: Arc<Frame>) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Stopped);
        }

        let mut delivered = 0usize;
        for child in &self.children {
            if child.is_stopped() {
                continue;
            }
            match child.write(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::debug!(error = %err, "fan-out child rejected frame");
                }
            }
        }

        if delivered == 0 {
            return Err(SinkError::FanOutExhausted);
        }
        Ok(())
    }

    /// Close every child (order insignificant) and stop accepting writes.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for child in &self.children {
            child.close();
        }
    }

    /// Terminal once every child has reached its terminal state.
    pub fn is_stopped(&self) -> bool {
        self.children.iter().all(FrameSink::is_stopped)
    }
}

#[cfg(test)]
#[path = "handle_test.rs"]
mod handle_test;
