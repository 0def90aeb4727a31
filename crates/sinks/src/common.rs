//! Common types and utilities for sinks
//!
//! Shared error and counter types used by every sink variant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;

/// Default bounded queue capacity for a sink's incoming channel
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// How long a sink keeps draining buffered frames after cancellation
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Idle gap after which a draining sink considers its producers finished.
///
/// The session may still be forwarding its own backlog when the sink's
/// token fires (one supervisor signal cancels both at once), so the drain
/// waits for the queue to go quiet rather than trusting a snapshot of it.
pub const DRAIN_QUIESCENCE: Duration = Duration::from_millis(200);

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink has been closed or its drain task has exited
    #[error("sink is stopped")]
    Stopped,

    /// Bounded queue full; the frame was dropped
    #[error("sink queue full, frame dropped")]
    QueueFull,

    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// Connection error (for network sinks)
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every fan-out child rejected the frame
    #[error("all fan-out children rejected the frame")]
    FanOutExhausted,
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

/// Counters shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Frames accepted onto the queue
    pub frames_received: AtomicU64,

    /// Frames written to the destination
    pub frames_written: AtomicU64,

    /// Bytes written (pre-compression for file sinks)
    pub bytes_written: AtomicU64,

    /// Frames dropped (overflow or rejected payloads)
    pub frames_dropped: AtomicU64,

    /// Write errors encountered
    pub write_errors: AtomicU64,
}

impl SinkMetrics {
    /// Create new counters
    pub const fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Record a frame accepted onto the queue
    #[inline]
    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame written to the destination
    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a dropped frame
    #[inline]
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write error
    #[inline]
    pub fn record_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink counters
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub frames_dropped: u64,
    pub write_errors: u64,
}
