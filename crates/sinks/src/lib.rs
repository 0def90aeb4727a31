//! Evrcap - Sinks
//!
//! Frame consumers for the capture pipeline. Each sink owns a bounded
//! `tokio` channel and a background drain task; producers hold a
//! [`SinkHandle`] and never block (overflow drops the newest frame).
//!
//! ```text
//! [Match Session] --Arc<Frame>--> [Sink Channel] --> [Sink Task] --> [Destination]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Destination | Queue policy |
//! |------|-------------|--------------|
//! | `replay` | `.echoreplay` / `.nevrcap` file | drop-newest, warn |
//! | `events` | HTTP POST `/lobby-session-events` | drop-newest, warn |
//! | `stream` | WebSocket `/v3/stream` | drop-newest, warn |
//! | `null` | discard | n/a |
//! | fan-out | N child sinks | per-child |
//!
//! All sinks expose the same four operations through [`FrameSink`]:
//! write, close (idempotent), is-stopped, cancellation handle.

/// Record codec and container formats for replay files
pub mod replay;

/// HTTP POST sink for the remote events API
pub mod events;

/// Persistent WebSocket sink for live streaming
pub mod stream;

/// Discard sink (backs `--format none`)
pub mod null;

/// JSON envelope shared by the remote sinks
mod envelope;

/// Sink handle, fan-out, and the tagged sink variant
mod handle;

/// Common types shared by all sinks (errors, counters)
mod common;

pub use common::{MetricsSnapshot, SinkError, SinkMetrics, DEFAULT_QUEUE_SIZE, DRAIN_TIMEOUT};
pub use envelope::frame_envelope;
pub use handle::{FanOutSink, FrameSink, SinkHandle, SinkKind};

pub use events::{EventsApiSink, EventsSinkConfig};
pub use null::NullSink;
pub use replay::{ReplayFileConfig, ReplayFileSink};
pub use stream::{StreamSink, StreamSinkConfig};
