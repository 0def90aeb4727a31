//! Match session
//!
//! Per-match lifecycle: a bounded frame queue between the poller and the
//! sinks, plus the state machine Running → Draining → Stopped. The session
//! is the one component that inspects frame contents, and only to hold the
//! poller to the expected session UUID: a frame with a different UUID marks
//! the end of the match (the server started a new one on the same port) and
//! drains the session.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evrcap_protocol::Frame;
use evrcap_sinks::{FrameSink, SinkError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Session frame queue capacity
const SESSION_QUEUE_SIZE: usize = 1000;

/// How long the session keeps forwarding queued frames after cancellation
const DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// How long the session waits for its sinks to reach their terminal state
const SINK_STOP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Draining,
    Stopped,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Errors surfaced to the poller by `accept`
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is draining or stopped
    #[error("session is not accepting frames")]
    NotRunning,

    /// The frame's session payload revealed no UUID; it must not be emitted
    #[error("frame does not reveal a session UUID")]
    MissingUuid,

    /// The observed UUID differs from the session's: end of match
    #[error("session UUID changed (expected {expected}, observed {observed})")]
    Drift { expected: String, observed: String },

    /// Queue full; the frame was dropped rather than blocking the poller
    #[error("session queue full, frame dropped")]
    QueueFull,
}

struct SessionInner {
    base_url: String,
    match_id: String,
    created_at: DateTime<Utc>,
    state: AtomicU8,
    tx: mpsc::Sender<Arc<Frame>>,
    cancel: CancellationToken,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle to a recording match session.
///
/// Cheap to clone; the poller produces through `accept` while the session's
/// own task consumes the queue and feeds the sinks.
#[derive(Clone)]
pub struct MatchSession {
    inner: Arc<SessionInner>,
}

impl MatchSession {
    /// Create the session and start its drain task.
    pub fn spawn(
        parent: &CancellationToken,
        base_url: impl Into<String>,
        match_id: impl Into<String>,
        sink: FrameSink,
    ) -> Self {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_SIZE);

        let inner = Arc::new(SessionInner {
            base_url: base_url.into(),
            match_id: match_id.into(),
            created_at: Utc::now(),
            state: AtomicU8::new(SessionState::Running as u8),
            tx,
            cancel: parent.child_token(),
        });

        tokio::spawn(run(Arc::clone(&inner), rx, sink));

        Self { inner }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn match_id(&self) -> &str {
        &self.inner.match_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Cancellation handle shared with the poller and the sinks.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Offer a frame to the session.
    ///
    /// Never blocks. Enforces the UUID invariant: a frame that does not
    /// reveal a UUID is rejected, and a frame revealing a *different* UUID
    /// transitions the session to Draining and is not enqueued.
    pub fn accept(&self, frame: Arc<Frame>) -> Result<(), SessionError> {
        if self.inner.state() != SessionState::Running || self.inner.cancel.is_cancelled() {
            return Err(SessionError::NotRunning);
        }

        let Some(observed) = frame.session_uuid() else {
            return Err(SessionError::MissingUuid);
        };

        if observed != self.inner.match_id {
            let drift = SessionError::Drift {
                expected: self.inner.match_id.clone(),
                observed: observed.to_string(),
            };
            tracing::info!(
                base_url = %self.inner.base_url,
                expected = %self.inner.match_id,
                observed = %observed,
                "session UUID changed, draining session"
            );
            self.close();
            return Err(drift);
        }

        match self.inner.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SessionError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::NotRunning),
        }
    }

    /// Begin draining the session. Idempotent.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    /// Whether the session has fully stopped (sinks closed).
    pub fn is_stopped(&self) -> bool {
        self.inner.state() == SessionState::Stopped
    }
}

impl std::fmt::Debug for MatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSession")
            .field("base_url", &self.inner.base_url)
            .field("match_id", &self.inner.match_id)
            .field("state", &self.inner.state())
            .finish()
    }
}

/// Session drain task: forwards queued frames into the sink tree, then
/// shepherds the shutdown sequence.
async fn run(inner: Arc<SessionInner>, mut rx: mpsc::Receiver<Arc<Frame>>, sink: FrameSink) {
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                None => break,
                Some(frame) => {
                    dispatch(&inner, &sink, frame);
                    if sink.is_stopped() {
                        tracing::warn!(
                            base_url = %inner.base_url,
                            match_id = %inner.match_id,
                            "all sinks stopped, draining session"
                        );
                        break;
                    }
                }
            }
        }
    }

    inner.set_state(SessionState::Draining);

    // Forward frames accepted before the transition. `accept` rejects once
    // the state leaves Running, so the backlog is fully visible to try_recv;
    // the deadline only guards against pathologically slow sinks.
    let deadline = std::time::Instant::now() + DRAIN_TIMEOUT;
    while let Ok(frame) = rx.try_recv() {
        dispatch(&inner, &sink, frame);
        if std::time::Instant::now() >= deadline {
            break;
        }
    }
    rx.close();

    sink.close();
    let stop_deadline = tokio::time::Instant::now() + SINK_STOP_TIMEOUT;
    while !sink.is_stopped() && tokio::time::Instant::now() < stop_deadline {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }

    inner.set_state(SessionState::Stopped);
    tracing::info!(
        base_url = %inner.base_url,
        match_id = %inner.match_id,
        "match session stopped"
    );
}

fn dispatch(inner: &SessionInner, sink: &FrameSink, frame: Arc<Frame>) {
    match sink.write(frame) {
        Ok(()) => {}
        Err(SinkError::FanOutExhausted) | Err(SinkError::Stopped) => {
            tracing::debug!(
                base_url = %inner.base_url,
                "no sink accepted the frame"
            );
        }
        Err(err) => {
            tracing::debug!(base_url = %inner.base_url, error = %err, "sink write failed");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
