//! Frame poller
//!
//! Per-match task that fetches `/session` and `/player_bones` concurrently
//! at the configured rate, assembles frames, and offers them to the match
//! session. A tick that fails in any way is simply skipped; the next tick is
//! the natural retry. No successful dual fetch for five seconds means the
//! match is gone and the poller drains the session.

use bytes::{Bytes, BytesMut};
use evrcap_protocol::Frame;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use crate::session::{MatchSession, SessionError};
use crate::{bones_endpoint, session_endpoint};

/// No successful dual fetch within this window drains the session
const INACTIVITY_WINDOW: Duration = Duration::from_secs(5);

/// Back-off after a 404: the game is in transition between matches
const TRANSITION_BACKOFF: Duration = Duration::from_millis(500);

/// Pre-allocated response buffer size
const POLL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Poll a game server into `session` until cancellation, inactivity, or
/// session drift ends the match.
///
/// Closes the session on exit, whatever the reason.
pub async fn run_poller(client: reqwest::Client, session: MatchSession, interval: Duration) {
    let session_url = session_endpoint(session.base_url());
    let bones_url = bones_endpoint(session.base_url());
    let cancel = session.cancel_token().clone();

    let mut session_buf = BytesMut::with_capacity(POLL_BUFFER_CAPACITY);
    let mut bones_buf = BytesMut::with_capacity(POLL_BUFFER_CAPACITY);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let inactivity = tokio::time::sleep(INACTIVITY_WINDOW);
    tokio::pin!(inactivity);

    let mut request_count = 0u64;
    let mut frames_emitted = 0u64;
    let mut frames_dropped = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut inactivity => {
                tracing::debug!(
                    base_url = %session.base_url(),
                    "no successful fetch within the inactivity window, stopping"
                );
                break;
            }
            _ = ticker.tick() => {}
        }

        session_buf.reserve(POLL_BUFFER_CAPACITY);
        bones_buf.reserve(POLL_BUFFER_CAPACITY);
        request_count += 2;

        let (session_fetch, bones_fetch) = tokio::join!(
            fetch_body(&client, &session_url, &mut session_buf),
            fetch_body(&client, &bones_url, &mut bones_buf),
        );

        let (session_bytes, bones_bytes) = match (session_fetch, bones_fetch) {
            (Fetch::Body(session_bytes), Fetch::Body(bones_bytes)) => {
                (session_bytes, bones_bytes)
            }
            (Fetch::Transition, _) | (_, Fetch::Transition) => {
                // Game in transition between matches; ease off the server
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(TRANSITION_BACKOFF) => {}
                }
                continue;
            }
            _ => continue,
        };

        if session_bytes.is_empty() && bones_bytes.is_empty() {
            continue;
        }

        // Both halves arrived: the inactivity window restarts whether or not
        // the frame is ultimately enqueued.
        inactivity
            .as_mut()
            .reset(tokio::time::Instant::now() + INACTIVITY_WINDOW);

        let frame = Arc::new(Frame::capture(session_bytes, bones_bytes));
        match session.accept(frame) {
            Ok(()) => frames_emitted += 1,
            Err(SessionError::QueueFull) => {
                frames_dropped += 1;
                tracing::warn!(
                    base_url = %session.base_url(),
                    "session queue full, dropping frame"
                );
            }
            Err(SessionError::MissingUuid) => {
                tracing::warn!(
                    base_url = %session.base_url(),
                    "session payload revealed no UUID, skipping frame"
                );
            }
            Err(SessionError::Drift { .. }) | Err(SessionError::NotRunning) => break,
        }
    }

    session.close();
    tracing::debug!(
        base_url = %session.base_url(),
        request_count,
        frames_emitted,
        frames_dropped,
        "poller stopped"
    );
}

enum Fetch {
    /// 200 with the body read into the poll buffer
    Body(Bytes),
    /// 404: transient transition between matches
    Transition,
    /// Anything else: skip this tick
    Skip,
}

async fn fetch_body(client: &reqwest::Client, url: &str, buf: &mut BytesMut) -> Fetch {
    let mut response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(url, error = %err, "fetch failed");
            return Fetch::Skip;
        }
    };

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => return Fetch::Transition,
        status => {
            tracing::debug!(url, status = status.as_u16(), "unexpected status");
            return Fetch::Skip;
        }
    }

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(url, error = %err, "body read failed");
                buf.clear();
                return Fetch::Skip;
            }
        }
    }

    Fetch::Body(buf.split().freeze())
}
