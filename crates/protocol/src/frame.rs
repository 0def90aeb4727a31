//! Captured frame type
//!
//! A frame is the atomic unit emitted by a poller: the capture instant plus
//! the verbatim `/session` and `/player_bones` response bodies. Payloads stay
//! opaque end to end; the accessors below do targeted, borrow-only JSON
//! probes and never re-encode anything.

use bytes::Bytes;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use serde_json::value::RawValue;

/// One captured tick: timestamp + session payload + bones payload.
///
/// Frames travel the pipeline as `Arc<Frame>`, so they are immutable after
/// construction. The timestamp is the local capture instant, truncated to
/// millisecond precision (the on-disk record format carries milliseconds).
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture instant (UTC, millisecond precision)
    pub timestamp: DateTime<Utc>,

    /// Verbatim `/session` response body
    pub session: Bytes,

    /// Verbatim `/player_bones` response body
    pub bones: Bytes,
}

impl Frame {
    /// Build a frame stamped with the current wall-clock instant.
    pub fn capture(session: Bytes, bones: Bytes) -> Self {
        Self::with_timestamp(Utc::now(), session, bones)
    }

    /// Build a frame with an explicit timestamp (truncated to milliseconds).
    pub fn with_timestamp(timestamp: DateTime<Utc>, session: Bytes, bones: Bytes) -> Self {
        Self {
            timestamp: truncate_to_millis(timestamp),
            session,
            bones,
        }
    }

    /// Extract the `sessionid` field from the session payload.
    ///
    /// Returns `None` if the payload is not JSON, lacks the field, or the
    /// field is empty. The returned slice borrows from the payload.
    pub fn session_uuid(&self) -> Option<&str> {
        #[derive(Deserialize)]
        struct SessionId<'a> {
            #[serde(rename = "sessionid", borrow, default)]
            sessionid: Option<&'a str>,
        }

        let parsed: SessionId<'_> = serde_json::from_slice(&self.session).ok()?;
        parsed.sessionid.filter(|id| !id.is_empty())
    }

    /// Whether the session payload carries a non-empty `events` array.
    ///
    /// Used by the events sink's suppression policy; a payload that is not
    /// JSON or has no such array counts as event-free.
    pub fn has_events(&self) -> bool {
        #[derive(Deserialize)]
        struct EventsProbe<'a> {
            #[serde(borrow, default)]
            events: Vec<&'a RawValue>,
        }

        serde_json::from_slice::<EventsProbe<'_>>(&self.session)
            .map(|probe| !probe.events.is_empty())
            .unwrap_or(false)
    }

    /// Whether both payloads are empty.
    pub fn is_empty(&self) -> bool {
        self.session.is_empty() && self.bones.is_empty()
    }

    /// Whether the payloads are safe to embed in a tab-separated line record.
    ///
    /// The replay container stores payloads verbatim between tab separators;
    /// a raw tab or newline inside a payload would corrupt the record
    /// framing, so such frames are rejected at the file-sink boundary.
    pub fn payload_is_line_safe(&self) -> bool {
        !contains_line_breaking_byte(&self.session) && !contains_line_breaking_byte(&self.bones)
    }
}

fn contains_line_breaking_byte(payload: &[u8]) -> bool {
    payload.iter().any(|&b| b == b'\t' || b == b'\n')
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(ts.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(ts)
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod frame_test;
