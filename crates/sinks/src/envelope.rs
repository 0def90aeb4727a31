//! JSON envelope for remote delivery
//!
//! Remote sinks forward the captured payloads unparsed; the envelope embeds
//! them as raw JSON next to the capture timestamp. A payload that is empty
//! or not valid JSON is omitted rather than corrupting the document.

use chrono::{DateTime, Utc};
use evrcap_protocol::Frame;
use serde::Serialize;
use serde_json::value::RawValue;

#[derive(Serialize)]
struct Envelope<'a> {
    timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'a RawValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    bones: Option<&'a RawValue>,
}

/// Serialise a frame into the wire envelope used by the remote sinks.
pub fn frame_envelope(frame: &Frame) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        timestamp: frame.timestamp,
        session: raw_json(&frame.session),
        bones: raw_json(&frame.bones),
    })
}

fn raw_json(payload: &[u8]) -> Option<&RawValue> {
    if payload.is_empty() {
        return None;
    }
    serde_json::from_slice(payload).ok()
}
