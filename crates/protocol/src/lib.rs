//! Evrcap - Protocol
//!
//! Core data types shared across the capture pipeline:
//!
//! - [`Frame`] - one captured tick (timestamp + opaque session/bones payloads)
//! - [`SessionMeta`] - sparsely parsed `/session` response metadata
//! - [`Target`] - a `(host, port)` endpoint, expanded from CLI specs
//!
//! Payloads are carried verbatim as [`bytes::Bytes`]; the only inspection the
//! pipeline ever performs is the sparse extraction of the `sessionid` field
//! (and, for the events sink policy, the presence of an `events` array).

mod frame;
mod session_meta;
mod target;

pub use frame::Frame;
pub use session_meta::SessionMeta;
pub use target::{parse_target_spec, parse_targets, Target, TargetParseError};
