//! Evrcap - Capture pipeline
//!
//! Discovers live matches on the configured game-server ports and records
//! them. One discovery task owns the registry; each recorded match gets a
//! [`MatchSession`] fed by a [`poller`] task and drained into its sinks.
//!
//! ```text
//! [Discovery] --probe--> game servers
//!      |
//!      +-- per match: [Poller] --Arc<Frame>--> [MatchSession] --> [FrameSink]
//! ```
//!
//! Cancellation is hierarchical: the supervisor token passed to
//! [`Discovery`] parents every session, poller, and sink token, so one
//! signal drains the whole tree.

pub mod client;
pub mod discovery;
pub mod outputs;
pub mod poller;
pub mod probe;
pub mod session;

pub use discovery::Discovery;
pub use outputs::SinkFactory;
pub use probe::{probe_session, Probe, ProbeError};
pub use session::{MatchSession, SessionError, SessionState};

/// URL of a game server's session endpoint.
pub(crate) fn session_endpoint(base_url: &str) -> String {
    format!("{base_url}/session")
}

/// URL of a game server's player bones endpoint.
pub(crate) fn bones_endpoint(base_url: &str) -> String {
    format!("{base_url}/player_bones")
}
