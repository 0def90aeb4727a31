//! HTTP client construction
//!
//! Two clients with different timeout envelopes: probing tolerates very
//! little (a probe against a dead port must fail fast), polling keeps warm
//! connections to servers it records from.

use std::time::Duration;

/// User-Agent sent on every request to a game server
pub const USER_AGENT: &str = concat!("evrcap/", env!("CARGO_PKG_VERSION"));

/// Client used by the discovery probe: 3 s overall, 1 s connect.
pub fn probe_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(3))
        .connect_timeout(Duration::from_secs(1))
        .build()
}

/// Client used by pollers: 3 s overall, 2 s connect, small warm pool.
pub fn polling_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(3))
        .connect_timeout(Duration::from_secs(2))
        .pool_idle_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(2)
        .tcp_keepalive(Duration::from_secs(5))
        .build()
}
