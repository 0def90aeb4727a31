//! Session probe
//!
//! Single-request check of a candidate endpoint. A probe distinguishes
//! "there is a match here" from the many flavours of "nothing to record":
//! connection refused (server off), 404 (no active session), and an empty
//! session UUID all map to [`Probe::Inactive`] rather than errors.

use evrcap_protocol::SessionMeta;
use reqwest::StatusCode;
use thiserror::Error;

use crate::session_endpoint;

/// Probe outcome for an endpoint that answered coherently.
#[derive(Debug)]
pub enum Probe {
    /// A live match, with its session metadata
    Active(SessionMeta),
    /// No match to record here right now
    Inactive,
}

/// Probe errors
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The game server answered 500: its API is switched off
    #[error("API access is disabled on the server")]
    ApiAccessDisabled,

    /// Status code outside the documented contract
    #[error("received non-OK response: {0}")]
    UnexpectedStatus(u16),

    /// 200 body that failed to parse as session metadata
    #[error("malformed session response: {0}")]
    Malformed(String),

    /// Transport-level failure (other than connection refused)
    #[error("probe request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Probe `base_url` for a live match.
pub async fn probe_session(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Probe, ProbeError> {
    let response = match client.get(session_endpoint(base_url)).send().await {
        Ok(response) => response,
        // A refused connection just means the server is off
        Err(err) if is_connection_refused(&err) => return Ok(Probe::Inactive),
        Err(err) => return Err(err.into()),
    };

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => return Ok(Probe::Inactive),
        StatusCode::INTERNAL_SERVER_ERROR => return Err(ProbeError::ApiAccessDisabled),
        status => return Err(ProbeError::UnexpectedStatus(status.as_u16())),
    }

    let body = response.bytes().await?;
    let meta: SessionMeta =
        serde_json::from_slice(&body).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    if !meta.is_active() {
        return Ok(Probe::Inactive);
    }
    Ok(Probe::Active(meta))
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    err.is_connect() && !err.is_timeout()
}

#[cfg(test)]
#[path = "probe_test.rs"]
mod probe_test;
