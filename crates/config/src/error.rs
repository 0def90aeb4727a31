//! Configuration errors

use thiserror::Error;

/// Fatal configuration errors; all of these must surface before any polling
/// begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Frequency must be a positive integer (Hz)
    #[error("polling frequency must be a positive integer, got {0}")]
    InvalidFrequency(u32),

    /// Unknown output format name
    #[error("unknown output format {0:?} (expected replay, nevrcap, stream, or none)")]
    UnknownFormat(String),

    /// Empty format list
    #[error("at least one output format is required")]
    NoFormats,

    /// Remote URL is not an http(s) URL
    #[error("invalid remote service URL {0:?}")]
    InvalidEventsUrl(String),
}
