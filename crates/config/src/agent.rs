//! Agent configuration
//!
//! Holds everything the capture pipeline needs: polling frequency, output
//! formats, and remote-sink settings. Assembled by the CLI layer and
//! validated once at startup; invalid combinations never reach discovery.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Per-match output selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `.echoreplay` zip container (default)
    Replay,
    /// `.nevrcap` zstd stream
    NevrCap,
    /// Live WebSocket stream to the remote service
    Stream,
    /// Discard frames (useful with `--events` alone)
    None,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::NevrCap => "nevrcap",
            Self::Stream => "stream",
            Self::None => "none",
        }
    }

    /// File extension for file-backed formats.
    pub fn file_extension(&self) -> Option<&'static str> {
        match self {
            Self::Replay => Some("echoreplay"),
            Self::NevrCap => Some("nevrcap"),
            Self::Stream | Self::None => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "replay" => Ok(Self::Replay),
            "nevrcap" => Ok(Self::NevrCap),
            "stream" => Ok(Self::Stream),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// Parse a comma-separated format list (`"replay,stream"`).
pub fn parse_formats(list: &str) -> Result<Vec<OutputFormat>, ConfigError> {
    let mut formats = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let format = part.parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        return Err(ConfigError::NoFormats);
    }
    Ok(formats)
}

/// Capture agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Polling frequency in Hz
    pub frequency: u32,

    /// Directory replay files are written to (created if absent)
    pub output_dir: PathBuf,

    /// Sinks attached to every match session
    pub formats: Vec<OutputFormat>,

    /// Attach the HTTP events sink to each session
    pub events_enabled: bool,

    /// Base URL of the remote ingestion service (events + stream)
    pub events_url: String,

    /// Bearer credential for remote sinks
    pub token: Option<String>,

    /// Optional `X-Node-ID` header value for remote sinks
    pub node_id: Option<String>,

    /// Optional `X-User-ID` header value for remote sinks
    pub user_id: Option<String>,

    /// Suppress event-free frames on the events sink
    pub suppress_eventless: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            frequency: 10,
            output_dir: PathBuf::from("output"),
            formats: vec![OutputFormat::Replay],
            events_enabled: false,
            events_url: "http://localhost:8081".to_string(),
            token: None,
            node_id: None,
            user_id: None,
            suppress_eventless: true,
        }
    }
}

impl AgentConfig {
    /// Set the polling frequency
    #[must_use]
    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the output formats
    #[must_use]
    pub fn with_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Enable the HTTP events sink
    #[must_use]
    pub fn with_events(mut self, url: impl Into<String>) -> Self {
        self.events_enabled = true;
        self.events_url = url.into();
        self
    }

    /// Set the bearer token for remote sinks
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The interval between poll ticks (`1s / frequency`).
    ///
    /// Call only after `validate()`; a zero frequency is a config error.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.frequency
    }

    /// Whether any configured output needs the remote service.
    pub fn uses_remote(&self) -> bool {
        self.events_enabled || self.formats.contains(&OutputFormat::Stream)
    }

    /// Validate the configuration; called once before discovery starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency == 0 {
            return Err(ConfigError::InvalidFrequency(self.frequency));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        if self.uses_remote()
            && !(self.events_url.starts_with("http://") || self.events_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidEventsUrl(self.events_url.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_interval_from_frequency() {
        let config = AgentConfig::default().with_frequency(1);
        assert_eq!(config.interval(), Duration::from_secs(1));

        let config = AgentConfig::default().with_frequency(1000);
        assert_eq!(config.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let config = AgentConfig::default().with_frequency(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFrequency(0))
        ));
    }

    #[test]
    fn test_parse_format_list() {
        let formats = parse_formats("replay, stream").unwrap();
        assert_eq!(formats, vec![OutputFormat::Replay, OutputFormat::Stream]);
    }

    #[test]
    fn test_parse_format_dedupes() {
        let formats = parse_formats("replay,replay,nevrcap").unwrap();
        assert_eq!(formats, vec![OutputFormat::Replay, OutputFormat::NevrCap]);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(matches!(
            parse_formats("replay,mp4"),
            Err(ConfigError::UnknownFormat(f)) if f == "mp4"
        ));
    }

    #[test]
    fn test_empty_format_list_rejected() {
        assert!(matches!(parse_formats(" , "), Err(ConfigError::NoFormats)));
    }

    #[test]
    fn test_remote_url_scheme_required() {
        let config = AgentConfig::default().with_events("localhost:8081");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEventsUrl(_))
        ));
    }

    #[test]
    fn test_stream_format_requires_valid_url() {
        let mut config = AgentConfig::default().with_formats(vec![OutputFormat::Stream]);
        config.events_url = "garbage".to_string();
        assert!(config.validate().is_err());
    }
}
