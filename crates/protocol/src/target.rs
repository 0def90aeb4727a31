//! Target endpoint parsing
//!
//! CLI target arguments use the form `host:port[-endPort][,port…]`; a range
//! expands inclusively. Expansion preserves argument order (discovery probes
//! targets in the order given) and drops duplicates, keeping the first
//! occurrence.

use std::collections::HashSet;

use thiserror::Error;

/// A single `(host, port)` capture endpoint, immutable for the process
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the game server's HTTP control plane.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Target parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetParseError {
    /// Argument is not of the form `host:ports`
    #[error("invalid target {spec:?}: expected host:port or host:startPort-endPort")]
    InvalidFormat { spec: String },

    /// A port component failed to parse as a number
    #[error("invalid port {value:?} in target {spec:?}")]
    InvalidPort { spec: String, value: String },

    /// A port fell outside 1..=65535
    #[error("port {port} out of range in target {spec:?} (must be 1-65535)")]
    PortOutOfRange { spec: String, port: u32 },

    /// A range ran backwards
    #[error("invalid port range {range:?} in target {spec:?}: start exceeds end")]
    BackwardsRange { spec: String, range: String },

    /// No usable targets were supplied
    #[error("at least one host:port target must be specified")]
    Empty,
}

/// Expand a list of CLI target arguments into an ordered, de-duplicated
/// target set.
pub fn parse_targets(specs: &[String]) -> Result<Vec<Target>, TargetParseError> {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();

    for spec in specs {
        for target in parse_target_spec(spec)? {
            if seen.insert(target.clone()) {
                targets.push(target);
            }
        }
    }

    if targets.is_empty() {
        return Err(TargetParseError::Empty);
    }
    Ok(targets)
}

/// Expand one `host:port[-endPort][,port…]` argument.
pub fn parse_target_spec(spec: &str) -> Result<Vec<Target>, TargetParseError> {
    let invalid = || TargetParseError::InvalidFormat {
        spec: spec.to_string(),
    };

    let (host, ports) = spec.split_once(':').ok_or_else(invalid)?;
    if host.is_empty() || ports.is_empty() || ports.contains(':') {
        return Err(invalid());
    }

    let mut targets = Vec::new();
    for range in ports.split(',') {
        let range = range.trim();
        if range.is_empty() {
            continue;
        }

        match range.split_once('-') {
            None => {
                targets.push(Target::new(host, parse_port(spec, range)?));
            }
            Some((start, end)) => {
                let start_port = parse_port(spec, start)?;
                let end_port = parse_port(spec, end)?;
                if start_port > end_port {
                    return Err(TargetParseError::BackwardsRange {
                        spec: spec.to_string(),
                        range: range.to_string(),
                    });
                }
                for port in start_port..=end_port {
                    targets.push(Target::new(host, port));
                }
            }
        }
    }

    if targets.is_empty() {
        return Err(invalid());
    }
    Ok(targets)
}

fn parse_port(spec: &str, value: &str) -> Result<u16, TargetParseError> {
    let port: u32 = value
        .trim()
        .parse()
        .map_err(|_| TargetParseError::InvalidPort {
            spec: spec.to_string(),
            value: value.to_string(),
        })?;

    if !(1..=65535).contains(&port) {
        return Err(TargetParseError::PortOutOfRange {
            spec: spec.to_string(),
            port,
        });
    }
    Ok(port as u16)
}

#[cfg(test)]
#[path = "target_test.rs"]
mod target_test;
