//! Evrcap - Configuration
//!
//! Agent configuration assembled from the CLI. Minimal surface: everything
//! has a sensible default, `validate()` rejects the combinations that must
//! fail before any polling begins.

mod agent;
mod error;
mod logging;

pub use agent::{parse_formats, AgentConfig, OutputFormat};
pub use error::ConfigError;
pub use logging::{LogConfig, LogLevel, LogOutput};
