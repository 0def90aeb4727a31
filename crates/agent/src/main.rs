//! Evrcap - EchoVR telemetry capture agent
//!
//! # Usage
//!
//! ```bash
//! # Record ports 6721-6730 on localhost at 30Hz
//! evrcap stream --frequency 30 --output ./output 127.0.0.1:6721-6730
//!
//! # Record and push events to a remote service
//! evrcap stream --events --events-url https://api.example.com --token JWT 127.0.0.1:6721
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use evrcap_config::{LogConfig, LogLevel, LogOutput};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// EchoVR telemetry capture agent
#[derive(Parser, Debug)]
#[command(name = "evrcap")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Write logs to a file instead of stdout
    #[arg(long, global = true)]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan game-server ports and record live matches
    Stream(cmd::stream::StreamArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli
            .log_level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?,
        output: match cli.log_file {
            Some(path) => LogOutput::File(path),
            None => LogOutput::Stdout,
        },
    };
    init_logging(&log_config)?;

    match cli.command {
        Command::Stream(args) => cmd::stream::run(args).await,
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.level.as_str())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match &config.output {
        LogOutput::Stdout => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .with(filter)
                .init();
        }
        LogOutput::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("cannot open log file {}: {e}", path.display()))?;
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .with(filter)
                .init();
        }
    }

    Ok(())
}
