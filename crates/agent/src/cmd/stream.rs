//! `stream` subcommand
//!
//! Wires the CLI onto the capture pipeline and supervises it: one
//! cancellation token parents everything, INT/TERM cancel it, and the
//! process exits within a couple of seconds of the signal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use evrcap_capture::Discovery;
use evrcap_config::{parse_formats, AgentConfig};
use evrcap_protocol::{parse_targets, Target};
use tokio_util::sync::CancellationToken;

/// Grace period between cancellation and process exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Arguments for the `stream` subcommand
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Polling frequency in Hz
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u32,

    /// Output directory for replay files
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Output formats: replay, nevrcap, stream, none (comma-separated)
    #[arg(long, default_value = "replay")]
    pub format: String,

    /// Send frames to the remote events API
    #[arg(long)]
    pub events: bool,

    /// Base URL of the remote service (events and stream)
    #[arg(long, default_value = "http://localhost:8081")]
    pub events_url: String,

    /// JWT bearer token for remote sinks
    #[arg(long)]
    pub token: Option<String>,

    /// Node identifier sent as X-Node-ID to remote sinks
    #[arg(long)]
    pub node_id: Option<String>,

    /// User identifier sent as X-User-ID to remote sinks
    #[arg(long)]
    pub user_id: Option<String>,

    /// Capture targets: HOST:PORT[-ENDPORT][,PORT...]
    #[arg(required = true, value_name = "HOST:PORT")]
    pub targets: Vec<String>,
}

/// Assemble and validate the agent configuration; exits non-zero on any
/// configuration error before a single probe is issued.
fn build_config(args: &StreamArgs) -> Result<(AgentConfig, Vec<Target>)> {
    let targets = parse_targets(&args.targets)?;

    let mut config = AgentConfig::default()
        .with_frequency(args.frequency)
        .with_output_dir(&args.output)
        .with_formats(parse_formats(&args.format)?);
    config.events_enabled = args.events;
    config.events_url = args.events_url.clone();
    config.token = args.token.clone();
    config.node_id = args.node_id.clone();
    config.user_id = args.user_id.clone();
    config.validate()?;

    Ok((config, targets))
}

pub async fn run(args: StreamArgs) -> Result<()> {
    let (config, targets) = build_config(&args)?;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "cannot create output directory {}",
            config.output_dir.display()
        )
    })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        frequency = config.frequency,
        format = %args.format,
        output = %config.output_dir.display(),
        events = config.events_enabled,
        targets = targets.len(),
        "agent started"
    );

    let cancel = CancellationToken::new();
    let discovery = Discovery::new(config, targets, cancel.child_token())
        .context("failed to build HTTP clients")?;
    let discovery_task = tokio::spawn(discovery.run());

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    // Let sessions drain and files close, but never hang the exit
    if tokio::time::timeout(SHUTDOWN_GRACE, discovery_task)
        .await
        .is_err()
    {
        tracing::warn!("shutdown grace period expired with sessions still draining");
    }

    tracing::info!("agent stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                tracing::error!(error = %err, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
